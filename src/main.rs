use clap::Parser;
use reindex_post::{logging, AmqpBroker, Cli};
use std::io;
use std::process;

fn main() {
    logging::init();
    let cli = Cli::parse();

    let stdout = io::stdout();
    let status = cli.execute(AmqpBroker::open, &mut stdout.lock(), &mut io::stderr());
    process::exit(status);
}
