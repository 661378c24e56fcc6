use env_logger::{Builder, Env};
use log::Level;
use std::fmt;
use std::io::{self, Write};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "reindex_post=info";

/// Install the global logger. Records go to stderr as
/// `LEVEL - yyyy-MM-dd HH:mm:ss UTC: message`.
///
/// Must be called at most once per process.
pub fn init() {
    Builder::from_env(Env::default().default_filter_or(DEFAULT_FILTER))
        .format(|buf, record| {
            let timestamp = utc_timestamp(&buf.timestamp_seconds().to_string());
            write_record(buf, record.level(), timestamp, record.args())
        })
        .init();
}

// `2009-11-03T19:03:47Z` -> `2009-11-03 19:03:47 UTC`
fn utc_timestamp(rfc3339: &str) -> String {
    match rfc3339.strip_suffix('Z') {
        Some(rest) => format!("{} UTC", rest.replacen('T', " ", 1)),
        None => rfc3339.to_string(),
    }
}

fn write_record<W, T>(
    out: &mut W,
    level: Level,
    timestamp: T,
    message: &fmt::Arguments,
) -> io::Result<()>
where
    W: Write,
    T: fmt::Display,
{
    writeln!(out, "{} - {}: {}", level, timestamp, message)
}
