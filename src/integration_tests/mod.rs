use crate::{AmqpBroker, PublisherConfig};
use amiquip::{Channel, Connection};
use std::env;
use std::sync::Once;

mod publish;

static PRINT_WARNING: Once = Once::new();

fn with_test_url<F: FnOnce(&str)>(f: F) {
    match env::var("REINDEX_TEST_URL") {
        Ok(url) => f(&url),
        Err(env::VarError::NotPresent) => PRINT_WARNING.call_once(|| {
            println!("REINDEX_TEST_URL not defined - skipping integration tests");
        }),
        Err(env::VarError::NotUnicode(_)) => {
            panic!("REINDEX_TEST_URL exists but is not valid unicode")
        }
    }
}

// Config pointing at the test broker, with a queue and exchange nobody else uses.
fn with_config<F: FnOnce(PublisherConfig)>(f: F) {
    with_test_url(|url| {
        let unique = uuid::Uuid::new_v4();
        let config = PublisherConfig::from_url(url)
            .unwrap()
            .queue(format!("reindex-post-test-{}", unique))
            .exchange(format!("reindex-post-test-{}", unique));
        f(config)
    })
}

// A second, independent connection used to inspect (and clean up) what the publisher did.
fn with_inspector<F: FnOnce(&Channel)>(url: &str, f: F) {
    let mut conn = Connection::insecure_open(url).unwrap();
    let chan = conn.open_channel(None).unwrap();
    f(&chan);
    chan.close().unwrap();
    conn.close().unwrap();
}

fn open(config: &PublisherConfig) -> AmqpBroker {
    AmqpBroker::open(config).unwrap()
}
