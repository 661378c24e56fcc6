use super::{open, with_config, with_inspector, with_test_url};
use crate::{run, AmqpBroker, Broker, ErrorCategory, PublisherConfig, ReindexMessage};
use amiquip::{Channel, ExchangeDeclareOptions, ExchangeType, QueueDeclareOptions};

fn drain(chan: &Channel, config: &PublisherConfig) -> Vec<(String, Option<u8>)> {
    let queue = chan
        .queue_declare(
            config.queue_name(),
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
        )
        .unwrap();
    let mut bodies = Vec::new();
    while let Some(get) = queue.get(true).unwrap() {
        let delivery_mode = *get.delivery.properties.delivery_mode();
        bodies.push((String::from_utf8(get.delivery.body).unwrap(), delivery_mode));
    }
    bodies
}

fn cleanup(chan: &Channel, config: &PublisherConfig) {
    chan.queue_delete(config.queue_name(), Default::default())
        .unwrap();
    chan.exchange_delete(config.exchange_name(), false).unwrap();
}

#[test]
fn test_publish_in_order() {
    with_test_url(|url| {
        with_config(|config| {
            let mut out = Vec::new();
            let posted = run(
                config.clone().confirm(true),
                AmqpBroker::open,
                &["7", "8"],
                &mut out,
            )
            .unwrap();
            assert_eq!(posted, 2);
            assert_eq!(String::from_utf8(out).unwrap(), "Posted 7\nPosted 8\n");

            with_inspector(url, |chan| {
                assert_eq!(
                    drain(chan, &config),
                    vec![
                        ("7 1257279827".to_string(), Some(2)),
                        ("8 1257279827".to_string(), Some(2)),
                    ]
                );
                cleanup(chan, &config);
            });
        })
    })
}

#[test]
fn test_no_ids_declares_and_binds() {
    with_test_url(|url| {
        with_config(|config| {
            let mut out = Vec::new();
            let ids: Vec<String> = Vec::new();
            let posted = run(config.clone(), AmqpBroker::open, ids, &mut out).unwrap();
            assert_eq!(posted, 0);
            assert!(out.is_empty());

            // the binding exists: a message published to the exchange lands in the queue
            let mut broker = open(&config);
            broker
                .publish(
                    config.exchange_name(),
                    config.routing_key_name(),
                    &ReindexMessage::new("durable-check", config.message_suffix()),
                )
                .unwrap();
            broker.close().unwrap();

            with_inspector(url, |chan| {
                assert_eq!(
                    drain(chan, &config),
                    vec![("durable-check 1257279827".to_string(), Some(2))]
                );
                cleanup(chan, &config);
            });
        })
    })
}

#[test]
fn test_durability_mismatch_is_a_declaration_error() {
    with_test_url(|url| {
        with_config(|config| {
            with_inspector(url, |chan| {
                chan.exchange_declare(
                    ExchangeType::Direct,
                    config.exchange_name(),
                    ExchangeDeclareOptions::default(),
                )
                .unwrap();
            });

            let mut out = Vec::new();
            let err = run(config.clone(), AmqpBroker::open, &["1"], &mut out).unwrap_err();
            assert_eq!(err.category(), ErrorCategory::Declaration);
            assert!(out.is_empty());

            with_inspector(url, |chan| cleanup(chan, &config));
        })
    })
}
