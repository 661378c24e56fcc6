use amiquip::{AmqpProperties, Publish};

/// AMQP delivery mode asking the broker to write the message to disk.
const PERSISTENT: u8 = 2;

/// A single reindex request: an id plus the configured suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReindexMessage {
    id: String,
    body: String,
}

impl ReindexMessage {
    /// Build the message for `id`. The id is used verbatim.
    pub fn new<S: Into<String>>(id: S, suffix: &str) -> ReindexMessage {
        let id = id.into();
        let body = format!("{} {}", id, suffix);
        ReindexMessage { id, body }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// The amiquip publish for this message, marked persistent.
    pub fn to_publish<'a>(&'a self, routing_key: &str) -> Publish<'a> {
        Publish::with_properties(
            self.body.as_bytes(),
            routing_key,
            AmqpProperties::default().with_delivery_mode(PERSISTENT),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_SUFFIX;

    #[test]
    fn body_is_id_space_suffix() {
        let message = ReindexMessage::new("42", DEFAULT_SUFFIX);
        assert_eq!(message.id(), "42");
        assert_eq!(message.body(), "42 1257279827");
    }

    #[test]
    fn id_is_not_modified() {
        for id in &["", " padded ", "a b", "ünïcødé", "1257279827"] {
            let message = ReindexMessage::new(*id, DEFAULT_SUFFIX);
            assert_eq!(message.body(), format!("{} 1257279827", id));
            assert_eq!(message.id(), *id);
        }
    }

    #[test]
    fn publish_is_persistent() {
        let message = ReindexMessage::new("7", "x");
        let publish = message.to_publish("indexer");
        assert_eq!(publish.body, b"7 x");
        assert_eq!(publish.routing_key, "indexer");
        assert_eq!(publish.properties.delivery_mode(), &Some(2));
    }
}
