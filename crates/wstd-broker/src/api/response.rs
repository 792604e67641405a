//! Auto-response descriptor

use wstd_core::types::ClientId;
use wstd_protocol::Value;

use crate::broker::Broker;

/// Reply a method handler asks the broker to send
#[derive(Debug, Clone, PartialEq)]
pub struct AutoResponse {
    /// Payload to send
    pub data: Value,
    /// Topic override; the inbound topic when absent
    pub topic: Option<String>,
    /// Broadcast instead of replying to the sender
    pub broadcast: bool,
    /// Intent filter, only used when broadcasting
    pub intent_filter: Option<String>,
}

impl AutoResponse {
    /// Reply to the sender
    pub fn reply(data: Value) -> Self {
        Self {
            data,
            topic: None,
            broadcast: false,
            intent_filter: None,
        }
    }

    /// Broadcast to every client
    pub fn broadcast(data: Value) -> Self {
        Self {
            broadcast: true,
            ..Self::reply(data)
        }
    }

    /// Send on a different topic
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Restrict a broadcast to clients with this intent
    pub fn with_intent_filter(mut self, intent: impl Into<String>) -> Self {
        self.intent_filter = Some(intent.into());
        self
    }

    /// Send the response for a message from `sender` on `topic`
    ///
    /// Returns the number of frames written.
    pub(crate) async fn deliver(self, broker: &Broker, sender: &ClientId, topic: &str) -> usize {
        let topic = self.topic.as_deref().unwrap_or(topic);
        let target = if self.broadcast { None } else { Some(sender) };
        broker
            .send(topic, self.data, target, self.intent_filter.as_deref(), None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let reply = AutoResponse::reply(Value::from(1));
        assert!(!reply.broadcast);
        assert_eq!(reply.topic, None);

        let broadcast = AutoResponse::broadcast(Value::from(2))
            .with_topic("alerts")
            .with_intent_filter("admin");
        assert!(broadcast.broadcast);
        assert_eq!(broadcast.topic.as_deref(), Some("alerts"));
        assert_eq!(broadcast.intent_filter.as_deref(), Some("admin"));
        assert_eq!(broadcast.data, Value::from(2));
    }
}
