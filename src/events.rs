use crate::models::{Chat, Message};
use tokio::sync::broadcast;

/// Domain events published by the chat service and consumed by the
/// realtime gateway. The service never references the gateway; the bus is
/// the only coupling between the write path and the push path.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    MessageCreated {
        author_user_id: String,
        message: Message,
        chat: Chat,
    },
    MessageDeleted {
        user_id: String,
        chat_id: String,
    },
}

/// In-process typed publish/subscribe channel. Delivery is best effort:
/// publishing with no subscribers drops the event, and a lagging
/// subscriber loses the oldest entries.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: DomainEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("domain event dropped, no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::default();
        bus.publish(DomainEvent::MessageDeleted {
            user_id: "u1".into(),
            chat_id: "chat".into(),
        });
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(DomainEvent::MessageDeleted {
            user_id: "u1".into(),
            chat_id: "chat".into(),
        });
        match rx.recv().await.unwrap() {
            DomainEvent::MessageDeleted { user_id, chat_id } => {
                assert_eq!(user_id, "u1");
                assert_eq!(chat_id, "chat");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
