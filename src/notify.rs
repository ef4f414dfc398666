use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for committed changes, one channel per schedule or group.
/// The push-delivery layer subscribes here.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a schedule or group. Creates the channel if needed.
    pub fn subscribe(&self, topic: Ulid) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(topic)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Broadcast a committed change. Topics nobody listens to any more are
    /// dropped here.
    pub fn send(&self, topic: Ulid, event: &Event) {
        let orphaned = match self.channels.get(&topic) {
            Some(sender) => sender.send(event.clone()).is_err(),
            None => false,
        };
        if orphaned {
            self.channels.remove_if(&topic, |_, sender| sender.receiver_count() == 0);
        }
    }

    pub fn subscribers(&self, topic: Ulid) -> usize {
        self.channels
            .get(&topic)
            .map_or(0, |sender| sender.receiver_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let group = Ulid::new();
        let mut rx = hub.subscribe(group);

        let event = Event::GroupRegistered {
            id: group,
            owner: Ulid::new(),
        };
        hub.send(group, &event);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        let id = Ulid::new();
        hub.send(id, &Event::ClaimDeleted { id });
    }

    #[tokio::test]
    async fn topics_are_independent() {
        let hub = NotifyHub::new();
        let (a, b) = (Ulid::new(), Ulid::new());
        let mut rx_a = hub.subscribe(a);
        let _rx_b = hub.subscribe(b);
        hub.send(b, &Event::ClaimDeleted { id: b });
        hub.send(a, &Event::ClaimDeleted { id: a });
        assert_eq!(rx_a.recv().await.unwrap(), Event::ClaimDeleted { id: a });
    }

    #[test]
    fn abandoned_topic_is_pruned_on_send() {
        let hub = NotifyHub::new();
        let topic = Ulid::new();
        let rx = hub.subscribe(topic);
        assert_eq!(hub.subscribers(topic), 1);
        drop(rx);
        hub.send(topic, &Event::ClaimDeleted { id: topic });
        assert_eq!(hub.subscribers(topic), 0);
        assert!(hub.channels.is_empty());
    }
}
