use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A committed message on its way to an online recipient's stream.
#[derive(Debug, Clone, PartialEq)]
pub struct PushedMessage {
    pub id: u64,
    pub sender: String,
    pub recipient: String,
    pub content: String,
    pub timestamp: f64,
}

/// SubscriptionBroker tracks, per online recipient, the bounded queues
/// feeding that user's open ReadMessages streams. The replica's commit path
/// publishes into it; stream tasks consume from it.
///
/// Backpressure is bounded: a subscriber whose queue is full when a commit
/// lands is disconnected (its queue is closed and the stream task winds
/// down). The client is expected to reconnect and pick up the undelivered
/// backlog.
pub struct SubscriptionBroker {
    subscribers: Mutex<HashMap<String, Vec<Subscriber>>>,
    queue_capacity: usize,
    next_subscriber_id: AtomicU64,
}

struct Subscriber {
    id: u64,
    queue: mpsc::Sender<PushedMessage>,
}

/// Handle owned by one stream task. Dropping it releases the broker entry.
pub struct Subscription {
    broker: Arc<SubscriptionBroker>,
    username: String,
    subscriber_id: u64,
}

impl SubscriptionBroker {
    pub fn new(queue_capacity: usize) -> Arc<Self> {
        Arc::new(SubscriptionBroker {
            subscribers: Mutex::new(HashMap::new()),
            queue_capacity,
            next_subscriber_id: AtomicU64::new(1),
        })
    }

    /// Registers a stream for `username` and returns the queue to drain plus
    /// the guard that unregisters on drop. A user may hold several
    /// subscriptions (multiple devices); each gets its own queue.
    pub fn subscribe(
        self: &Arc<Self>,
        username: &str,
    ) -> (Subscription, mpsc::Receiver<PushedMessage>) {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let subscriber_id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);

        let mut subscribers = self.lock();
        subscribers
            .entry(username.to_string())
            .or_default()
            .push(Subscriber {
                id: subscriber_id,
                queue: tx,
            });

        let guard = Subscription {
            broker: Arc::clone(self),
            username: username.to_string(),
            subscriber_id,
        };
        (guard, rx)
    }

    /// Enqueues a committed message for every open stream of its recipient.
    /// Streams that cannot keep up are dropped on the spot.
    pub fn publish(&self, message: PushedMessage) {
        let mut subscribers = self.lock();
        let Some(queues) = subscribers.get_mut(&message.recipient) else {
            return;
        };
        queues.retain(|subscriber| match subscriber.queue.try_send(message.clone()) {
            Ok(()) => true,
            // Queue full: this subscriber is too slow, disconnect it.
            Err(mpsc::error::TrySendError::Full(_)) => false,
            // Stream task already gone; reap the entry.
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        if queues.is_empty() {
            subscribers.remove(&message.recipient);
        }
    }

    pub fn has_subscribers(&self, username: &str) -> bool {
        self.lock().contains_key(username)
    }

    /// Tears down every stream of `username`. Used when a committed account
    /// deletion removes the user.
    pub fn drop_user(&self, username: &str) {
        self.lock().remove(username);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Subscriber>>> {
        self.subscribers
            .lock()
            .expect("subscription broker mutex poisoned")
    }

    fn unsubscribe(&self, username: &str, subscriber_id: u64) {
        let mut subscribers = self.lock();
        if let Some(queues) = subscribers.get_mut(username) {
            queues.retain(|subscriber| subscriber.id != subscriber_id);
            if queues.is_empty() {
                subscribers.remove(username);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broker.unsubscribe(&self.username, self.subscriber_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: u64, recipient: &str) -> PushedMessage {
        PushedMessage {
            id,
            sender: "alice".to_string(),
            recipient: recipient.to_string(),
            content: format!("m{}", id),
            timestamp: id as f64,
        }
    }

    #[tokio::test]
    async fn delivers_in_publish_order_to_the_right_recipient() {
        let broker = SubscriptionBroker::new(8);
        let (_guard, mut rx) = broker.subscribe("bob");

        broker.publish(message(1, "bob"));
        broker.publish(message(2, "carol")); // nobody listening
        broker.publish(message(3, "bob"));

        assert_eq!(rx.recv().await.unwrap().id, 1);
        assert_eq!(rx.recv().await.unwrap().id, 3);
    }

    #[tokio::test]
    async fn every_stream_of_a_user_receives_the_message() {
        let broker = SubscriptionBroker::new(8);
        let (_g1, mut rx1) = broker.subscribe("bob");
        let (_g2, mut rx2) = broker.subscribe("bob");

        broker.publish(message(1, "bob"));
        assert_eq!(rx1.recv().await.unwrap().id, 1);
        assert_eq!(rx2.recv().await.unwrap().id, 1);
    }

    #[tokio::test]
    async fn slow_subscriber_is_disconnected_on_overflow() {
        let broker = SubscriptionBroker::new(2);
        let (_guard, mut rx) = broker.subscribe("bob");

        broker.publish(message(1, "bob"));
        broker.publish(message(2, "bob"));
        // Queue is full; this publish evicts the subscriber.
        broker.publish(message(3, "bob"));

        assert_eq!(rx.recv().await.unwrap().id, 1);
        assert_eq!(rx.recv().await.unwrap().id, 2);
        assert!(rx.recv().await.is_none());
        assert!(!broker.has_subscribers("bob"));
    }

    #[tokio::test]
    async fn dropping_the_guard_releases_the_broker_entry() {
        let broker = SubscriptionBroker::new(8);
        let (guard, _rx) = broker.subscribe("bob");
        assert!(broker.has_subscribers("bob"));
        drop(guard);
        assert!(!broker.has_subscribers("bob"));
    }

    #[tokio::test]
    async fn drop_user_closes_live_streams() {
        let broker = SubscriptionBroker::new(8);
        let (_guard, mut rx) = broker.subscribe("bob");
        broker.drop_user("bob");
        assert!(rx.recv().await.is_none());
        assert!(!broker.has_subscribers("bob"));
    }
}
