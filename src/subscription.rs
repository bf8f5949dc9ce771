//! Live document subscriptions.
//!
//! A [`Subscription`] is a [`Stream`] of document snapshots for one path. Dropping it
//! unsubscribes.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::{Stream, StreamExt};
use serde_json::Value;

#[derive(Default)]
struct Registry {
    next_id: u64,
    by_path: HashMap<String, Vec<(u64, UnboundedSender<Value>)>>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hub delivering published snapshots to subscribers, keyed by document path.
#[derive(Clone, Default)]
pub struct Subscriptions {
    registry: Arc<Mutex<Registry>>,
}
impl Subscriptions {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to snapshots of `path`.
    pub fn subscribe(&self, path: &str) -> Subscription {
        let (send, recv) = unbounded();
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .by_path
            .entry(path.to_owned())
            .or_default()
            .push((id, send));
        log::debug!("Subscribed #{} to `{}`.", id, path);
        Subscription {
            path: path.to_owned(),
            id,
            recv,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver `snapshot` to every live subscriber of `path`, in subscription order. Returns how
    /// many received it.
    pub fn publish(&self, path: &str, snapshot: &Value) -> usize {
        let mut registry = lock(&self.registry);
        let Some(subscribers) = registry.by_path.get_mut(path) else {
            return 0;
        };
        subscribers.retain(|(_, send)| send.unbounded_send(snapshot.clone()).is_ok());
        subscribers.len()
    }

    /// Number of live subscribers of `path`.
    pub fn subscriber_count(&self, path: &str) -> usize {
        lock(&self.registry).by_path.get(path).map_or(0, Vec::len)
    }
}

/// Handle for one live subscription. Unsubscribes on drop.
pub struct Subscription {
    path: String,
    id: u64,
    recv: UnboundedReceiver<Value>,
    registry: Weak<Mutex<Registry>>,
}
impl Subscription {
    /// Document path.
    pub fn path(&self) -> &str {
        &self.path
    }
}
impl Stream for Subscription {
    type Item = Value;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.recv.poll_next_unpin(cx)
    }
}
impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut registry = lock(&registry);
        if let Some(subscribers) = registry.by_path.get_mut(&self.path) {
            subscribers.retain(|&(id, _)| id != self.id);
            if subscribers.is_empty() {
                registry.by_path.remove(&self.path);
            }
        }
        log::debug!("Unsubscribed #{} from `{}`.", self.id, self.path);
    }
}

#[cfg(test)]
mod test {
    use futures::executor::block_on;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_publish_in_order() {
        let hub = Subscriptions::new();
        let mut a = hub.subscribe("settings/maintenance");
        let mut b = hub.subscribe("settings/maintenance");
        let mut other = hub.subscribe("upiConfiguration/active");

        assert_eq!(2, hub.publish("settings/maintenance", &json!({ "n": 1 })));
        assert_eq!(2, hub.publish("settings/maintenance", &json!({ "n": 2 })));

        block_on(async {
            assert_eq!(Some(json!({ "n": 1 })), a.next().await);
            assert_eq!(Some(json!({ "n": 2 })), a.next().await);
            assert_eq!(Some(json!({ "n": 1 })), b.next().await);
        });
        assert!(other.recv.try_next().is_err(), "other path got nothing");
    }

    #[test]
    fn test_drop_unsubscribes() {
        let hub = Subscriptions::new();
        let a = hub.subscribe("settings/maintenance");
        let mut b = hub.subscribe("settings/maintenance");
        assert_eq!(2, hub.subscriber_count("settings/maintenance"));

        drop(a);
        assert_eq!(1, hub.subscriber_count("settings/maintenance"));
        assert_eq!(1, hub.publish("settings/maintenance", &json!(true)));
        assert_eq!(Some(json!(true)), block_on(b.next()));

        drop(b);
        assert_eq!(0, hub.subscriber_count("settings/maintenance"));
        assert_eq!(0, hub.publish("settings/maintenance", &json!(false)));
    }

    #[test]
    fn test_outlives_hub() {
        let hub = Subscriptions::new();
        let mut sub = hub.subscribe("referralConfiguration/settings");
        drop(hub);
        assert_eq!(None, block_on(sub.next()));
    }
}
