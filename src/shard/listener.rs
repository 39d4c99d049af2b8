//! Gateway event listeners
//!
//! Listeners receive every event a session reads off the gateway. They are
//! attached either to all sessions or to one shard index.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use twilight_model::gateway::event::Event;

/// Receives gateway events from running sessions.
///
/// Called on the session's task; implementations must not block.
pub trait GatewayListener: Send + Sync {
    fn on_event(&self, shard_id: u32, event: &Event);

    /// Whether automatic registration may attach this listener.
    fn auto_register(&self) -> bool {
        true
    }
}

fn same_listener(a: &Arc<dyn GatewayListener>, b: &Arc<dyn GatewayListener>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Listeners shared between a gateway and its sessions
#[derive(Clone, Default)]
pub struct ListenerSet {
    inner: Arc<ListenerSetInner>,
}

#[derive(Default)]
struct ListenerSetInner {
    global: RwLock<Vec<Arc<dyn GatewayListener>>>,
    per_shard: DashMap<u32, Vec<Arc<dyn GatewayListener>>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener to every session
    pub fn add(&self, listener: Arc<dyn GatewayListener>) {
        self.inner.global.write().push(listener);
    }

    /// Detach a listener from every session, returns whether it was attached
    pub fn remove(&self, listener: &Arc<dyn GatewayListener>) -> bool {
        let mut global = self.inner.global.write();
        let before = global.len();
        global.retain(|l| !same_listener(l, listener));
        global.len() != before
    }

    /// Attach a listener to one shard index
    pub fn add_for_shard(&self, shard_id: u32, listener: Arc<dyn GatewayListener>) {
        self.inner.per_shard.entry(shard_id).or_default().push(listener);
    }

    /// Detach a listener from one shard index, returns whether it was attached
    pub fn remove_for_shard(&self, shard_id: u32, listener: &Arc<dyn GatewayListener>) -> bool {
        match self.inner.per_shard.get_mut(&shard_id) {
            Some(mut listeners) => {
                let before = listeners.len();
                listeners.retain(|l| !same_listener(l, listener));
                listeners.len() != before
            }
            None => false,
        }
    }

    /// Number of listeners a session with this index would notify
    pub fn count_for_shard(&self, shard_id: u32) -> usize {
        let shard = self.inner.per_shard.get(&shard_id).map_or(0, |l| l.len());
        self.inner.global.read().len() + shard
    }

    /// Deliver an event to global listeners, then to the shard's own listeners
    pub fn dispatch(&self, shard_id: u32, event: &Event) {
        let mut listeners = self.inner.global.read().clone();
        if let Some(shard) = self.inner.per_shard.get(&shard_id) {
            listeners.extend(shard.iter().cloned());
        }

        for listener in listeners {
            listener.on_event(shard_id, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl GatewayListener for Counting {
        fn on_event(&self, _shard_id: u32, _event: &Event) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn shard_listeners_only_see_their_shard() {
        let set = ListenerSet::new();
        let global = Arc::new(Counting::default());
        let shard_one = Arc::new(Counting::default());
        set.add(global.clone());
        set.add_for_shard(1, shard_one.clone());

        set.dispatch(0, &Event::GatewayHeartbeatAck);
        set.dispatch(1, &Event::GatewayHeartbeatAck);

        assert_eq!(global.0.load(Ordering::SeqCst), 2);
        assert_eq!(shard_one.0.load(Ordering::SeqCst), 1);
        assert_eq!(set.count_for_shard(1), 2);
    }

    #[test]
    fn removal_matches_by_identity() {
        let set = ListenerSet::new();
        let a: Arc<dyn GatewayListener> = Arc::new(Counting::default());
        let b: Arc<dyn GatewayListener> = Arc::new(Counting::default());
        set.add(a.clone());
        set.add_for_shard(3, b.clone());

        assert!(!set.remove(&b));
        assert!(set.remove(&a));
        assert!(set.remove_for_shard(3, &b));
        assert!(!set.remove_for_shard(3, &b));
        assert_eq!(set.count_for_shard(3), 0);
    }
}
