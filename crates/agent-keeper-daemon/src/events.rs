//! In-process session-changed notifications.
//!
//! A minimal listener registry: subscribing hands back a [`SubscriptionHandle`]
//! and unsubscribing takes that handle, so removal never depends on closure
//! identity. Emission calls each listener inline; listeners that have real
//! work to do spawn it detached so the emitter never blocks on processing.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use agent_keeper_common::mutex_lock_or_recover;

/// Payload of a session-changed notification. Delivered at-least-once per
/// real change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionChanged {
    pub project_id: String,
    pub session_id: String,
}

pub type SessionListener = std::sync::Arc<dyn Fn(SessionChanged) + Send + Sync>;

/// Proof of a live subscription. Required for unsubscribing.
#[derive(Debug, PartialEq, Eq)]
pub struct SubscriptionHandle(u64);

#[derive(Default)]
pub struct SessionEventBus {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, SessionListener>>,
}

impl SessionEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: SessionListener) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        mutex_lock_or_recover(&self.listeners).insert(id, listener);
        SubscriptionHandle(id)
    }

    /// Returns whether the handle referred to a live subscription. After
    /// this returns, future emits will not invoke the listener.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        mutex_lock_or_recover(&self.listeners)
            .remove(&handle.0)
            .is_some()
    }

    pub fn emit(&self, event: SessionChanged) {
        // Snapshot under the lock, invoke outside it: a listener may
        // subscribe or unsubscribe reentrantly.
        let listeners: Vec<SessionListener> = mutex_lock_or_recover(&self.listeners)
            .values()
            .cloned()
            .collect();

        for listener in listeners {
            listener(event.clone());
        }
    }

    pub fn listener_count(&self) -> usize {
        mutex_lock_or_recover(&self.listeners).len()
    }
}
