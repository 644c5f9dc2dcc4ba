//! Connectivity monitoring
//!
//! Passive observer over platform connectivity signals. The platform layer
//! feeds transitions in via [`ConnectivityMonitor::set_online`]; subscribers
//! are invoked synchronously, at most once per actual transition.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

type Callback = Box<dyn Fn(bool) + Send + Sync>;

struct Inner {
    online: AtomicBool,
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, Callback)>>,
}

/// Tracks online/offline state and fans transitions out to subscribers
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<Inner>,
}

impl ConnectivityMonitor {
    /// Create a monitor with the given initial state
    #[must_use]
    pub fn new(initially_online: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                online: AtomicBool::new(initially_online),
                next_id: AtomicU64::new(0),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Current connectivity state
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Report a platform connectivity change.
    ///
    /// Duplicate reports of the current state are ignored, so subscribers
    /// fire at most once per actual transition even when the platform
    /// double-delivers its events.
    pub fn set_online(&self, online: bool) {
        let previous = self.inner.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return;
        }

        tracing::info!(online, "connectivity changed");

        // Callbacks run under the subscriber lock; they must not subscribe
        // or unsubscribe from within the callback.
        let subscribers = self.inner.subscribers.lock().unwrap();
        for (_, callback) in subscribers.iter() {
            callback(online);
        }
    }

    /// Register a callback for connectivity transitions.
    ///
    /// The callback receives the new state. Dropping the returned
    /// [`Subscription`] (or calling [`Subscription::unsubscribe`])
    /// removes it.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .push((id, Box::new(callback)));

        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// Handle for a registered connectivity callback; unsubscribes on drop
pub struct Subscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Subscription {
    /// Remove the callback
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .subscribers
                .lock()
                .unwrap()
                .retain(|(id, _)| *id != self.id);
        }
    }
}
