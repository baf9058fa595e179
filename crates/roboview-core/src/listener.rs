//! Ordered, synchronous observer registry.
//!
//! Every notification kind in the workspace (scene changes, connection
//! transitions, playback transitions) is fanned out through a
//! [`ListenerSet`] over one capability trait. Dispatch happens on the
//! notifying thread, in registration order.

use std::sync::{Arc, Mutex, MutexGuard};

/// A registry of listeners implementing capability `L`.
///
/// The set is internally synchronized so registration and dispatch may
/// happen from different threads. Dispatch iterates over a snapshot of
/// the registry, so a listener may register or remove listeners from
/// inside a callback without deadlocking.
pub struct ListenerSet<L: ?Sized> {
    listeners: Mutex<Vec<Arc<L>>>,
}

impl<L: ?Sized> ListenerSet<L> {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<L>>> {
        // A panicking listener must not take notifications down with it.
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a listener. The same `Arc` may be registered only once.
    pub fn add(&self, listener: Arc<L>) {
        let mut listeners = self.lock();
        if !listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            listeners.push(listener);
        }
    }

    /// Remove a listener by identity. Returns whether it was registered.
    pub fn remove(&self, listener: &Arc<L>) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    /// Remove every listener.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Invoke `f` on every listener, in registration order.
    pub fn notify(&self, mut f: impl FnMut(&L)) {
        let snapshot: Vec<Arc<L>> = self.lock().clone();
        for listener in &snapshot {
            f(listener);
        }
    }

    /// Move every listener out of `other` into `self`, keeping order.
    pub fn absorb(&self, other: &ListenerSet<L>) {
        let moved: Vec<Arc<L>> = std::mem::take(&mut *other.lock());
        for listener in moved {
            self.add(listener);
        }
    }
}

impl<L: ?Sized> Default for ListenerSet<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ?Sized> std::fmt::Debug for ListenerSet<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.len())
            .finish()
    }
}
