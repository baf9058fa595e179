//! Delivery gate between a producer thread and its queue.
//!
//! Holding the gate guarantees that no push is in flight and none starts
//! until it is released. This is what makes pause, drain, swap, resume
//! safe: after [`DeliveryGate::hold`] returns, draining the queue empties
//! it for good.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// A pausable pass-through for queue pushes.
#[derive(Debug, Default)]
pub struct DeliveryGate {
    held: Mutex<bool>,
    released: Condvar,
}

impl DeliveryGate {
    /// An open gate.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.held.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Close the gate, waiting for an in-flight push to finish.
    pub fn hold(&self) {
        *self.lock() = true;
    }

    /// Reopen the gate and wake waiting producers.
    pub fn release(&self) {
        *self.lock() = false;
        self.released.notify_all();
    }

    /// Whether the gate is closed.
    pub fn is_held(&self) -> bool {
        *self.lock()
    }

    /// Run `push` if the gate is open, without waiting.
    ///
    /// Returns `None` when the gate is held.
    pub fn try_pass<R>(&self, push: impl FnOnce() -> R) -> Option<R> {
        let held = self.lock();
        if *held {
            return None;
        }
        let out = push();
        drop(held);
        Some(out)
    }

    /// Run `push` once the gate is open, waiting at most `timeout`.
    ///
    /// Returns `None` on timeout so the caller can check for shutdown.
    pub fn pass_within<R>(&self, timeout: Duration, push: impl FnOnce() -> R) -> Option<R> {
        let held = self.lock();
        let (held, _) = self
            .released
            .wait_timeout_while(held, timeout, |held| *held)
            .unwrap_or_else(|e| e.into_inner());
        if *held {
            return None;
        }
        let out = push();
        drop(held);
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn open_gate_passes() {
        let gate = DeliveryGate::new();
        assert_eq!(gate.try_pass(|| 7), Some(7));
        assert_eq!(gate.pass_within(Duration::from_millis(1), || 8), Some(8));
    }

    #[test]
    fn held_gate_blocks_until_release() {
        let gate = Arc::new(DeliveryGate::new());
        gate.hold();
        assert_eq!(gate.try_pass(|| ()), None);
        assert_eq!(gate.pass_within(Duration::from_millis(5), || ()), None);

        let g = Arc::clone(&gate);
        let waiter = thread::spawn(move || g.pass_within(Duration::from_secs(5), || 1));
        thread::sleep(Duration::from_millis(20));
        gate.release();
        assert_eq!(waiter.join().unwrap(), Some(1));
        assert!(!gate.is_held());
    }
}
