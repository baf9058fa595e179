//! Bounded single-producer/single-consumer event queue.
//!
//! Each session owns one queue between its producer thread (socket reader
//! or log pacing loop) and the render thread. Producers decode and push;
//! only the render thread pops and mutates the scene, so the scene graph
//! itself needs no lock.
//!
//! ```text
//! producer thread                          render thread
//!     |                                        |
//!     |--push(event)--> [bounded(cap)] ------> | try_next() x N per tick
//!     |   DropOldest: evict head on full       | WorldModel::update()
//!     |   Block:      try_push, hand back      |
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};

use crate::event::SourceEvent;

/// What a producer does when the queue is full.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Evict the oldest queued event and log a warning.
    ///
    /// Used by live sources: latency stays bounded under load.
    DropOldest,
    /// Block the producer until the consumer makes room.
    ///
    /// Used by recorded sources, which pace themselves and must never
    /// lose frames silently.
    Block,
}

/// Errors returned when pushing onto a queue.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The queue has been torn down.
    #[error("event queue disconnected")]
    Disconnected,
}

/// A non-blocking push found no room.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum TryPushError {
    /// The queue is full; the event is handed back.
    #[error("event queue full")]
    Full(SourceEvent),
    /// The queue has been torn down.
    #[error("event queue disconnected")]
    Disconnected,
}

/// Constructor namespace for queue endpoints.
pub struct FrameQueue;

impl FrameQueue {
    /// Create a queue holding at most `capacity` events.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero: a rendezvous queue would make every
    /// push wait for the next render tick.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(capacity: usize, policy: OverflowPolicy) -> (FrameSender, FrameReceiver) {
        assert!(capacity > 0, "FrameQueue capacity must be > 0");
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        let sender = FrameSender {
            tx,
            evict: rx.clone(),
            policy,
            dropped: Arc::clone(&dropped),
        };
        let receiver = FrameReceiver { rx, dropped };
        (sender, receiver)
    }
}

/// Producer end of a [`FrameQueue`].
#[derive(Clone)]
pub struct FrameSender {
    tx: Sender<SourceEvent>,
    // Producer-side handle on the queue head, used only for eviction.
    evict: Receiver<SourceEvent>,
    policy: OverflowPolicy,
    dropped: Arc<AtomicU64>,
}

impl FrameSender {
    /// The overflow policy this sender applies.
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Push an event, applying the overflow policy.
    ///
    /// Under [`OverflowPolicy::Block`] this waits for room with no way out;
    /// producers that must stay responsive use [`try_push`](Self::try_push)
    /// and retry.
    ///
    /// A [`OverflowPolicy::DropOldest`] sender holds its own handle on the
    /// queue head, so the queue stays connected while the sender lives and
    /// this never fails. Such producers learn of teardown from their own
    /// stop signal.
    pub fn push(&self, event: SourceEvent) -> Result<(), SendError> {
        match self.policy {
            OverflowPolicy::Block => self.tx.send(event).map_err(|_| SendError::Disconnected),
            OverflowPolicy::DropOldest => {
                self.push_evicting(event);
                Ok(())
            }
        }
    }

    /// Push without waiting.
    ///
    /// Under [`OverflowPolicy::DropOldest`] this never fails.
    pub fn try_push(&self, event: SourceEvent) -> Result<(), TryPushError> {
        if self.policy == OverflowPolicy::DropOldest {
            self.push_evicting(event);
            return Ok(());
        }
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(back)) => Err(TryPushError::Full(back)),
            Err(TrySendError::Disconnected(_)) => Err(TryPushError::Disconnected),
        }
    }

    fn push_evicting(&self, mut event: SourceEvent) {
        // `evict` keeps the channel connected, so a failed send means full.
        while let Err(e) = self.tx.try_send(event) {
            event = e.into_inner();
            // The consumer may have emptied the slot in between; either way
            // the retry makes progress.
            if self.evict.try_recv().is_ok() {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                log::warn!("event queue full, dropped oldest event ({total} dropped so far)");
            }
        }
    }

    /// Total number of events evicted by this queue.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer end of a [`FrameQueue`].
#[derive(Clone)]
pub struct FrameReceiver {
    rx: Receiver<SourceEvent>,
    dropped: Arc<AtomicU64>,
}

impl FrameReceiver {
    /// Pop the next event without blocking.
    pub fn try_next(&self) -> Option<SourceEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Pop the next event, waiting at most `timeout`.
    pub fn next_timeout(&self, timeout: Duration) -> Option<SourceEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Pop every queued event.
    pub fn drain(&self) -> Vec<SourceEvent> {
        self.rx.try_iter().collect()
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Total number of events evicted by the producer.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Frame;

    fn frame(t: f64) -> SourceEvent {
        SourceEvent::Frame(Frame::delta(t))
    }

    fn time_of(e: &SourceEvent) -> f64 {
        match e {
            SourceEvent::Frame(f) => f.time,
            SourceEvent::SessionStart => -1.0,
        }
    }

    #[test]
    fn fifo_order() {
        let (tx, rx) = FrameQueue::new(4, OverflowPolicy::Block);
        for i in 0..3 {
            tx.push(frame(i as f64)).unwrap();
        }
        let times: Vec<f64> = rx.drain().iter().map(time_of).collect();
        assert_eq!(times, vec![0.0, 1.0, 2.0]);
        assert!(rx.is_empty());
    }

    #[test]
    fn drop_oldest_keeps_newest() {
        let (tx, rx) = FrameQueue::new(2, OverflowPolicy::DropOldest);
        for i in 0..5 {
            tx.push(frame(i as f64)).unwrap();
        }
        let times: Vec<f64> = rx.drain().iter().map(time_of).collect();
        assert_eq!(times, vec![3.0, 4.0]);
        assert_eq!(rx.dropped(), 3);
        assert_eq!(tx.dropped(), 3);
    }

    #[test]
    fn blocked_push_fails_once_consumer_is_gone() {
        let (tx, rx) = FrameQueue::new(1, OverflowPolicy::Block);
        tx.push(frame(0.0)).unwrap();
        drop(rx);
        assert_eq!(tx.push(frame(1.0)), Err(SendError::Disconnected));
        assert_eq!(tx.try_push(frame(1.0)), Err(TryPushError::Disconnected));
    }

    #[test]
    fn drop_oldest_push_outlives_consumer() {
        let (tx, rx) = FrameQueue::new(1, OverflowPolicy::DropOldest);
        drop(rx);
        for i in 0..3 {
            assert_eq!(tx.push(frame(i as f64)), Ok(()));
        }
        assert_eq!(tx.try_push(frame(3.0)), Ok(()));
        assert_eq!(tx.dropped(), 3);
    }

    #[test]
    fn blocked_push_completes_when_consumer_pops() {
        let (tx, rx) = FrameQueue::new(1, OverflowPolicy::Block);
        tx.push(frame(0.0)).unwrap();

        let handle = std::thread::spawn(move || tx.push(frame(1.0)));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(rx.try_next().map(|e| time_of(&e)), Some(0.0));

        assert_eq!(handle.join().unwrap(), Ok(()));
        assert_eq!(
            rx.next_timeout(Duration::from_secs(1)).map(|e| time_of(&e)),
            Some(1.0)
        );
    }

    #[test]
    fn try_push_hands_event_back_when_full() {
        let (tx, rx) = FrameQueue::new(1, OverflowPolicy::Block);
        tx.try_push(frame(0.0)).unwrap();
        match tx.try_push(frame(1.0)) {
            Err(TryPushError::Full(back)) => assert_eq!(time_of(&back), 1.0),
            other => panic!("expected Full, got {other:?}"),
        }
        rx.try_next();
        assert_eq!(tx.try_push(frame(1.0)), Ok(()));

        let (tx, _rx) = FrameQueue::new(1, OverflowPolicy::DropOldest);
        tx.try_push(frame(0.0)).unwrap();
        assert_eq!(tx.try_push(frame(1.0)), Ok(()));
        assert_eq!(tx.dropped(), 1);
    }

    proptest::proptest! {
        #[test]
        fn drop_oldest_keeps_newest_window(capacity in 1usize..16, pushes in 0usize..64) {
            let (tx, rx) = FrameQueue::new(capacity, OverflowPolicy::DropOldest);
            for i in 0..pushes {
                tx.push(frame(i as f64)).unwrap();
            }
            let kept = pushes.min(capacity);
            let times: Vec<f64> = rx.drain().iter().map(time_of).collect();
            let expected: Vec<f64> = (pushes - kept..pushes).map(|i| i as f64).collect();
            proptest::prop_assert_eq!(times, expected);
            proptest::prop_assert_eq!(rx.dropped(), (pushes - kept) as u64);
        }
    }

    #[test]
    #[should_panic(expected = "capacity must be > 0")]
    fn zero_capacity_panics() {
        let _ = FrameQueue::new(0, OverflowPolicy::Block);
    }
}
