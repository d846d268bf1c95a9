//! Payload-free "state changed" notifications for observers.
//!
//! Observers subscribe with a bounded channel. Publishing uses `try_send`, so
//! a slow observer only misses notifications (it will redraw on the next one)
//! and a dropped receiver is pruned on the next publish.

use std::sync::Mutex;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::trace;

use crate::sync::lock;

/// Marker sent after any externally visible mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateChanged;

/// Fan-out of [`StateChanged`] to every subscriber.
///
/// # Example
///
/// ```
/// use delve_core::notify::{Notifier, StateChanged};
///
/// let notifier = Notifier::new();
/// let rx = notifier.subscribe(1);
/// notifier.publish();
/// notifier.publish(); // channel full: skipped, not blocked
/// assert_eq!(rx.try_recv(), Ok(StateChanged));
/// assert!(rx.try_recv().is_err());
/// ```
#[derive(Debug, Default)]
pub struct Notifier {
    subscribers: Mutex<Vec<Sender<StateChanged>>>,
}

impl Notifier {
    /// Creates a notifier with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer whose channel buffers up to `capacity`
    /// notifications (at least one).
    #[must_use]
    pub fn subscribe(&self, capacity: usize) -> Receiver<StateChanged> {
        let (tx, rx) = bounded(capacity.max(1));
        lock(&self.subscribers).push(tx);
        rx
    }

    /// Notifies every observer without blocking.
    pub fn publish(&self) {
        lock(&self.subscribers).retain(|tx| match tx.try_send(StateChanged) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => {
                trace!("pruning disconnected observer");
                false
            }
        });
    }

    /// Number of live subscribers as of the last publish.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }
}
