//! Sharded table of timed cell locks.
//!
//! Every grid position maps onto one of a fixed number of lock shards by
//! hashing the position. Two distinct cells may share a shard; that only adds
//! contention, never incorrectness, because a shard lock is always held for a
//! single short critical section.
//!
//! Acquisition is bounded: callers wait at most a caller-supplied timeout and
//! get `None` back when the wait expires. The grid never queues contended
//! movers.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use crate::Position;

/// Default number of shards in a [`CellLocks`] table.
pub const DEFAULT_SHARDS: usize = 64;

/// One shard: a held flag plus a condition variable signalled on release.
#[derive(Debug, Default)]
struct CellLock {
    held: Mutex<bool>,
    released: Condvar,
}

impl CellLock {
    fn try_acquire_for(&self, timeout: Duration) -> bool {
        let held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut held, _) = self
            .released
            .wait_timeout_while(held, timeout, |held| *held)
            .unwrap_or_else(PoisonError::into_inner);
        if *held {
            return false;
        }
        *held = true;
        true
    }

    fn release(&self) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        *held = false;
        drop(held);
        self.released.notify_one();
    }
}

/// Fixed-size table of cell locks keyed by a hash of the position.
///
/// The table size never grows with the grid, which bounds memory no matter
/// how many distinct cells are locked over a run.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use warren::{CellLocks, Position};
///
/// let locks = CellLocks::new(16);
/// let cell = Position::new(2, 3);
///
/// let guard = locks.try_lock_for(cell, Duration::from_millis(10));
/// assert!(guard.is_some());
///
/// // A second acquisition of the same cell times out while the first is held.
/// assert!(locks.try_lock_for(cell, Duration::from_millis(10)).is_none());
///
/// drop(guard);
/// assert!(locks.try_lock_for(cell, Duration::from_millis(10)).is_some());
/// ```
pub struct CellLocks {
    shards: Box<[CellLock]>,
}

impl CellLocks {
    /// Creates a table with `shards` locks (at least one).
    #[must_use]
    pub fn new(shards: usize) -> Self {
        let shards = shards.max(1);
        Self {
            shards: (0..shards).map(|_| CellLock::default()).collect(),
        }
    }

    /// Number of shards in the table.
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Shard index that guards `position`.
    #[must_use]
    pub fn shard_of(&self, position: Position) -> usize {
        let mut hasher = DefaultHasher::new();
        position.hash(&mut hasher);
        // Modulo keeps the value below the shard count, so truncation is lossless.
        #[allow(clippy::cast_possible_truncation)]
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        index
    }

    /// Tries to lock the cell at `position`, waiting at most `timeout`.
    ///
    /// Returns a guard that releases the lock when dropped, or `None` when the
    /// wait expired. The guard releases on every exit path, including early
    /// returns and unwinding.
    #[must_use]
    pub fn try_lock_for(&self, position: Position, timeout: Duration) -> Option<CellGuard<'_>> {
        let shard = &self.shards[self.shard_of(position)];
        if shard.try_acquire_for(timeout) {
            Some(CellGuard { shard, position })
        } else {
            tracing::trace!(cell = %position, ?timeout, "cell lock wait expired");
            None
        }
    }
}

impl Default for CellLocks {
    fn default() -> Self {
        Self::new(DEFAULT_SHARDS)
    }
}

impl fmt::Debug for CellLocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellLocks")
            .field("shards", &self.shards.len())
            .finish()
    }
}

/// RAII guard for a held cell lock.
#[must_use = "the cell is unlocked as soon as the guard is dropped"]
pub struct CellGuard<'a> {
    shard: &'a CellLock,
    position: Position,
}

impl CellGuard<'_> {
    /// The position this guard was taken for.
    #[must_use]
    pub fn position(&self) -> Position {
        self.position
    }
}

impl Drop for CellGuard<'_> {
    fn drop(&mut self) {
        self.shard.release();
    }
}

impl fmt::Debug for CellGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellGuard")
            .field("position", &self.position)
            .finish()
    }
}
