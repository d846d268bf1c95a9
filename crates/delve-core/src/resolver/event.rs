//! Event log for fire-and-forget game messages.
//!
//! The world records a [`GameEvent`] for every externally visible change.
//! Recording never blocks on a consumer and never fails: the log is a bounded
//! ring that drops its oldest entry when full. Each event is also emitted
//! through `tracing` so a subscriber sees the same stream.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;
use warren::Position;

use super::ExchangeReport;
use crate::entity::EntityId;
use crate::item::ItemKind;
use crate::sync::lock;

/// Entries kept before the oldest is discarded.
pub const DEFAULT_EVENT_CAPACITY: usize = 4_096;

/// Something observable that happened in the world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// The player stepped to a new cell.
    PlayerMoved {
        /// Previous cell.
        from: Position,
        /// New cell.
        to: Position,
    },
    /// An enemy agent stepped to a new cell.
    EnemyMoved {
        /// The enemy.
        enemy: EntityId,
        /// Previous cell.
        from: Position,
        /// New cell.
        to: Position,
    },
    /// A combat exchange was resolved.
    Exchange(ExchangeReport),
    /// A low-health teleport relocated a combatant.
    Teleported {
        /// Who moved.
        entity: EntityId,
        /// Previous cell.
        from: Position,
        /// New cell.
        to: Position,
    },
    /// A regeneration pulse healed a combatant.
    Regenerated {
        /// Who healed.
        entity: EntityId,
        /// Health restored.
        healed: i32,
    },
    /// An enemy was removed from the world.
    EnemyDefeated {
        /// The enemy.
        enemy: EntityId,
        /// Where it fell and its loot was dropped.
        position: Position,
        /// Treasure value of the dropped loot.
        loot: u32,
    },
    /// The player died. The game is over.
    PlayerDefeated,
    /// The player collected an item.
    ItemPickedUp {
        /// The item.
        item: EntityId,
        /// What it was.
        kind: ItemKind,
    },
    /// The player used an inventory item.
    ItemUsed {
        /// The item.
        item: EntityId,
        /// Health restored.
        restored: i32,
    },
    /// A snapshot was pushed.
    SnapshotSaved {
        /// Stack depth after the push.
        depth: usize,
    },
    /// A snapshot was popped and applied.
    SnapshotRestored {
        /// Stack depth after the pop.
        depth: usize,
    },
}

/// Bounded in-memory log of [`GameEvent`]s.
///
/// # Example
///
/// ```
/// use delve_core::resolver::{EventLog, GameEvent};
///
/// let log = EventLog::with_capacity(2);
/// log.record(GameEvent::PlayerDefeated);
/// log.record(GameEvent::SnapshotSaved { depth: 1 });
/// log.record(GameEvent::SnapshotSaved { depth: 2 });
///
/// // The oldest entry was dropped.
/// let events = log.take_events();
/// assert_eq!(events.len(), 2);
/// assert_eq!(events[0], GameEvent::SnapshotSaved { depth: 1 });
/// assert!(log.is_empty());
/// ```
#[derive(Debug)]
pub struct EventLog {
    events: Mutex<VecDeque<GameEvent>>,
    capacity: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventLog {
    /// Creates a log with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a log holding at most `capacity` events (at least one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_EVENT_CAPACITY))),
            capacity,
        }
    }

    /// Records an event, discarding the oldest one if the log is full.
    pub fn record(&self, event: GameEvent) {
        debug!(?event, "game event");
        let mut events = lock(&self.events);
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Drains and returns every recorded event, oldest first.
    pub fn take_events(&self) -> Vec<GameEvent> {
        lock(&self.events).drain(..).collect()
    }

    /// Number of events currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.events).len()
    }

    /// Returns `true` if nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.events).is_empty()
    }

    /// Discards every held event.
    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn take_events_drains_in_order() {
        let log = EventLog::new();
        log.record(GameEvent::SnapshotSaved { depth: 1 });
        log.record(GameEvent::SnapshotRestored { depth: 0 });
        assert_eq!(log.len(), 2);
        assert_eq!(
            log.take_events(),
            vec![
                GameEvent::SnapshotSaved { depth: 1 },
                GameEvent::SnapshotRestored { depth: 0 }
            ]
        );
        assert!(log.is_empty());
    }

    #[test]
    fn concurrent_writers_never_exceed_capacity() {
        let log = Arc::new(EventLog::with_capacity(50));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for depth in 0..100 {
                        log.record(GameEvent::SnapshotSaved { depth });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(log.len(), 50);
    }

    #[test]
    fn zero_capacity_is_bumped_to_one() {
        let log = EventLog::with_capacity(0);
        log.record(GameEvent::PlayerDefeated);
        log.record(GameEvent::PlayerDefeated);
        assert_eq!(log.len(), 1);
    }
}
