//! Deep copies of world state and the undo stack that holds them.
//!
//! A [`Snapshot`] shares nothing with the live world: every combatant is
//! cloned out of its lock, so later mutations never leak into it. The saved
//! grid leaves the player out, since the player record is restored on its own
//! and re-placed at its saved position.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use warren::Position;

use crate::entity::{Combatant, EntityId, Occupant};
use crate::item::PlacedItem;

/// Immutable record of world state at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The player record.
    pub player: Combatant,
    /// Every living enemy record, ascending by ID.
    pub enemies: Vec<Combatant>,
    /// Items lying on the grid.
    pub items: Vec<PlacedItem>,
    /// Obstacles.
    pub obstacles: Vec<(EntityId, Position)>,
    /// Grid contents without the player, in position order.
    pub grid: Vec<(Position, BTreeSet<Occupant>)>,
    /// Last allocated entity ID.
    pub last_id: u64,
}

impl Snapshot {
    /// Number of grid entries across all saved cells.
    #[must_use]
    pub fn occupant_count(&self) -> usize {
        self.grid.iter().map(|(_, set)| set.len()).sum()
    }
}

/// Unbounded last-in-first-out stack of snapshots.
///
/// # Example
///
/// ```
/// use delve_core::snapshot::SnapshotStack;
///
/// let stack = SnapshotStack::new();
/// assert!(stack.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SnapshotStack {
    snapshots: Vec<Snapshot>,
}

impl SnapshotStack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a snapshot and returns the new depth.
    pub fn push(&mut self, snapshot: Snapshot) -> usize {
        self.snapshots.push(snapshot);
        self.snapshots.len()
    }

    /// Pops the most recent snapshot.
    pub fn pop(&mut self) -> Option<Snapshot> {
        self.snapshots.pop()
    }

    /// The most recent snapshot, left in place.
    #[must_use]
    pub fn peek(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    /// Number of held snapshots.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.snapshots.len()
    }

    /// Returns `true` if nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
