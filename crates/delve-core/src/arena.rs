//! Arena module: the roster of everything placed in the world.
//!
//! The Arena owns the enemy records, the items lying on the grid and the
//! obstacles. It is the counterpart of the grid: the grid answers "what is at
//! this cell", the Arena answers "what is this entity".
//!
//! # Architecture
//!
//! Storage is `BTreeMap` keyed by [`EntityId`] so iteration order is the
//! allocation order on every platform. Entity IDs are monotonically
//! increasing and never reused within a run.
//!
//! Each enemy record is a [`SharedCombatant`]: its own mutex, shared between
//! the roster, the enemy's agent task and the combat path. Callers clone the
//! handle out of the Arena and release the Arena before locking the record.
//!
//! # Example
//!
//! ```
//! use delve_core::arena::Arena;
//! use delve_core::entity::{Combatant, CombatClass};
//! use warren::Position;
//!
//! let mut arena = Arena::new();
//! let id = arena.allocate_id();
//! arena.insert_enemy(Combatant::new(id, "Goblin", CombatClass::Goblin, Position::new(1, 1)));
//!
//! assert_eq!(arena.enemy_count(), 1);
//! assert!(arena.enemy(id).is_some());
//! assert!(arena.remove_enemy(id).is_some());
//! assert!(arena.enemy(id).is_none());
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use warren::Position;

use crate::entity::{Combatant, EntityId};
use crate::item::{Item, PlacedItem};

/// A combatant record behind its own lock.
pub type SharedCombatant = Arc<Mutex<Combatant>>;

/// Roster of enemies, items and obstacles.
#[derive(Debug, Default)]
pub struct Arena {
    next_id: u64,
    enemies: BTreeMap<EntityId, SharedCombatant>,
    items: BTreeMap<EntityId, PlacedItem>,
    obstacles: BTreeMap<EntityId, Position>,
}

impl Arena {
    /// Creates an empty arena. The first allocated ID is 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh entity ID.
    pub fn allocate_id(&mut self) -> EntityId {
        self.next_id += 1;
        EntityId::new(self.next_id)
    }

    /// The last allocated raw ID.
    #[must_use]
    pub fn last_id(&self) -> u64 {
        self.next_id
    }

    /// Moves the allocator forward so the next ID is above `last`.
    pub fn reserve_through(&mut self, last: u64) {
        self.next_id = self.next_id.max(last);
    }

    // =========================================================================
    // Enemies
    // =========================================================================

    /// Adds an enemy record and returns its shared handle.
    pub fn insert_enemy(&mut self, enemy: Combatant) -> SharedCombatant {
        let id = enemy.id();
        let handle = Arc::new(Mutex::new(enemy));
        self.enemies.insert(id, Arc::clone(&handle));
        handle
    }

    /// Returns the handle for `id`.
    #[must_use]
    pub fn enemy(&self, id: EntityId) -> Option<SharedCombatant> {
        self.enemies.get(&id).cloned()
    }

    /// Removes an enemy from the roster.
    pub fn remove_enemy(&mut self, id: EntityId) -> Option<SharedCombatant> {
        self.enemies.remove(&id)
    }

    /// IDs of every enemy, ascending.
    #[must_use]
    pub fn enemy_ids(&self) -> Vec<EntityId> {
        self.enemies.keys().copied().collect()
    }

    /// Handles of every enemy, ascending by ID.
    #[must_use]
    pub fn enemy_handles(&self) -> Vec<(EntityId, SharedCombatant)> {
        self.enemies
            .iter()
            .map(|(id, handle)| (*id, Arc::clone(handle)))
            .collect()
    }

    /// Number of enemies.
    #[must_use]
    pub fn enemy_count(&self) -> usize {
        self.enemies.len()
    }

    /// Replaces the whole enemy roster.
    pub fn replace_enemies(&mut self, enemies: impl IntoIterator<Item = Combatant>) {
        self.enemies = enemies
            .into_iter()
            .map(|enemy| (enemy.id(), Arc::new(Mutex::new(enemy))))
            .collect();
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// Places an item.
    pub fn insert_item(&mut self, position: Position, item: Item) {
        self.items.insert(item.id, PlacedItem { position, item });
    }

    /// Returns the placed item with `id`.
    #[must_use]
    pub fn item(&self, id: EntityId) -> Option<&PlacedItem> {
        self.items.get(&id)
    }

    /// Takes an item off the grid roster.
    pub fn remove_item(&mut self, id: EntityId) -> Option<PlacedItem> {
        self.items.remove(&id)
    }

    /// Every placed item, ascending by ID.
    pub fn items(&self) -> impl Iterator<Item = &PlacedItem> {
        self.items.values()
    }

    /// Replaces every placed item.
    pub fn replace_items(&mut self, items: impl IntoIterator<Item = PlacedItem>) {
        self.items = items.into_iter().map(|placed| (placed.item.id, placed)).collect();
    }

    // =========================================================================
    // Obstacles
    // =========================================================================

    /// Records an obstacle.
    pub fn insert_obstacle(&mut self, id: EntityId, position: Position) {
        self.obstacles.insert(id, position);
    }

    /// Every obstacle, ascending by ID.
    pub fn obstacles(&self) -> impl Iterator<Item = (EntityId, Position)> + '_ {
        self.obstacles.iter().map(|(id, pos)| (*id, *pos))
    }

    /// Replaces every obstacle.
    pub fn replace_obstacles(&mut self, obstacles: impl IntoIterator<Item = (EntityId, Position)>) {
        self.obstacles = obstacles.into_iter().collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::CombatClass;
    use crate::item::ItemKind;

    #[test]
    fn ids_are_monotonic() {
        let mut arena = Arena::new();
        let a = arena.allocate_id();
        let b = arena.allocate_id();
        assert!(a < b);
        assert_eq!(arena.last_id(), 2);
        arena.reserve_through(10);
        assert_eq!(arena.allocate_id(), EntityId::new(11));
        arena.reserve_through(3);
        assert_eq!(arena.allocate_id(), EntityId::new(12));
    }

    #[test]
    fn enemy_handles_share_the_record() {
        let mut arena = Arena::new();
        let id = arena.allocate_id();
        let handle =
            arena.insert_enemy(Combatant::new(id, "Goblin", CombatClass::Goblin, Position::new(0, 0)));
        handle.lock().unwrap().take_raw_damage(5);
        let again = arena.enemy(id).unwrap();
        assert_eq!(again.lock().unwrap().health(), 25);
    }

    #[test]
    fn iteration_is_by_id() {
        let mut arena = Arena::new();
        let ids: Vec<_> = (0..5).map(|_| arena.allocate_id()).collect();
        for id in ids.iter().rev() {
            arena.insert_enemy(Combatant::new(*id, "Goblin", CombatClass::Goblin, Position::new(0, 0)));
        }
        assert_eq!(arena.enemy_ids(), ids);
    }

    #[test]
    fn items_round_trip() {
        let mut arena = Arena::new();
        let id = arena.allocate_id();
        let item = Item::new(id, ItemKind::Treasure { points: 4 });
        arena.insert_item(Position::new(3, 3), item);
        assert_eq!(arena.item(id).map(|p| p.position), Some(Position::new(3, 3)));
        assert_eq!(arena.remove_item(id).map(|p| p.item), Some(item));
        assert_eq!(arena.items().count(), 0);
    }
}
