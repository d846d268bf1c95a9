//! Collectible items and the player inventory.

use serde::{Deserialize, Serialize};
use warren::Position;

use crate::entity::EntityId;

/// What an item does once collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemKind {
    /// Restores health when used, never past max health.
    Potion {
        /// Health restored.
        restore: i32,
    },
    /// Converted to treasure points on pickup.
    Treasure {
        /// Points awarded.
        points: u32,
    },
    /// Treasure dropped by a defeated enemy.
    Loot {
        /// Points awarded.
        points: u32,
    },
}

impl ItemKind {
    /// Treasure points awarded on pickup, or `None` for items that go to the
    /// inventory.
    #[must_use]
    pub fn points(self) -> Option<u32> {
        match self {
            Self::Treasure { points } | Self::Loot { points } => Some(points),
            Self::Potion { .. } => None,
        }
    }
}

/// A collectible entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    /// Unique ID, shared with the grid occupant handle.
    pub id: EntityId,
    /// Effect on pickup or use.
    pub kind: ItemKind,
}

impl Item {
    /// Creates an item.
    #[must_use]
    pub fn new(id: EntityId, kind: ItemKind) -> Self {
        Self { id, kind }
    }
}

/// An item lying on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedItem {
    /// Cell holding the item.
    pub position: Position,
    /// The item itself.
    pub item: Item,
}

/// Ordered list of items carried by the player.
///
/// Both mutations report failure with `false` instead of an error: adding an
/// item whose ID is already carried and removing an ID that is not carried
/// leave the inventory unchanged.
///
/// # Example
///
/// ```
/// use delve_core::entity::EntityId;
/// use delve_core::item::{Inventory, Item, ItemKind};
///
/// let mut bag = Inventory::new();
/// let potion = Item::new(EntityId::new(5), ItemKind::Potion { restore: 20 });
/// assert!(bag.add(potion));
/// assert!(!bag.add(potion));
/// assert_eq!(bag.remove(EntityId::new(5)), Some(potion));
/// assert_eq!(bag.remove(EntityId::new(5)), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    items: Vec<Item>,
}

impl Inventory {
    /// Creates an empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an item. Returns `false` if an item with the same ID is present.
    pub fn add(&mut self, item: Item) -> bool {
        if self.contains(item.id) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Removes and returns the item with `id`, or `None` if absent.
    pub fn remove(&mut self, id: EntityId) -> Option<Item> {
        let index = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(index))
    }

    /// Returns `true` if an item with `id` is carried.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    /// Returns the item with `id`.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Iterates over carried items in pickup order.
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    /// Number of carried items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing is carried.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
