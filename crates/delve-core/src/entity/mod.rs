//! Entity module: identities, grid occupants and the combatant model.
//!
//! This module provides the core entity types for the dungeon simulation:
//! - [`EntityId`]: Unique identifier for anything placed on the grid
//! - [`Occupant`]: The handle stored in grid cells, tagged by entity kind
//! - [`Combatant`]: The single canonical record for a fighting entity
//! - [`Element`], [`CombatClass`], [`Capabilities`]: the capability model
//! - [`CombatantFactory`]: class-tag driven construction
//!
//! # Architecture
//!
//! Every combatant, player or enemy, is one owned [`Combatant`] record. Class
//! behaviour (melee, ranged, magic) is a tagged union checked at dispatch time
//! through [`Capabilities`], and runtime modifiers are an ordered list of
//! behaviour layers inside that same record, so there is never a second copy
//! of health or position to drift out of sync.
//!
//! # Example
//!
//! ```
//! use delve_core::entity::{EntityId, Occupant};
//!
//! let goblin = Occupant::Enemy(EntityId::new(3));
//! assert_eq!(goblin.id().as_u64(), 3);
//! assert!(goblin.blocks_movement());
//! assert!(!Occupant::Item(EntityId::new(4)).blocks_movement());
//! ```

pub mod class;
pub mod combatant;
pub mod element;
pub mod factory;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use class::{Capabilities, ClassProfile, CombatClass, EvasionProfile};
pub use combatant::{
    AttackRoll, Combatant, DamageOutcome, EnemyState, Evasion, PlayerState, Role, Vitals,
};
pub use element::Element;
pub use factory::CombatantFactory;

/// Unique identifier for an entity.
///
/// Entity IDs are allocated monotonically by the world and never reused
/// within a run, so they double as a stable lock-ordering key.
///
/// # Example
///
/// ```
/// use delve_core::entity::EntityId;
///
/// let id1 = EntityId::new(1);
/// let id2 = EntityId::new(2);
///
/// assert!(id1 < id2);
/// assert_eq!(id1.as_u64(), 1);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new `EntityId` from a raw `u64` value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` value of this identifier.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

/// The handle stored in a grid cell.
///
/// Several occupants may share a cell (for example the player standing on a
/// potion). Only obstacles and combatants block movement into a cell.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Occupant {
    /// The player-controlled combatant.
    Player(EntityId),
    /// An autonomous enemy combatant.
    Enemy(EntityId),
    /// A collectible item.
    Item(EntityId),
    /// Impassable terrain.
    Obstacle(EntityId),
}

impl Occupant {
    /// Returns the underlying entity ID.
    #[must_use]
    pub const fn id(self) -> EntityId {
        match self {
            Self::Player(id) | Self::Enemy(id) | Self::Item(id) | Self::Obstacle(id) => id,
        }
    }

    /// Returns `true` if nothing else may step into a cell holding this.
    #[must_use]
    pub const fn blocks_movement(self) -> bool {
        !matches!(self, Self::Item(_))
    }

    /// Returns `true` for the player.
    #[must_use]
    pub const fn is_player(self) -> bool {
        matches!(self, Self::Player(_))
    }

    /// Returns `true` for enemies.
    #[must_use]
    pub const fn is_enemy(self) -> bool {
        matches!(self, Self::Enemy(_))
    }
}

impl fmt::Display for Occupant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player(id) => write!(f, "Player#{id}"),
            Self::Enemy(id) => write!(f, "Enemy#{id}"),
            Self::Item(id) => write!(f, "Item#{id}"),
            Self::Obstacle(id) => write!(f, "Obstacle#{id}"),
        }
    }
}
