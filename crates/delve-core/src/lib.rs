//! # Delve Core
//!
//! Concurrent grid-world simulation and combat resolution for Delve.
//!
//! A player-controlled combatant and a handful of autonomous enemies share a
//! square grid. Every enemy is driven by its own recurring agent task running
//! in parallel with the others and with the player's actions, so the grid and
//! every combatant record are guarded for concurrent use.
//!
//! ## Architecture
//!
//! - **Grid**: occupancy and per-cell locks, from the [`warren`] crate
//! - **Entities**: one canonical [`Combatant`](entity::Combatant) record per
//!   fighter, with class capabilities and elemental affinity
//! - **Modifiers**: ordered behaviour layers inside that record
//! - **Resolver**: the attacker/defender exchange state machine
//! - **Agents**: pure per-tick decisions, driven by the [`scheduler`]
//! - **World**: the orchestrator wiring all of the above to observers
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use delve_core::config::WorldConfig;
//! use delve_core::scheduler::AgentScheduler;
//! use delve_core::world::World;
//!
//! let world = Arc::new(World::new(WorldConfig::default()).unwrap());
//! let changes = world.subscribe(16);
//! let mut scheduler = AgentScheduler::start(Arc::clone(&world)).unwrap();
//!
//! let depth = world.save_snapshot();
//! assert_eq!(depth, 1);
//!
//! scheduler.stop();
//! while changes.try_recv().is_ok() {}
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub use warren;

pub mod agent;
pub mod arena;
pub mod config;
pub mod entity;
pub mod error;
pub mod item;
pub mod modifier;
pub mod notify;
pub mod resolver;
pub mod scheduler;
pub mod snapshot;
mod sync;
pub mod world;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use config::WorldConfig;
pub use entity::{Combatant, EntityId, Occupant};
pub use error::{CoreError, CoreResult};
pub use resolver::{ExchangeOutcome, ExchangeReport, GameEvent};
pub use scheduler::AgentScheduler;
pub use world::{MoveOutcome, World};
