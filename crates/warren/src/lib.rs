//! # Warren
//!
//! Concurrent occupancy grid for turn-oriented dungeon simulation.
//!
//! Warren represents the world as a square grid of cells, each holding a set of
//! occupants. Many agents may mutate the grid at once, so the crate provides:
//!
//! - **Occupancy queries**: `is_empty`, `entities_at`, and pruned empty cells
//! - **Bounded placement search**: random empty cell lookup with a fixed retry budget
//! - **Per-cell locking**: a sharded table of timed locks guarding cell moves
//! - **Deterministic hashing**: stable state hashes for replay and restore checks
//!
//! ## Quick Start
//!
//! ```
//! use std::time::Duration;
//! use warren::{Grid, Position};
//!
//! let grid: Grid<u32> = Grid::new(10);
//! let from = Position::new(5, 5);
//! let to = Position::new(5, 6);
//! grid.add(from, 7).unwrap();
//!
//! // Take the destination lock before testing emptiness and moving.
//! if let Some(_guard) = grid.lock_cell(to, Duration::from_millis(100)) {
//!     if grid.is_empty(to) {
//!         grid.move_entity(&7, from, to).unwrap();
//!     }
//! }
//!
//! assert!(grid.entities_at(to).contains(&7));
//! assert!(grid.is_empty(from));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod grid;
pub mod hash;
pub mod lock;
pub mod position;

// Re-exports for convenience
pub use grid::{Grid, GridError, MIN_GRID_SIZE};
pub use hash::hash_occupancy;
pub use lock::{CellGuard, CellLocks};
pub use position::{Direction, Position};
