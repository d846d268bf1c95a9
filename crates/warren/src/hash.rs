//! State hashing for determinism and restore verification.
//!
//! Two grids with the same edge length and the same occupants in the same
//! cells hash identically, regardless of the order the occupants were added
//! in. Tests use this to check that restoring a snapshot reproduces the saved
//! occupancy exactly.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::Grid;

/// Compute a deterministic hash of grid occupancy.
///
/// The hash covers:
/// - The grid edge length
/// - Every non-empty cell position, in row-major order
/// - Every occupant of each cell, in occupant order
#[must_use]
pub fn hash_occupancy<T: Ord + Clone + Hash>(grid: &Grid<T>) -> u64 {
    let mut hasher = DefaultHasher::new();
    grid.size().hash(&mut hasher);

    for (position, occupants) in grid.occupied_cells() {
        position.hash(&mut hasher);
        occupants.len().hash(&mut hasher);
        for occupant in &occupants {
            occupant.hash(&mut hasher);
        }
    }

    hasher.finish()
}
