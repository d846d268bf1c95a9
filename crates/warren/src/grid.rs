//! Occupancy grid: the mapping from cell to the set of entities in it.
//!
//! The grid is shared between many agent threads and the foreground action
//! path, so every method takes `&self`. The occupancy map sits behind a single
//! `RwLock` held only for the duration of one map operation; movement
//! serialization is the job of the per-cell [`CellLocks`] table, which callers
//! acquire through [`Grid::lock_cell`] before testing a destination.
//!
//! # Emptiness
//!
//! A cell is empty when it has no entry in the map or its occupant set is
//! empty. Entries are pruned as soon as their set empties, so the map never
//! carries empty sets in practice.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use rand::Rng;
use thiserror::Error;

use crate::lock::{CellGuard, CellLocks, DEFAULT_SHARDS};
use crate::Position;

/// Smallest grid edge a playable world may use.
pub const MIN_GRID_SIZE: i32 = 10;

/// Errors raised by grid operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    /// A position-mutating call named a cell outside the grid.
    #[error("position {position} is outside the {size}x{size} grid")]
    InvalidPosition {
        /// The rejected position.
        position: Position,
        /// Edge length of the grid.
        size: i32,
    },

    /// The random empty-cell search used up its attempt budget.
    #[error("no empty cell found after {attempts} attempts")]
    NoSpaceAvailable {
        /// Number of cells sampled before giving up.
        attempts: u64,
    },
}

/// Square occupancy grid with per-cell locking.
///
/// `T` is the occupant handle stored in each cell. It must be `Ord` so cell
/// contents iterate deterministically, and `Clone` so callers can take
/// independent copies of a cell's contents.
///
/// # Example
///
/// ```
/// use warren::{Grid, Position};
///
/// let grid: Grid<&str> = Grid::new(10);
/// let cell = Position::new(0, 0);
///
/// assert!(grid.add(cell, "goblin").unwrap());
/// assert!(!grid.add(cell, "goblin").unwrap()); // duplicate is a no-op
/// assert!(!grid.is_empty(cell));
///
/// assert!(grid.remove(cell, &"goblin").unwrap());
/// assert!(grid.is_empty(cell));
/// ```
#[derive(Debug)]
pub struct Grid<T> {
    size: i32,
    cells: RwLock<BTreeMap<Position, BTreeSet<T>>>,
    locks: CellLocks,
}

impl<T: Ord + Clone> Grid<T> {
    /// Creates an empty `size` × `size` grid with the default lock table.
    #[must_use]
    pub fn new(size: i32) -> Self {
        Self::with_lock_shards(size, DEFAULT_SHARDS)
    }

    /// Creates an empty grid with an explicit number of lock shards.
    #[must_use]
    pub fn with_lock_shards(size: i32, shards: usize) -> Self {
        Self {
            size: size.max(1),
            cells: RwLock::new(BTreeMap::new()),
            locks: CellLocks::new(shards),
        }
    }

    /// Edge length of the grid.
    #[must_use]
    pub fn size(&self) -> i32 {
        self.size
    }

    /// Returns `true` if `position` lies on the grid.
    #[must_use]
    pub fn in_bounds(&self, position: Position) -> bool {
        (0..self.size).contains(&position.row) && (0..self.size).contains(&position.col)
    }

    /// Validates `position`, returning [`GridError::InvalidPosition`] when it
    /// lies off the grid.
    ///
    /// # Errors
    ///
    /// Returns an error if the position is out of bounds.
    pub fn check(&self, position: Position) -> Result<(), GridError> {
        if self.in_bounds(position) {
            Ok(())
        } else {
            Err(GridError::InvalidPosition {
                position,
                size: self.size,
            })
        }
    }

    /// Returns `true` if no occupant is recorded at `position`.
    #[must_use]
    pub fn is_empty(&self, position: Position) -> bool {
        self.read()
            .get(&position)
            .map_or(true, BTreeSet::is_empty)
    }

    /// Returns a copy of the occupant set at `position` (possibly empty).
    #[must_use]
    pub fn entities_at(&self, position: Position) -> BTreeSet<T> {
        self.read().get(&position).cloned().unwrap_or_default()
    }

    /// Returns `true` if `entity` is recorded at `position`.
    #[must_use]
    pub fn contains(&self, position: Position, entity: &T) -> bool {
        self.read()
            .get(&position)
            .is_some_and(|set| set.contains(entity))
    }

    /// Returns `true` if any occupant at `position` satisfies `predicate`.
    #[must_use]
    pub fn any_at(&self, position: Position, predicate: impl Fn(&T) -> bool) -> bool {
        self.read()
            .get(&position)
            .is_some_and(|set| set.iter().any(predicate))
    }

    /// Every position at which `entity` is currently recorded.
    ///
    /// Outside a move in progress this is at most one position.
    #[must_use]
    pub fn positions_of(&self, entity: &T) -> Vec<Position> {
        self.read()
            .iter()
            .filter(|(_, set)| set.contains(entity))
            .map(|(pos, _)| *pos)
            .collect()
    }

    /// Adds `entity` at `position`.
    ///
    /// Returns `Ok(false)` without changing anything if the entity is already
    /// there.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidPosition`] if the position is off the grid.
    pub fn add(&self, position: Position, entity: T) -> Result<bool, GridError> {
        self.check(position)?;
        Ok(self.write().entry(position).or_default().insert(entity))
    }

    /// Removes `entity` from `position`, pruning the cell if it empties.
    ///
    /// Returns `Ok(false)` if the entity was not there.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidPosition`] if the position is off the grid.
    pub fn remove(&self, position: Position, entity: &T) -> Result<bool, GridError> {
        self.check(position)?;
        let mut cells = self.write();
        Ok(Self::remove_locked(&mut cells, position, entity))
    }

    /// Moves `entity` from `from` to `to` in a single map update.
    ///
    /// No reader ever observes the entity in both cells or in neither. Returns
    /// `Ok(false)` and leaves the grid untouched if the entity is not at
    /// `from`. Destination emptiness is the caller's concern and should be
    /// checked under [`Grid::lock_cell`].
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidPosition`] if either position is off the grid.
    pub fn move_entity(&self, entity: &T, from: Position, to: Position) -> Result<bool, GridError> {
        self.check(from)?;
        self.check(to)?;
        let mut cells = self.write();
        if !Self::remove_locked(&mut cells, from, entity) {
            return Ok(false);
        }
        cells.entry(to).or_default().insert(entity.clone());
        Ok(true)
    }

    /// Samples cells uniformly at random until it finds an empty one.
    ///
    /// The search makes at most `size²` independent draws with no memory of
    /// cells already tried, so it can miss a lone empty cell on a nearly full
    /// grid. The result is not reserved; place into it under its cell lock.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::NoSpaceAvailable`] when every draw hits an
    /// occupied cell.
    pub fn random_empty_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Position, GridError> {
        let attempts = u64::from(self.size.unsigned_abs()).pow(2);
        let cells = self.read();
        for _ in 0..attempts {
            let candidate = Position::new(rng.gen_range(0..self.size), rng.gen_range(0..self.size));
            if cells.get(&candidate).map_or(true, BTreeSet::is_empty) {
                return Ok(candidate);
            }
        }
        tracing::debug!(attempts, occupied = cells.len(), "no empty cell found");
        Err(GridError::NoSpaceAvailable { attempts })
    }

    /// Locks the cell at `position`, waiting at most `timeout`.
    ///
    /// Callers must hold this guard while they test the destination and move
    /// into it. `None` means the wait expired and the move should be skipped.
    #[must_use]
    pub fn lock_cell(&self, position: Position, timeout: Duration) -> Option<CellGuard<'_>> {
        self.locks.try_lock_for(position, timeout)
    }

    /// Copy of every non-empty cell, in position order.
    #[must_use]
    pub fn occupied_cells(&self) -> Vec<(Position, BTreeSet<T>)> {
        self.read()
            .iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(pos, set)| (*pos, set.clone()))
            .collect()
    }

    /// Total number of occupant entries across all cells.
    #[must_use]
    pub fn occupant_count(&self) -> usize {
        self.read().values().map(BTreeSet::len).sum()
    }

    /// Replaces the whole occupancy map with `cells`.
    ///
    /// Used when restoring a saved world. The replacement is a single write,
    /// so readers see either the old contents or the new ones.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidPosition`] (and leaves the grid unchanged)
    /// if any cell lies off the grid.
    pub fn replace_contents(
        &self,
        cells: impl IntoIterator<Item = (Position, BTreeSet<T>)>,
    ) -> Result<(), GridError> {
        let mut next = BTreeMap::new();
        for (position, set) in cells {
            self.check(position)?;
            if !set.is_empty() {
                next.entry(position).or_insert_with(BTreeSet::new).extend(set);
            }
        }
        *self.write() = next;
        Ok(())
    }

    /// Removes every occupant.
    pub fn clear(&self) {
        self.write().clear();
    }

    fn remove_locked(
        cells: &mut BTreeMap<Position, BTreeSet<T>>,
        position: Position,
        entity: &T,
    ) -> bool {
        let Some(set) = cells.get_mut(&position) else {
            return false;
        };
        let removed = set.remove(entity);
        if set.is_empty() {
            cells.remove(&position);
        }
        removed
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<Position, BTreeSet<T>>> {
        self.cells.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<Position, BTreeSet<T>>> {
        self.cells.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn fill(grid: &Grid<u32>) {
        let mut id = 0;
        for row in 0..grid.size() {
            for col in 0..grid.size() {
                grid.add(Position::new(row, col), id).unwrap();
                id += 1;
            }
        }
    }

    mod occupancy_tests {
        use super::*;

        #[test]
        fn new_grid_is_empty_everywhere() {
            let grid: Grid<u32> = Grid::new(10);
            assert_eq!(grid.size(), 10);
            assert!(grid.is_empty(Position::new(0, 0)));
            assert!(grid.entities_at(Position::new(9, 9)).is_empty());
            assert_eq!(grid.occupant_count(), 0);
        }

        #[test]
        fn cells_hold_multiple_occupants() {
            let grid: Grid<u32> = Grid::new(10);
            let cell = Position::new(4, 4);
            assert!(grid.add(cell, 1).unwrap());
            assert!(grid.add(cell, 2).unwrap());
            let set = grid.entities_at(cell);
            assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![1, 2]);
        }

        #[test]
        fn duplicate_add_is_a_noop() {
            let grid: Grid<u32> = Grid::new(10);
            let cell = Position::new(1, 1);
            assert!(grid.add(cell, 5).unwrap());
            assert!(!grid.add(cell, 5).unwrap());
            assert_eq!(grid.occupant_count(), 1);
        }

        #[test]
        fn removing_absent_entity_returns_false() {
            let grid: Grid<u32> = Grid::new(10);
            let cell = Position::new(1, 1);
            assert!(!grid.remove(cell, &5).unwrap());
            grid.add(cell, 6).unwrap();
            assert!(!grid.remove(cell, &5).unwrap());
            assert!(grid.contains(cell, &6));
        }

        #[test]
        fn emptied_cell_is_pruned() {
            let grid: Grid<u32> = Grid::new(10);
            let cell = Position::new(2, 2);
            grid.add(cell, 1).unwrap();
            grid.remove(cell, &1).unwrap();
            assert!(grid.is_empty(cell));
            assert!(grid.occupied_cells().is_empty());
        }

        #[test]
        fn out_of_bounds_mutations_are_rejected() {
            let grid: Grid<u32> = Grid::new(10);
            for bad in [
                Position::new(-1, 0),
                Position::new(0, -1),
                Position::new(10, 0),
                Position::new(0, 10),
            ] {
                assert_eq!(
                    grid.add(bad, 1),
                    Err(GridError::InvalidPosition { position: bad, size: 10 })
                );
                assert!(grid.remove(bad, &1).is_err());
            }
            assert_eq!(grid.occupant_count(), 0);
        }

        #[test]
        fn any_at_and_positions_of() {
            let grid: Grid<u32> = Grid::new(10);
            grid.add(Position::new(3, 3), 10).unwrap();
            assert!(grid.any_at(Position::new(3, 3), |e| *e >= 10));
            assert!(!grid.any_at(Position::new(3, 3), |e| *e > 10));
            assert_eq!(grid.positions_of(&10), vec![Position::new(3, 3)]);
            assert!(grid.positions_of(&11).is_empty());
        }
    }

    mod move_tests {
        use super::*;

        #[test]
        fn move_relocates_entity() {
            let grid: Grid<u32> = Grid::new(10);
            let from = Position::new(5, 5);
            let to = Position::new(5, 6);
            grid.add(from, 1).unwrap();

            assert!(grid.move_entity(&1, from, to).unwrap());
            assert!(grid.contains(to, &1));
            assert!(!grid.contains(from, &1));
            assert_eq!(grid.positions_of(&1), vec![to]);
        }

        #[test]
        fn move_of_absent_entity_changes_nothing() {
            let grid: Grid<u32> = Grid::new(10);
            let from = Position::new(5, 5);
            let to = Position::new(5, 6);
            assert!(!grid.move_entity(&1, from, to).unwrap());
            assert!(grid.is_empty(to));
        }

        #[test]
        fn move_off_grid_is_rejected_and_state_kept() {
            let grid: Grid<u32> = Grid::new(10);
            let from = Position::new(0, 0);
            grid.add(from, 1).unwrap();
            assert!(grid.move_entity(&1, from, Position::new(-1, 0)).is_err());
            assert!(grid.contains(from, &1));
        }
    }

    mod placement_tests {
        use super::*;

        #[test]
        fn random_empty_position_avoids_occupied_cells() {
            let grid: Grid<u32> = Grid::new(10);
            let mut rng = ChaCha8Rng::seed_from_u64(7);
            for i in 0..50 {
                let pos = grid.random_empty_position(&mut rng).unwrap();
                assert!(grid.in_bounds(pos));
                assert!(grid.is_empty(pos));
                grid.add(pos, i).unwrap();
            }
            assert_eq!(grid.occupant_count(), 50);
        }

        #[test]
        fn full_grid_reports_no_space_after_size_squared_attempts() {
            let grid: Grid<u32> = Grid::new(10);
            fill(&grid);
            let mut rng = ChaCha8Rng::seed_from_u64(1);
            assert_eq!(
                grid.random_empty_position(&mut rng),
                Err(GridError::NoSpaceAvailable { attempts: 100 })
            );
        }
    }

    mod lock_tests {
        use super::*;

        #[test]
        fn lock_cell_is_exclusive() {
            let grid: Grid<u32> = Grid::new(10);
            let cell = Position::new(2, 2);
            let guard = grid.lock_cell(cell, Duration::from_millis(10));
            assert!(guard.is_some());
            assert!(grid.lock_cell(cell, Duration::from_millis(10)).is_none());
            drop(guard);
            assert!(grid.lock_cell(cell, Duration::from_millis(10)).is_some());
        }
    }

    #[test]
    fn replace_contents_swaps_whole_map() {
        let grid: Grid<u32> = Grid::new(10);
        grid.add(Position::new(0, 0), 1).unwrap();
        let mut set = BTreeSet::new();
        set.insert(9);
        grid.replace_contents(vec![(Position::new(4, 4), set), (Position::new(5, 5), BTreeSet::new())])
            .unwrap();
        assert!(grid.is_empty(Position::new(0, 0)));
        assert!(grid.contains(Position::new(4, 4), &9));
        assert_eq!(grid.occupied_cells().len(), 1);
    }

    #[test]
    fn replace_contents_rejects_off_grid_cells() {
        let grid: Grid<u32> = Grid::new(10);
        grid.add(Position::new(0, 0), 1).unwrap();
        let mut set = BTreeSet::new();
        set.insert(9);
        assert!(grid.replace_contents(vec![(Position::new(10, 4), set)]).is_err());
        assert!(grid.contains(Position::new(0, 0), &1));
    }

    #[test]
    fn clear_empties_grid() {
        let grid: Grid<u32> = Grid::new(10);
        fill(&grid);
        grid.clear();
        assert_eq!(grid.occupant_count(), 0);
    }
}
