//! Grid coordinates and cardinal directions.
//!
//! A [`Position`] is an immutable `(row, col)` pair compared and hashed by
//! value. Distances are Manhattan distances, which is the metric every range
//! check and chase threshold in the simulation is expressed in.

use std::fmt;

use glam::IVec2;
use serde::{Deserialize, Serialize};

/// A cell coordinate on the grid.
///
/// Rows grow downward and columns grow rightward. Positions are plain values:
/// moving an entity never mutates a `Position`, it replaces it.
///
/// # Ordering
///
/// Positions order row-major (row first, then column), which gives grid
/// iteration and hashing a stable order.
///
/// # Example
///
/// ```
/// use warren::Position;
///
/// let a = Position::new(5, 5);
/// let b = Position::new(5, 8);
/// assert_eq!(a.distance(b), 3);
/// assert_eq!(a.step_toward(b), Position::new(5, 6));
/// ```
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Position {
    /// Row index.
    pub row: i32,
    /// Column index.
    pub col: i32,
}

impl Position {
    /// Creates a position from a row and column.
    #[must_use]
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Manhattan distance `|Δrow| + |Δcol|` to another position.
    #[must_use]
    pub const fn distance(self, other: Self) -> u32 {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }

    /// Returns the neighbouring position one step in `direction`.
    ///
    /// The result may lie outside any particular grid; bounds are checked by
    /// the grid, not here.
    #[must_use]
    pub fn offset(self, direction: Direction) -> Self {
        Self::from_ivec2(self.as_ivec2() + direction.delta())
    }

    /// Returns the position one greedy step closer to `target`.
    ///
    /// The row gap is closed first: while the rows differ the step moves
    /// vertically, and only once the rows match does it move horizontally.
    /// Returns `self` when already at `target`.
    #[must_use]
    pub fn step_toward(self, target: Self) -> Self {
        let gap = target.as_ivec2() - self.as_ivec2();
        if gap.y != 0 {
            Self::new(self.row + gap.y.signum(), self.col)
        } else {
            Self::new(self.row, self.col + gap.x.signum())
        }
    }

    /// Converts to a vector with `x = col` and `y = row`.
    #[must_use]
    pub const fn as_ivec2(self) -> IVec2 {
        IVec2::new(self.col, self.row)
    }

    /// Converts from a vector with `x = col` and `y = row`.
    #[must_use]
    pub const fn from_ivec2(v: IVec2) -> Self {
        Self::new(v.y, v.x)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

impl From<(i32, i32)> for Position {
    fn from((row, col): (i32, i32)) -> Self {
        Self::new(row, col)
    }
}

/// One of the four cardinal directions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Toward row 0.
    North,
    /// Toward the last row.
    South,
    /// Toward the last column.
    East,
    /// Toward column 0.
    West,
}

impl Direction {
    /// All four directions, in a fixed order used for random selection.
    pub const ALL: [Self; 4] = [Self::North, Self::South, Self::East, Self::West];

    /// Unit step as a vector with `x = col` and `y = row`.
    #[must_use]
    pub const fn delta(self) -> IVec2 {
        match self {
            Self::North => IVec2::new(0, -1),
            Self::South => IVec2::new(0, 1),
            Self::East => IVec2::new(1, 0),
            Self::West => IVec2::new(-1, 0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::North => write!(f, "North"),
            Self::South => write!(f, "South"),
            Self::East => write!(f, "East"),
            Self::West => write!(f, "West"),
        }
    }
}
