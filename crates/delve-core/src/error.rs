//! Error taxonomy for the simulation core.
//!
//! Data-integrity failures surface synchronously to the immediate caller as a
//! [`CoreError`]. Transient contention (a cell lock wait that expires) is not
//! an error: it shows up as [`MoveOutcome::Contended`](crate::world::MoveOutcome)
//! and the move is simply skipped.

use thiserror::Error;
use warren::{GridError, Position};

use crate::entity::EntityId;

/// Errors returned by world construction and player actions.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A position-mutating call named a cell outside the grid.
    #[error("position {position} is outside the grid")]
    InvalidPosition {
        /// The rejected position.
        position: Position,
    },

    /// A placement named a cell that is occupied or whose lock could not be
    /// taken in time.
    #[error("cell {position} is occupied")]
    CellOccupied {
        /// The rejected position.
        position: Position,
    },

    /// The bounded random empty-cell search gave up.
    #[error("no space available after {attempts} placement attempts")]
    NoSpaceAvailable {
        /// Number of cells sampled.
        attempts: u64,
    },

    /// A factory received a class tag it does not recognise.
    #[error("unknown combatant type `{tag}`")]
    UnknownCombatantType {
        /// The unrecognised tag.
        tag: String,
    },

    /// An operation referred to an entity that is not in the world.
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    /// The world configuration violates a constraint.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Restore was requested with an empty snapshot stack.
    #[error("nothing to restore")]
    NothingToRestore,

    /// A player action was requested after the player died.
    #[error("the player has been defeated")]
    PlayerDefeated,

    /// The agent scheduler could not start its threads.
    #[error("failed to start agent scheduler: {0}")]
    SchedulerStart(String),
}

impl From<GridError> for CoreError {
    fn from(err: GridError) -> Self {
        match err {
            GridError::InvalidPosition { position, .. } => Self::InvalidPosition { position },
            GridError::NoSpaceAvailable { attempts } => Self::NoSpaceAvailable { attempts },
        }
    }
}

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
