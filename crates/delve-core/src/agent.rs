//! Per-tick decision logic for autonomous enemies.
//!
//! Deciding is pure: an agent reads an [`AgentView`] copied out of the world
//! and returns an [`Intent`]. Carrying the intent out (taking the cell lock,
//! moving, fighting) is the world's job, so the policy here can be tested
//! without threads or locks.
//!
//! # Policy
//!
//! 1. A dead enemy does nothing.
//! 2. With attacks enabled, a living player within the enemy's own reach is
//!    attacked.
//! 3. A living player within the chase distance is approached one greedy step,
//!    closing the row gap first and then the column gap.
//! 4. Otherwise the enemy wanders one random cardinal step with a fixed
//!    probability, or idles.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use warren::{Direction, Position};

use crate::config::SchedulerConfig;
use crate::entity::EntityId;
use crate::resolver::ExchangeReport;
use crate::world::MoveOutcome;

/// Derives an agent's private random stream from the world seed and its ID.
///
/// The same seed and ID always give the same stream, whatever order agents
/// are scheduled in.
#[must_use]
pub fn agent_rng(seed: u64, enemy: EntityId) -> ChaCha8Rng {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    enemy.hash(&mut hasher);
    ChaCha8Rng::seed_from_u64(hasher.finish())
}

/// What one agent tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing happened: the enemy idled, is dead or has left the roster.
    Idle,
    /// The agent tried to step.
    Moved(MoveOutcome),
    /// The agent attacked. `None` if either side was already dead.
    Attacked(Option<ExchangeReport>),
}

/// Read-only copy of what an agent needs to decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentView {
    /// The enemy being driven.
    pub enemy: EntityId,
    /// Its current cell.
    pub position: Position,
    /// Its attack reach.
    pub attack_range: u32,
    /// Whether it is dead.
    pub dead: bool,
    /// The tracked player's cell.
    pub player_position: Position,
    /// Whether the player is dead.
    pub player_dead: bool,
}

/// What an agent wants to do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Nothing.
    Idle,
    /// Resolve an exchange against the player.
    Attack,
    /// Step into this cell. It may lie off the grid; the world then skips it.
    Move(Position),
}

/// Chooses this tick's intent.
///
/// # Example
///
/// ```
/// use delve_core::agent::{decide, AgentView, Intent};
/// use delve_core::config::SchedulerConfig;
/// use delve_core::entity::EntityId;
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
/// use warren::Position;
///
/// let view = AgentView {
///     enemy: EntityId::new(2),
///     position: Position::new(5, 5),
///     attack_range: 1,
///     dead: false,
///     player_position: Position::new(5, 8),
///     player_dead: false,
/// };
/// let mut rng = ChaCha8Rng::seed_from_u64(0);
/// let intent = decide(&view, &SchedulerConfig::default(), &mut rng);
/// assert_eq!(intent, Intent::Move(Position::new(5, 6)));
/// ```
pub fn decide<R: Rng + ?Sized>(view: &AgentView, config: &SchedulerConfig, rng: &mut R) -> Intent {
    if view.dead {
        return Intent::Idle;
    }
    if !view.player_dead {
        let distance = view.position.distance(view.player_position);
        if config.agents_attack && distance <= view.attack_range {
            return Intent::Attack;
        }
        if distance <= config.chase_distance {
            let next = view.position.step_toward(view.player_position);
            return if next == view.position {
                Intent::Idle
            } else {
                Intent::Move(next)
            };
        }
    }
    if rng.gen::<f64>() < config.wander_chance {
        let direction = Direction::ALL[rng.gen_range(0..Direction::ALL.len())];
        return Intent::Move(view.position.offset(direction));
    }
    Intent::Idle
}
