//! Resolver module: where combat proposals become state changes.
//!
//! # Available Resolvers
//!
//! - [`CombatResolver`]: resolves one attacker/defender exchange in place
//! - [`EventLog`]: records [`GameEvent`]s for observers (no state mutation)
//!
//! # Invariants
//!
//! - An exchange is applied completely or not at all; callers hold both
//!   combatant locks for its duration.
//! - Given the same records and the same RNG stream, an exchange always
//!   produces the same report.

mod combat;
mod event;

pub use combat::{CombatResolver, ExchangeOutcome, ExchangeReport, HitReport, Strike};
pub use event::{EventLog, GameEvent, DEFAULT_EVENT_CAPACITY};
