//! Cross-module tests for the world, its agents and the scheduler.
//!
//! - **Integration tests**: exchanges, items, chasing and snapshots through
//!   the public world API
//! - **Concurrency tests**: racing movers, a live scheduler and restore under
//!   load
//! - **Determinism tests**: seeded construction, critical-hit frequency and
//!   modifier transparency
//!
//! # Test Structure
//!
//! - `helpers.rs`: world builders and invariant checks
//! - `integration.rs`: end-to-end scenarios
//! - `concurrency.rs`: multi-threaded tests
//! - `determinism.rs`: seeded and statistical properties

mod determinism;
mod helpers;

// Re-export for convenience
pub use helpers::*;
