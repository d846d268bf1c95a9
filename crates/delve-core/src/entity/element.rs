//! Elemental affinities and their cyclic dominance order.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Damage multiplier when the attacker's element dominates the defender's.
pub const DOMINANT_MULTIPLIER: f64 = 1.2;

/// Damage multiplier when the defender's element dominates the attacker's.
pub const SUBMISSIVE_MULTIPLIER: f64 = 0.8;

/// One of the four magic affinities.
///
/// Dominance is a single cycle, Fire ≻ Ice ≻ Lightning ≻ Acid ≻ Fire: each
/// element beats exactly one other and loses to exactly one other.
///
/// # Example
///
/// ```
/// use delve_core::entity::Element;
///
/// assert!(Element::Fire.dominates(Element::Ice));
/// assert!(Element::Acid.dominates(Element::Fire));
/// assert!(!Element::Ice.dominates(Element::Fire));
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    /// Beats Ice.
    Fire,
    /// Beats Lightning.
    Ice,
    /// Beats Acid.
    Lightning,
    /// Beats Fire.
    Acid,
}

impl Element {
    /// All elements in cycle order.
    pub const ALL: [Self; 4] = [Self::Fire, Self::Ice, Self::Lightning, Self::Acid];

    /// The element this one dominates.
    #[must_use]
    pub const fn prey(self) -> Self {
        match self {
            Self::Fire => Self::Ice,
            Self::Ice => Self::Lightning,
            Self::Lightning => Self::Acid,
            Self::Acid => Self::Fire,
        }
    }

    /// Returns `true` if this element is strictly stronger than `other`.
    #[must_use]
    pub fn dominates(self, other: Self) -> bool {
        self.prey() == other
    }

    /// Damage multiplier for an attack of this element against `defender`.
    ///
    /// `1.0` when the defender has no affinity or neither element dominates.
    #[must_use]
    pub fn multiplier_against(self, defender: Option<Self>) -> f64 {
        match defender {
            Some(d) if self.dominates(d) => DOMINANT_MULTIPLIER,
            Some(d) if d.dominates(self) => SUBMISSIVE_MULTIPLIER,
            _ => 1.0,
        }
    }

    /// Picks an element uniformly at random.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fire => write!(f, "Fire"),
            Self::Ice => write!(f, "Ice"),
            Self::Lightning => write!(f, "Lightning"),
            Self::Acid => write!(f, "Acid"),
        }
    }
}
