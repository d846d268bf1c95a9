//! Combat resolver for one attacker/defender exchange.
//!
//! An exchange is a strict, synchronous state machine:
//!
//! ```text
//! RangeCheck ──out of range──▶ OutOfRange (no state change)
//!     │
//!     ▼
//! AttackerActs ──▶ DefenderActs (only if the defender survived)
//!                        │
//!                        ▼
//!                 OutcomeClassified
//! ```
//!
//! Both records are borrowed mutably for the whole exchange. The world holds
//! both combatant mutexes while calling [`CombatResolver::resolve`], so no
//! other thread can observe a half-applied exchange.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entity::{Capabilities, Combatant, EntityId};
use crate::modifier::{self, Effect};

/// How an exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExchangeOutcome {
    /// The attacker could not reach the defender. Nothing changed.
    OutOfRange,
    /// The attacker died (checked first).
    AttackerDefeated,
    /// The defender died.
    DefenderDefeated,
    /// Both combatants are still alive.
    BothStanding,
}

/// Details of one landed attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitReport {
    /// Health removed by the base attack, after resistance.
    pub damage: i32,
    /// Whether the critical-hit roll doubled the base damage.
    pub critical: bool,
    /// Effects applied by the striker's modifier layers.
    pub effects: Vec<Effect>,
}

/// One side's action in an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strike {
    /// The target's evasion roll succeeded.
    Evaded,
    /// The attack landed.
    Hit(HitReport),
}

impl Strike {
    /// Base damage dealt, or zero if evaded.
    #[must_use]
    pub fn damage(&self) -> i32 {
        match self {
            Self::Evaded => 0,
            Self::Hit(hit) => hit.damage,
        }
    }

    /// Returns `true` if the target evaded.
    #[must_use]
    pub fn is_evaded(&self) -> bool {
        matches!(self, Self::Evaded)
    }
}

/// Full record of an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeReport {
    /// Who initiated.
    pub attacker: EntityId,
    /// Who was attacked.
    pub defender: EntityId,
    /// How it ended.
    pub outcome: ExchangeOutcome,
    /// The attacker's action, absent when out of range.
    pub attacker_strike: Option<Strike>,
    /// The defender's counter, absent when the defender fell or was out of range.
    pub defender_strike: Option<Strike>,
    /// Effects from death layers of whoever died.
    pub death_effects: Vec<Effect>,
    /// Survivors whose low-health teleport fired. The caller relocates them.
    pub relocations: Vec<EntityId>,
}

impl ExchangeReport {
    fn out_of_range(attacker: EntityId, defender: EntityId) -> Self {
        Self {
            attacker,
            defender,
            outcome: ExchangeOutcome::OutOfRange,
            attacker_strike: None,
            defender_strike: None,
            death_effects: Vec::new(),
            relocations: Vec::new(),
        }
    }
}

/// Resolver for combat exchanges.
///
/// # Example
///
/// ```
/// use delve_core::entity::{Combatant, CombatClass, EntityId, Evasion};
/// use delve_core::resolver::{CombatResolver, ExchangeOutcome};
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
/// use warren::Position;
///
/// let mut hero = Combatant::new(EntityId::new(1), "Hero", CombatClass::Warrior, Position::new(0, 0));
/// let mut goblin = Combatant::new(EntityId::new(2), "Goblin", CombatClass::Goblin, Position::new(0, 3));
///
/// let mut rng = ChaCha8Rng::seed_from_u64(1);
/// let report = CombatResolver::new().resolve(&mut hero, &mut goblin, &mut rng);
/// assert_eq!(report.outcome, ExchangeOutcome::OutOfRange);
/// assert_eq!(goblin.health(), goblin.max_health());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CombatResolver;

impl CombatResolver {
    /// Creates a new combat resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Resolves one exchange.
    ///
    /// The counter-attack is not range-checked: a defender that survives
    /// always answers.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        attacker: &mut Combatant,
        defender: &mut Combatant,
        rng: &mut R,
    ) -> ExchangeReport {
        let (attacker_id, defender_id) = (attacker.id(), defender.id());
        if !attacker.is_in_range(defender.position()) {
            debug!(attacker = %attacker_id, defender = %defender_id, "target out of range");
            return ExchangeReport::out_of_range(attacker_id, defender_id);
        }

        let mut relocations = Vec::new();
        let attacker_strike = Self::strike(attacker, defender, rng, &mut relocations);
        let defender_strike = if defender.is_dead() {
            None
        } else {
            Some(Self::strike(defender, attacker, rng, &mut relocations))
        };

        let mut death_effects = Vec::new();
        if defender.is_dead() {
            death_effects.extend(modifier::on_death(defender, attacker));
        }
        if attacker.is_dead() {
            death_effects.extend(modifier::on_death(attacker, defender));
        }
        relocations.retain(|id| {
            (*id == attacker_id && !attacker.is_dead()) || (*id == defender_id && !defender.is_dead())
        });

        let outcome = if attacker.is_dead() {
            ExchangeOutcome::AttackerDefeated
        } else if defender.is_dead() {
            ExchangeOutcome::DefenderDefeated
        } else {
            ExchangeOutcome::BothStanding
        };
        debug!(
            attacker = %attacker_id,
            defender = %defender_id,
            ?outcome,
            attacker_health = attacker.health(),
            defender_health = defender.health(),
            "exchange resolved"
        );

        ExchangeReport {
            attacker: attacker_id,
            defender: defender_id,
            outcome,
            attacker_strike: Some(attacker_strike),
            defender_strike,
            death_effects,
            relocations,
        }
    }

    /// One side attacks the other: evasion roll, base attack, then modifier
    /// hooks on both records.
    fn strike<R: Rng + ?Sized>(
        striker: &mut Combatant,
        target: &mut Combatant,
        rng: &mut R,
        relocations: &mut Vec<EntityId>,
    ) -> Strike {
        if target.try_evade(rng) {
            return Strike::Evaded;
        }
        let roll = striker.attack_roll(target, rng);
        let source = if striker.capabilities().contains(Capabilities::MAGIC) {
            striker.element()
        } else {
            None
        };
        let damage = target.apply_damage(roll.damage, source);
        let effects = modifier::after_attack(striker, target);
        if modifier::after_damage(target).contains(&Effect::Teleport) {
            relocations.push(target.id());
        }
        Strike::Hit(HitReport {
            damage,
            critical: roll.critical,
            effects,
        })
    }
}
