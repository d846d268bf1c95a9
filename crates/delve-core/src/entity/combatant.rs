//! The canonical combatant record and its capability contract.
//!
//! A [`Combatant`] owns every piece of mutable state for one fighting entity:
//! health, power, position, affinity, evasion, its modifier layers and its
//! role-specific data. The world keeps each record behind its own mutex, and
//! every mutation of a combatant goes through that single record.

use rand::Rng;
use serde::{Deserialize, Serialize};
use warren::Position;

use super::class::{Capabilities, CombatClass};
use super::element::Element;
use super::EntityId;
use crate::item::Inventory;
use crate::modifier::{ModifierKind, ModifierStack};

/// Probability of a critical hit for melee and ranged attacks.
pub const CRIT_CHANCE: f64 = 0.10;

/// Base multiplier applied to magic attacks before elemental adjustment.
pub const MAGIC_MULTIPLIER: f64 = 1.5;

/// Upper bound on agility-derived evasion.
pub const MAX_AGILITY_EVASION: f64 = 0.8;

/// Evasion gained per point of agility.
pub const EVASION_PER_AGILITY: f64 = 0.04;

/// Evasion rule for one combatant.
///
/// A roll evades when a uniform draw from `[0, 1)` falls below the chance, so
/// a chance of `0.0` never evades and `1.0` always does.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Evasion {
    /// A fixed probability.
    Fixed(f64),
    /// `agility × 0.04`, capped at `0.8`.
    Agility(u32),
}

impl Evasion {
    /// The probability of evading one attack.
    #[must_use]
    pub fn chance(self) -> f64 {
        match self {
            Self::Fixed(p) => p.clamp(0.0, 1.0),
            Self::Agility(agility) => {
                (f64::from(agility) * EVASION_PER_AGILITY).min(MAX_AGILITY_EVASION)
            }
        }
    }
}

/// Player-only state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Carried items.
    pub inventory: Inventory,
    /// Treasure points collected so far.
    pub treasure: u32,
}

/// Enemy-only state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyState {
    /// Treasure dropped on defeat. Drawn at creation, revealed on defeat.
    pub loot: u32,
}

/// Which side a combatant fights on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Role {
    /// Player-controlled.
    Player(PlayerState),
    /// Autonomous enemy.
    Enemy(EnemyState),
}

/// Outcome of [`Combatant::receive_damage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageOutcome {
    /// The evasion roll succeeded; no damage was applied.
    Evaded,
    /// Damage was applied.
    Hit {
        /// Health actually removed, after resistance.
        dealt: i32,
    },
}

/// Damage computed by one attack before it is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRoll {
    /// Damage to deal.
    pub damage: i32,
    /// Whether the critical-hit roll doubled the damage.
    pub critical: bool,
}

/// Copy of the fields modifier layers read, taken before a layer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vitals {
    /// Current health.
    pub health: i32,
    /// Maximum health.
    pub max_health: i32,
    /// Current cell.
    pub position: Position,
}

impl Vitals {
    /// Returns `true` if health is at or below zero.
    #[must_use]
    pub fn is_dead(self) -> bool {
        self.health <= 0
    }
}

/// The single canonical record for a fighting entity.
///
/// # Example
///
/// ```
/// use delve_core::entity::{Combatant, CombatClass, EntityId};
/// use warren::Position;
///
/// let mut goblin = Combatant::new(EntityId::new(1), "Goblin", CombatClass::Goblin, Position::new(2, 2));
/// goblin.apply_damage(10, None);
/// assert_eq!(goblin.health(), goblin.max_health() - 10);
/// assert!(goblin.is_in_range(Position::new(2, 3)));
/// assert!(!goblin.is_in_range(Position::new(2, 4)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combatant {
    id: EntityId,
    name: String,
    class: CombatClass,
    health: i32,
    max_health: i32,
    power: i32,
    position: Position,
    element: Option<Element>,
    evasion: Evasion,
    crit_chance: f64,
    resistance: f64,
    modifiers: ModifierStack,
    role: Role,
}

impl Combatant {
    /// Creates a combatant with its class defaults.
    ///
    /// Power starts at the bottom of the class range and agility-based
    /// evasion at its lowest agility; use [`CombatantFactory`](super::CombatantFactory)
    /// for randomized stats. Player classes get an empty inventory and enemy
    /// classes a zero loot value.
    #[must_use]
    pub fn new(id: EntityId, name: &str, class: CombatClass, position: Position) -> Self {
        let profile = class.profile();
        let evasion = match profile.evasion {
            super::EvasionProfile::Fixed(p) => Evasion::Fixed(p),
            super::EvasionProfile::Agility { min, .. } => Evasion::Agility(min),
        };
        let role = if class.is_player_class() {
            Role::Player(PlayerState::default())
        } else {
            Role::Enemy(EnemyState::default())
        };
        Self {
            id,
            name: name.to_string(),
            class,
            health: profile.max_health,
            max_health: profile.max_health,
            power: profile.power_min,
            position,
            element: None,
            evasion,
            crit_chance: CRIT_CHANCE,
            resistance: profile.resistance,
            modifiers: ModifierStack::new(),
            role,
        }
    }

    // -------------------------------------------------------------------------
    // Identity and stats
    // -------------------------------------------------------------------------

    /// Returns the entity ID.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the class tag.
    #[must_use]
    pub fn class(&self) -> CombatClass {
        self.class
    }

    /// Returns the combat styles granted by the class.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.class.profile().capabilities
    }

    /// Returns current health.
    #[must_use]
    pub fn health(&self) -> i32 {
        self.health
    }

    /// Returns maximum health.
    #[must_use]
    pub fn max_health(&self) -> i32 {
        self.max_health
    }

    /// Returns base attack power.
    #[must_use]
    pub fn power(&self) -> i32 {
        self.power
    }

    /// Returns the current cell.
    #[must_use]
    pub fn position(&self) -> Position {
        self.position
    }

    /// Returns the elemental affinity, if any.
    #[must_use]
    pub fn element(&self) -> Option<Element> {
        self.element
    }

    /// Returns the evasion rule.
    #[must_use]
    pub fn evasion(&self) -> Evasion {
        self.evasion
    }

    /// Returns the critical-hit probability.
    #[must_use]
    pub fn crit_chance(&self) -> f64 {
        self.crit_chance
    }

    /// Returns the elemental resistance fraction.
    #[must_use]
    pub fn resistance(&self) -> f64 {
        self.resistance
    }

    /// Returns the attack reach in Manhattan distance.
    #[must_use]
    pub fn range(&self) -> u32 {
        self.class.profile().range
    }

    /// Returns the role-specific state.
    #[must_use]
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Returns `true` for the player-controlled combatant.
    #[must_use]
    pub fn is_player(&self) -> bool {
        matches!(self.role, Role::Player(_))
    }

    /// Returns the player state, if this is the player.
    #[must_use]
    pub fn player_state(&self) -> Option<&PlayerState> {
        match &self.role {
            Role::Player(state) => Some(state),
            Role::Enemy(_) => None,
        }
    }

    /// Returns mutable player state, if this is the player.
    #[must_use]
    pub fn player_state_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.role {
            Role::Player(state) => Some(state),
            Role::Enemy(_) => None,
        }
    }

    /// Returns the loot value of an enemy, or `None` for the player.
    #[must_use]
    pub fn loot(&self) -> Option<u32> {
        match self.role {
            Role::Enemy(state) => Some(state.loot),
            Role::Player(_) => None,
        }
    }

    /// Returns the modifier layers.
    #[must_use]
    pub fn modifiers(&self) -> &ModifierStack {
        &self.modifiers
    }

    /// Returns mutable modifier layers.
    #[must_use]
    pub fn modifiers_mut(&mut self) -> &mut ModifierStack {
        &mut self.modifiers
    }

    /// Adds an outermost modifier layer.
    pub fn wrap(&mut self, kind: ModifierKind) {
        self.modifiers.push(kind);
    }

    /// Copies the fields modifier layers read.
    #[must_use]
    pub fn vitals(&self) -> Vitals {
        Vitals {
            health: self.health,
            max_health: self.max_health,
            position: self.position,
        }
    }

    // -------------------------------------------------------------------------
    // Setters
    // -------------------------------------------------------------------------

    /// Sets health. Non-positive values are rejected and return `false`.
    pub fn set_health(&mut self, health: i32) -> bool {
        if health <= 0 {
            return false;
        }
        self.health = health;
        true
    }

    /// Sets maximum health (at least 1), lowering current health to fit.
    pub fn set_max_health(&mut self, max_health: i32) {
        self.max_health = max_health.max(1);
        self.health = self.health.min(self.max_health);
    }

    /// Sets base power (at least 1).
    pub fn set_power(&mut self, power: i32) {
        self.power = power.max(1);
    }

    /// Sets the elemental affinity.
    pub fn set_element(&mut self, element: Option<Element>) {
        self.element = element;
    }

    /// Sets the evasion rule.
    pub fn set_evasion(&mut self, evasion: Evasion) {
        self.evasion = evasion;
    }

    /// Sets the critical-hit probability.
    pub fn set_crit_chance(&mut self, chance: f64) {
        self.crit_chance = chance.clamp(0.0, 1.0);
    }

    /// Sets the elemental resistance fraction.
    pub fn set_resistance(&mut self, resistance: f64) {
        self.resistance = resistance.clamp(0.0, 1.0);
    }

    /// Sets the enemy loot value. Ignored for the player.
    pub fn set_loot(&mut self, loot: u32) {
        if let Role::Enemy(state) = &mut self.role {
            state.loot = loot;
        }
    }

    /// Records a new cell. Only the world calls this, while it holds both the
    /// destination cell lock and this record's mutex.
    pub(crate) fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    // -------------------------------------------------------------------------
    // Capability contract
    // -------------------------------------------------------------------------

    /// Returns `true` if health is at or below zero.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.health <= 0
    }

    /// Rolls this combatant's evasion chance.
    pub fn try_evade<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen::<f64>() < self.evasion.chance()
    }

    /// Returns `true` if `target` lies within this combatant's attack reach.
    #[must_use]
    pub fn is_in_range(&self, target: Position) -> bool {
        self.position.distance(target) <= self.range()
    }

    /// Rolls evasion, then applies damage if the roll failed.
    pub fn receive_damage<R: Rng + ?Sized>(
        &mut self,
        amount: i32,
        source: Option<Element>,
        rng: &mut R,
    ) -> DamageOutcome {
        if self.try_evade(rng) {
            return DamageOutcome::Evaded;
        }
        DamageOutcome::Hit {
            dealt: self.apply_damage(amount, source),
        }
    }

    /// Applies damage without an evasion roll and returns the health removed.
    ///
    /// Enemies scale elemental damage down by their resistance first.
    pub fn apply_damage(&mut self, amount: i32, source: Option<Element>) -> i32 {
        let amount = match (&self.role, source) {
            (Role::Enemy(_), Some(_)) if self.resistance > 0.0 => {
                scale(amount, 1.0 - self.resistance)
            }
            _ => amount,
        };
        self.take_raw_damage(amount)
    }

    /// Removes `amount` health with no evasion or resistance.
    ///
    /// Health never drops below zero. Returns the health actually removed.
    pub fn take_raw_damage(&mut self, amount: i32) -> i32 {
        let amount = amount.max(0);
        let before = self.health;
        self.health = (self.health - amount).max(0);
        before - self.health
    }

    /// Increases health by `amount` with no cap.
    ///
    /// Callers clamp to max health themselves; see [`Combatant::heal_capped`].
    pub fn heal(&mut self, amount: i32) {
        self.health += amount;
    }

    /// Heals by at most `amount`, never exceeding max health. Returns the
    /// health actually restored.
    pub fn heal_capped(&mut self, amount: i32) -> i32 {
        let room = (self.max_health - self.health).max(0);
        let restored = amount.clamp(0, room);
        self.heal(restored);
        restored
    }

    /// Computes the damage of one attack against `target`.
    ///
    /// Magic users deal `power × 1.5`, adjusted by elemental dominance and
    /// never critical. Everyone else deals base power, doubled on a critical
    /// roll.
    pub fn attack_roll<R: Rng + ?Sized>(&self, target: &Self, rng: &mut R) -> AttackRoll {
        if self.capabilities().contains(Capabilities::MAGIC) {
            let elemental = self
                .element
                .map_or(1.0, |element| element.multiplier_against(target.element));
            return AttackRoll {
                damage: scale(self.power, MAGIC_MULTIPLIER * elemental),
                critical: false,
            };
        }
        let critical = rng.gen::<f64>() < self.crit_chance;
        AttackRoll {
            damage: if critical { self.power * 2 } else { self.power },
            critical,
        }
    }
}

/// Scales an integer amount by `factor`, rounding down.
///
/// The epsilon keeps products like `15 × 1.2` from landing one below the
/// exact value.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn scale(amount: i32, factor: f64) -> i32 {
    (f64::from(amount) * factor + 1e-9).floor() as i32
}
