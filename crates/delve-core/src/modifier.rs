//! Runtime modifier layers over a single combatant record.
//!
//! A modifier never owns health or position. Each [`Modifier`] is a small
//! behaviour layer stored inside the [`Combatant`] it alters, and its hook
//! functions receive that one record mutably. Operations no layer intercepts
//! (range checks, evasion rolls, the base attack) are untouched by the stack.
//!
//! # Hooks
//!
//! | Hook            | Fired by                          | Layers            |
//! |-----------------|-----------------------------------|-------------------|
//! | `AFTER_ATTACK`  | a landed attack                   | bonus damage, life drain |
//! | `AFTER_DAMAGE`  | damage taken                      | low-health teleport |
//! | `TICK`          | periodic world update             | regeneration      |
//! | `DEATH`         | health reaching zero              | death explosion   |
//!
//! # Ordering
//!
//! Layers run innermost first, one at a time, each applying its effect before
//! the next layer runs. An outer layer therefore observes the state left by
//! the inner ones: a life drain stacked outside a bonus-damage layer drains
//! from the already reduced target health.
//!
//! # Example
//!
//! ```
//! use delve_core::entity::{Combatant, CombatClass, EntityId};
//! use delve_core::modifier::{self, Effect, ModifierKind};
//! use warren::Position;
//!
//! let mut goblin = Combatant::new(EntityId::new(1), "Goblin", CombatClass::Goblin, Position::new(0, 0));
//! let mut hero = Combatant::new(EntityId::new(2), "Hero", CombatClass::Warrior, Position::new(0, 1));
//! goblin.wrap(ModifierKind::BonusDamage { amount: 4 });
//!
//! let effects = modifier::after_attack(&mut goblin, &mut hero);
//! assert_eq!(effects, vec![Effect::BonusDamage { target: EntityId::new(2), dealt: 4 }]);
//! assert_eq!(hero.health(), 96);
//! ```

use std::fmt;
use std::time::Duration;

use bitflags::bitflags;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::entity::{Combatant, EntityId};

/// Health below this percentage of max health triggers a teleport.
pub const TELEPORT_THRESHOLD_PERCENT: i32 = 30;

/// Percentage of max health dealt by a death explosion.
pub const EXPLOSION_PERCENT: i32 = 2;

/// Percentage of the target's current health drained per landed attack.
pub const DRAIN_PERCENT: i32 = 1;

/// Reach of a death explosion when none is configured.
pub const DEFAULT_EXPLOSION_RADIUS: u32 = 2;

/// Health restored per regeneration pulse for generated enemies.
pub const DEFAULT_REGEN_AMOUNT: i32 = 3;

/// Milliseconds between regeneration pulses for generated enemies.
pub const DEFAULT_REGEN_INTERVAL_MS: u64 = 2_000;

bitflags! {
    /// Hook points a modifier layer subscribes to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Hooks: u8 {
        /// After the owner lands an attack.
        const AFTER_ATTACK = 0b0001;
        /// After the owner takes damage.
        const AFTER_DAMAGE = 0b0010;
        /// On each periodic world update.
        const TICK = 0b0100;
        /// When the owner's health reaches zero.
        const DEATH = 0b1000;
    }
}

/// The behaviour a modifier layer adds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModifierKind {
    /// Extra raw damage to the target after every landed attack.
    BonusDamage {
        /// Damage added.
        amount: i32,
    },
    /// Heals the owner by 1% of a player target's health after a landed attack.
    LifeDrain,
    /// Restores health on a fixed interval, capped at max health.
    Regeneration {
        /// Health restored per pulse.
        amount: i32,
        /// Minimum time between pulses.
        interval_ms: u64,
    },
    /// Relocates the owner once when its health falls below 30%.
    LowHealthTeleport,
    /// Splashes a nearby player for 2% of max health on death.
    DeathExplosion {
        /// Manhattan reach of the splash.
        radius: u32,
    },
}

impl ModifierKind {
    /// Kinds a generated enemy may carry.
    pub const ENEMY_POOL: [Self; 4] = [
        Self::LifeDrain,
        Self::Regeneration {
            amount: DEFAULT_REGEN_AMOUNT,
            interval_ms: DEFAULT_REGEN_INTERVAL_MS,
        },
        Self::LowHealthTeleport,
        Self::DeathExplosion {
            radius: DEFAULT_EXPLOSION_RADIUS,
        },
    ];

    /// Hooks this kind subscribes to.
    #[must_use]
    pub const fn hooks(self) -> Hooks {
        match self {
            Self::BonusDamage { .. } | Self::LifeDrain => Hooks::AFTER_ATTACK,
            Self::Regeneration { .. } => Hooks::TICK,
            Self::LowHealthTeleport => Hooks::AFTER_DAMAGE,
            Self::DeathExplosion { .. } => Hooks::DEATH,
        }
    }

    /// Picks a kind from [`ModifierKind::ENEMY_POOL`].
    pub fn random_enemy<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ENEMY_POOL[rng.gen_range(0..Self::ENEMY_POOL.len())]
    }
}

impl fmt::Display for ModifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BonusDamage { amount } => write!(f, "BonusDamage(+{amount})"),
            Self::LifeDrain => write!(f, "LifeDrain"),
            Self::Regeneration {
                amount,
                interval_ms,
            } => write!(f, "Regeneration({amount}/{interval_ms}ms)"),
            Self::LowHealthTeleport => write!(f, "LowHealthTeleport"),
            Self::DeathExplosion { radius } => write!(f, "DeathExplosion(r{radius})"),
        }
    }
}

/// One modifier layer plus the small amount of state it tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifier {
    kind: ModifierKind,
    /// Elapsed world time of the last regeneration pulse.
    last_pulse: Duration,
    /// Set once a one-shot layer has fired.
    spent: bool,
}

impl Modifier {
    /// Creates a fresh layer.
    #[must_use]
    pub fn new(kind: ModifierKind) -> Self {
        Self {
            kind,
            last_pulse: Duration::ZERO,
            spent: false,
        }
    }

    /// Returns the layer kind.
    #[must_use]
    pub fn kind(&self) -> ModifierKind {
        self.kind
    }

    /// Returns `true` once a one-shot layer has fired.
    #[must_use]
    pub fn is_spent(&self) -> bool {
        self.spent
    }
}

/// Ordered modifier layers, innermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierStack {
    layers: Vec<Modifier>,
}

impl ModifierStack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an outermost layer.
    pub fn push(&mut self, kind: ModifierKind) {
        self.layers.push(Modifier::new(kind));
    }

    /// Number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns `true` if there are no layers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Iterates layers innermost first.
    pub fn iter(&self) -> impl Iterator<Item = &Modifier> {
        self.layers.iter()
    }

    /// Layer kinds innermost first.
    #[must_use]
    pub fn kinds(&self) -> Vec<ModifierKind> {
        self.layers.iter().map(Modifier::kind).collect()
    }

    /// Union of every layer's hooks.
    #[must_use]
    pub fn hooks(&self) -> Hooks {
        self.layers
            .iter()
            .fold(Hooks::empty(), |acc, m| acc | m.kind.hooks())
    }

    fn indices_for(&self, hook: Hooks) -> Vec<usize> {
        self.layers
            .iter()
            .enumerate()
            .filter(|(_, m)| m.kind.hooks().contains(hook))
            .map(|(i, _)| i)
            .collect()
    }
}

/// A side effect applied by a modifier layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Bonus damage dealt to the target.
    BonusDamage {
        /// Who took the damage.
        target: EntityId,
        /// Health removed.
        dealt: i32,
    },
    /// Owner healed by draining the target.
    Drain {
        /// Health restored to the owner.
        healed: i32,
    },
    /// Owner healed by a regeneration pulse.
    Regenerate {
        /// Health restored.
        healed: i32,
    },
    /// Owner should be moved to a random empty cell. The world performs the
    /// move since it owns the grid.
    Teleport,
    /// Splash damage dealt on death.
    Explode {
        /// Who took the damage.
        target: EntityId,
        /// Health removed.
        dealt: i32,
    },
}

// =============================================================================
// Hook entry points
// =============================================================================

/// Runs `AFTER_ATTACK` layers once `owner` has landed an attack on `target`.
pub fn after_attack(owner: &mut Combatant, target: &mut Combatant) -> Vec<Effect> {
    let mut effects = Vec::new();
    for index in owner.modifiers().indices_for(Hooks::AFTER_ATTACK) {
        match owner.modifiers().layers[index].kind {
            ModifierKind::BonusDamage { amount } => {
                let dealt = target.take_raw_damage(amount);
                effects.push(Effect::BonusDamage {
                    target: target.id(),
                    dealt,
                });
            }
            ModifierKind::LifeDrain if target.is_player() => {
                let amount = (target.health() * DRAIN_PERCENT / 100).max(1);
                let healed = owner.heal_capped(amount);
                effects.push(Effect::Drain { healed });
            }
            _ => {}
        }
    }
    effects
}

/// Runs `AFTER_DAMAGE` layers once `owner` has taken damage.
///
/// A low-health teleport fires at most once per layer, and never for a dead
/// owner.
pub fn after_damage(owner: &mut Combatant) -> Vec<Effect> {
    let mut effects = Vec::new();
    let vitals = owner.vitals();
    for index in owner.modifiers().indices_for(Hooks::AFTER_DAMAGE) {
        let layer = &mut owner.modifiers_mut().layers[index];
        if layer.kind == ModifierKind::LowHealthTeleport
            && !layer.spent
            && !vitals.is_dead()
            && vitals.health * 100 < vitals.max_health * TELEPORT_THRESHOLD_PERCENT
        {
            layer.spent = true;
            effects.push(Effect::Teleport);
        }
    }
    effects
}

/// Runs `TICK` layers at elapsed world time `now`.
pub fn on_tick(owner: &mut Combatant, now: Duration) -> Vec<Effect> {
    let mut effects = Vec::new();
    if owner.is_dead() {
        return effects;
    }
    for index in owner.modifiers().indices_for(Hooks::TICK) {
        let layer = owner.modifiers().layers[index];
        if let ModifierKind::Regeneration {
            amount,
            interval_ms,
        } = layer.kind
        {
            if now.saturating_sub(layer.last_pulse) >= Duration::from_millis(interval_ms) {
                let healed = owner.heal_capped(amount);
                owner.modifiers_mut().layers[index].last_pulse = now;
                effects.push(Effect::Regenerate { healed });
            }
        }
    }
    effects
}

/// Runs `DEATH` layers for a dead `owner` against the other party of the
/// fatal exchange. Only a player within the explosion radius is splashed.
pub fn on_death(owner: &mut Combatant, other: &mut Combatant) -> Vec<Effect> {
    let mut effects = Vec::new();
    if !owner.is_dead() {
        return effects;
    }
    for index in owner.modifiers().indices_for(Hooks::DEATH) {
        let layer = &mut owner.modifiers_mut().layers[index];
        if let ModifierKind::DeathExplosion { radius } = layer.kind {
            if layer.spent {
                continue;
            }
            layer.spent = true;
            if other.is_player() && owner.position().distance(other.position()) <= radius {
                let amount = (owner.max_health() * EXPLOSION_PERCENT / 100).max(1);
                let dealt = other.take_raw_damage(amount);
                effects.push(Effect::Explode {
                    target: other.id(),
                    dealt,
                });
            }
        }
    }
    effects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::CombatClass;
    use warren::Position;

    fn enemy() -> Combatant {
        Combatant::new(EntityId::new(1), "Goblin", CombatClass::Goblin, Position::new(4, 4))
    }

    fn player() -> Combatant {
        Combatant::new(EntityId::new(2), "Hero", CombatClass::Warrior, Position::new(4, 5))
    }

    mod after_attack_tests {
        use super::*;

        #[test]
        fn bonus_damage_hits_target() {
            let mut goblin = enemy();
            goblin.wrap(ModifierKind::BonusDamage { amount: 7 });
            let mut hero = player();
            after_attack(&mut goblin, &mut hero);
            assert_eq!(hero.health(), 93);
        }

        #[test]
        fn life_drain_only_from_players() {
            let mut goblin = enemy();
            goblin.wrap(ModifierKind::LifeDrain);
            goblin.take_raw_damage(10);
            let mut other = enemy();
            assert!(after_attack(&mut goblin, &mut other).is_empty());

            let mut hero = player();
            let effects = after_attack(&mut goblin, &mut hero);
            assert_eq!(effects, vec![Effect::Drain { healed: 1 }]);
            assert_eq!(goblin.health(), 21);
        }

        #[test]
        fn life_drain_is_capped_at_max_health() {
            let mut goblin = enemy();
            goblin.wrap(ModifierKind::LifeDrain);
            let mut hero = player();
            assert_eq!(after_attack(&mut goblin, &mut hero), vec![Effect::Drain { healed: 0 }]);
            assert_eq!(goblin.health(), goblin.max_health());
        }

        #[test]
        fn outer_layer_observes_inner_layer() {
            let mut drain_outside = enemy();
            drain_outside.set_max_health(1_000);
            drain_outside.wrap(ModifierKind::BonusDamage { amount: 500 });
            drain_outside.wrap(ModifierKind::LifeDrain);
            drain_outside.take_raw_damage(20);

            let mut drain_inside = enemy();
            drain_inside.set_max_health(1_000);
            drain_inside.wrap(ModifierKind::LifeDrain);
            drain_inside.wrap(ModifierKind::BonusDamage { amount: 500 });
            drain_inside.take_raw_damage(20);

            let mut hero_a = player();
            hero_a.set_max_health(1_000);
            hero_a.heal_capped(1_000);
            let mut hero_b = hero_a.clone();

            after_attack(&mut drain_outside, &mut hero_a);
            after_attack(&mut drain_inside, &mut hero_b);

            // Drain outside the bonus sees 500 health left, inside sees 1000.
            assert_eq!(hero_a.health(), 500);
            assert_eq!(hero_b.health(), 500);
            assert_eq!(drain_outside.health(), 15);
            assert_eq!(drain_inside.health(), 20);
        }
    }

    mod teleport_tests {
        use super::*;

        #[test]
        fn fires_once_below_threshold() {
            let mut goblin = enemy();
            goblin.wrap(ModifierKind::LowHealthTeleport);
            goblin.take_raw_damage(22);
            assert_eq!(after_damage(&mut goblin), vec![Effect::Teleport]);
            goblin.take_raw_damage(1);
            assert!(after_damage(&mut goblin).is_empty());
        }

        #[test]
        fn not_at_threshold() {
            let mut goblin = enemy();
            goblin.wrap(ModifierKind::LowHealthTeleport);
            // 9 of 30 is exactly 30%.
            goblin.take_raw_damage(21);
            assert!(after_damage(&mut goblin).is_empty());
        }

        #[test]
        fn dead_owner_stays_put() {
            let mut goblin = enemy();
            goblin.wrap(ModifierKind::LowHealthTeleport);
            goblin.take_raw_damage(100);
            assert!(after_damage(&mut goblin).is_empty());
        }
    }

    mod regeneration_tests {
        use super::*;

        #[test]
        fn pulses_on_interval() {
            let mut goblin = enemy();
            goblin.wrap(ModifierKind::Regeneration {
                amount: 4,
                interval_ms: 1_000,
            });
            goblin.take_raw_damage(20);

            assert!(on_tick(&mut goblin, Duration::from_millis(999)).is_empty());
            assert_eq!(
                on_tick(&mut goblin, Duration::from_millis(1_000)),
                vec![Effect::Regenerate { healed: 4 }]
            );
            assert!(on_tick(&mut goblin, Duration::from_millis(1_500)).is_empty());
            on_tick(&mut goblin, Duration::from_millis(2_000));
            assert_eq!(goblin.health(), 18);
        }

        #[test]
        fn capped_at_max() {
            let mut goblin = enemy();
            goblin.wrap(ModifierKind::Regeneration {
                amount: 10,
                interval_ms: 1,
            });
            goblin.take_raw_damage(3);
            on_tick(&mut goblin, Duration::from_millis(5));
            assert_eq!(goblin.health(), goblin.max_health());
        }
    }

    mod explosion_tests {
        use super::*;

        #[test]
        fn splashes_nearby_player() {
            let mut goblin = enemy();
            goblin.set_max_health(200);
            goblin.wrap(ModifierKind::DeathExplosion { radius: 2 });
            goblin.take_raw_damage(500);
            let mut hero = player();
            let effects = on_death(&mut goblin, &mut hero);
            assert_eq!(
                effects,
                vec![Effect::Explode {
                    target: hero.id(),
                    dealt: 4
                }]
            );
            assert_eq!(hero.health(), 96);
        }

        #[test]
        fn minimum_one_damage() {
            let mut goblin = enemy();
            goblin.wrap(ModifierKind::DeathExplosion { radius: 2 });
            goblin.take_raw_damage(500);
            let mut hero = player();
            on_death(&mut goblin, &mut hero);
            assert_eq!(hero.health(), 99);
        }

        #[test]
        fn ignores_distant_player_and_living_owner() {
            let mut goblin = enemy();
            goblin.wrap(ModifierKind::DeathExplosion { radius: 0 });
            let mut hero = player();
            assert!(on_death(&mut goblin, &mut hero).is_empty());
            goblin.take_raw_damage(500);
            assert!(on_death(&mut goblin, &mut hero).is_empty());
            assert_eq!(hero.health(), hero.max_health());
        }
    }

    #[test]
    fn stack_hooks_union() {
        let mut stack = ModifierStack::new();
        assert_eq!(stack.hooks(), Hooks::empty());
        stack.push(ModifierKind::LifeDrain);
        stack.push(ModifierKind::LowHealthTeleport);
        assert_eq!(stack.hooks(), Hooks::AFTER_ATTACK | Hooks::AFTER_DAMAGE);
        assert_eq!(
            stack.kinds(),
            vec![ModifierKind::LifeDrain, ModifierKind::LowHealthTeleport]
        );
    }

    #[test]
    fn kind_config_format() {
        let kind: ModifierKind =
            serde_json::from_str(r#"{"kind":"bonus_damage","amount":3}"#).unwrap();
        assert_eq!(kind, ModifierKind::BonusDamage { amount: 3 });
        let kind: ModifierKind = serde_json::from_str(r#"{"kind":"life_drain"}"#).unwrap();
        assert_eq!(kind, ModifierKind::LifeDrain);
    }
}
