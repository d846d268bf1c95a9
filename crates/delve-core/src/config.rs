//! World configuration.
//!
//! The core is agnostic to how these values were collected (setup wizard,
//! command line, JSON file). Every field has a default, so a partial JSON
//! document is enough:
//!
//! ```
//! use delve_core::config::WorldConfig;
//!
//! let config = WorldConfig::from_json_str(r#"{
//!     "grid_size": 12,
//!     "seed": 7,
//!     "player": { "class": "wizard", "name": "Merlin", "element": "fire" }
//! }"#).unwrap();
//!
//! assert_eq!(config.grid_size, 12);
//! assert_eq!(config.scheduler.period_ms, 500);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use warren::MIN_GRID_SIZE;

use crate::entity::{CombatClass, Element};
use crate::error::{CoreError, CoreResult};
use crate::modifier::ModifierKind;

/// Most modifiers a player may pick at setup.
pub const MAX_PLAYER_MODIFIERS: usize = 2;

/// Starting stat reallocation. The two deltas must cancel out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatDelta {
    /// Added to max health.
    pub health: i32,
    /// Added to power.
    pub power: i32,
}

impl StatDelta {
    /// Returns `true` if the deltas sum to zero.
    #[must_use]
    pub fn is_balanced(self) -> bool {
        self.health.checked_add(self.power) == Some(0)
    }
}

/// Player choices made before the world starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSetup {
    /// Class tag, e.g. `"warrior"`.
    pub class: String,
    /// Display name.
    pub name: String,
    /// Elemental affinity for magic classes. A magic class without one is
    /// given a random element.
    pub element: Option<Element>,
    /// Starting stat reallocation.
    pub stat_delta: StatDelta,
    /// Modifier layers, innermost first.
    pub modifiers: Vec<ModifierKind>,
}

impl Default for PlayerSetup {
    fn default() -> Self {
        Self {
            class: "warrior".to_string(),
            name: "Hero".to_string(),
            element: None,
            stat_delta: StatDelta::default(),
            modifiers: Vec::new(),
        }
    }
}

/// What the world is populated with at start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Population {
    /// Number of enemies.
    pub enemies: usize,
    /// Number of impassable obstacles.
    pub obstacles: usize,
    /// Number of healing potions.
    pub potions: usize,
    /// Number of treasure piles.
    pub treasures: usize,
    /// Enemy class tags, cycled through when spawning.
    pub enemy_classes: Vec<String>,
    /// Most random modifiers a spawned enemy carries.
    pub max_enemy_modifiers: usize,
    /// Health restored by each potion.
    pub potion_restore: i32,
    /// Points awarded by each treasure pile.
    pub treasure_points: u32,
}

impl Default for Population {
    fn default() -> Self {
        Self {
            enemies: 3,
            obstacles: 8,
            potions: 2,
            treasures: 3,
            enemy_classes: vec![
                "goblin".to_string(),
                "skeleton".to_string(),
                "sorcerer".to_string(),
            ],
            max_enemy_modifiers: 2,
            potion_restore: 20,
            treasure_points: 10,
        }
    }
}

impl Population {
    /// Total number of cells the population needs, or `None` on overflow.
    #[must_use]
    pub fn total(&self) -> Option<usize> {
        self.enemies
            .checked_add(self.obstacles)?
            .checked_add(self.potions)?
            .checked_add(self.treasures)
    }
}

/// Agent scheduler tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Tick period for every agent.
    pub period_ms: u64,
    /// Longest wait for a destination cell lock.
    pub lock_timeout_ms: u64,
    /// Worker threads in the agent pool.
    pub threads: usize,
    /// Agents chase a player at most this far away.
    pub chase_distance: u32,
    /// Chance that an idle agent wanders one step.
    pub wander_chance: f64,
    /// Whether agents attack a player in reach.
    pub agents_attack: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            period_ms: 500,
            lock_timeout_ms: 100,
            threads: 4,
            chase_distance: 3,
            wander_chance: 0.2,
            agents_attack: true,
        }
    }
}

impl SchedulerConfig {
    /// Tick period as a [`Duration`].
    #[must_use]
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Lock wait as a [`Duration`].
    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Everything needed to build a [`World`](crate::world::World).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Edge length of the square grid.
    pub grid_size: i32,
    /// Seed for every random stream in the world.
    pub seed: u64,
    /// Player choices.
    pub player: PlayerSetup,
    /// Initial population.
    pub population: Population,
    /// Agent scheduler tuning.
    pub scheduler: SchedulerConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            grid_size: MIN_GRID_SIZE,
            seed: 0,
            player: PlayerSetup::default(),
            population: Population::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl WorldConfig {
    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigParse`] for malformed JSON and whatever
    /// [`WorldConfig::validate`] reports for a well-formed but invalid one.
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every constraint.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownCombatantType`] for unrecognised class
    /// tags and [`CoreError::InvalidConfig`] for any other violation.
    pub fn validate(&self) -> CoreResult<()> {
        if self.grid_size < MIN_GRID_SIZE {
            return Err(invalid(format!(
                "grid_size must be at least {MIN_GRID_SIZE}, got {}",
                self.grid_size
            )));
        }
        self.validate_player()?;
        self.validate_population()?;
        self.validate_scheduler()
    }

    fn validate_player(&self) -> CoreResult<()> {
        let player = &self.player;
        let class: CombatClass = player.class.parse()?;
        if !class.is_player_class() {
            return Err(invalid(format!("`{}` is not a player class", player.class)));
        }
        if player.name.trim().is_empty() {
            return Err(invalid("player name must not be empty".to_string()));
        }
        if player.element.is_some() && !class.is_magic() {
            return Err(invalid(format!("{class} cannot carry an element")));
        }
        if !player.stat_delta.is_balanced() {
            return Err(invalid(format!(
                "stat_delta must sum to zero, got health {} and power {}",
                player.stat_delta.health, player.stat_delta.power
            )));
        }
        let profile = class.profile();
        let health = profile.max_health.checked_add(player.stat_delta.health);
        let power = profile.power_min.checked_add(player.stat_delta.power);
        match (health, power) {
            (Some(health), Some(power)) if health >= 1 && power >= 1 => {}
            (Some(_), Some(_)) => {
                return Err(invalid("stat_delta leaves a stat below 1".to_string()));
            }
            _ => return Err(invalid("stat_delta is out of range".to_string())),
        }
        if profile.power_max.checked_add(player.stat_delta.power).is_none() {
            return Err(invalid("stat_delta is out of range".to_string()));
        }
        if player.modifiers.len() > MAX_PLAYER_MODIFIERS {
            return Err(invalid(format!(
                "at most {MAX_PLAYER_MODIFIERS} player modifiers, got {}",
                player.modifiers.len()
            )));
        }
        Ok(())
    }

    fn validate_population(&self) -> CoreResult<()> {
        let population = &self.population;
        let cells = usize::try_from(self.grid_size)
            .ok()
            .and_then(|size| size.checked_mul(size))
            .unwrap_or(usize::MAX);
        let needed = population
            .total()
            .and_then(|total| total.checked_add(1))
            .ok_or_else(|| invalid("population is out of range".to_string()))?;
        if needed > cells {
            return Err(invalid(format!(
                "population of {needed} does not fit a {size}x{size} grid",
                size = self.grid_size,
            )));
        }
        if population.enemies > 0 && population.enemy_classes.is_empty() {
            return Err(invalid("enemy_classes must not be empty".to_string()));
        }
        for tag in &population.enemy_classes {
            let class: CombatClass = tag.parse()?;
            if class.is_player_class() {
                return Err(invalid(format!("`{tag}` is not an enemy class")));
            }
        }
        if population.potion_restore < 1 {
            return Err(invalid("potion_restore must be positive".to_string()));
        }
        Ok(())
    }

    fn validate_scheduler(&self) -> CoreResult<()> {
        let scheduler = &self.scheduler;
        if scheduler.period_ms == 0 {
            return Err(invalid("period_ms must be positive".to_string()));
        }
        if scheduler.threads == 0 {
            return Err(invalid("threads must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&scheduler.wander_chance) {
            return Err(invalid(format!(
                "wander_chance must lie in [0, 1], got {}",
                scheduler.wander_chance
            )));
        }
        Ok(())
    }
}

fn invalid(message: String) -> CoreError {
    CoreError::InvalidConfig(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        WorldConfig::default().validate().unwrap();
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = WorldConfig::from_json_str("{}").unwrap();
        assert_eq!(config, WorldConfig::default());
    }

    #[test]
    fn small_grid_is_rejected() {
        let config = WorldConfig {
            grid_size: 9,
            ..WorldConfig::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn unbalanced_delta_is_rejected() {
        let mut config = WorldConfig::default();
        config.player.stat_delta = StatDelta {
            health: 10,
            power: -2,
        };
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));

        config.player.stat_delta = StatDelta {
            health: -4,
            power: 4,
        };
        config.validate().unwrap();
    }

    #[test]
    fn too_many_modifiers_are_rejected() {
        let mut config = WorldConfig::default();
        config.player.modifiers = vec![
            ModifierKind::LifeDrain,
            ModifierKind::LowHealthTeleport,
            ModifierKind::BonusDamage { amount: 2 },
        ];
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn unknown_class_tag_surfaces_as_such() {
        let mut config = WorldConfig::default();
        config.player.class = "paladin".to_string();
        assert!(matches!(
            config.validate(),
            Err(CoreError::UnknownCombatantType { .. })
        ));

        let mut config = WorldConfig::default();
        config.population.enemy_classes = vec!["dragon".to_string()];
        assert!(matches!(
            config.validate(),
            Err(CoreError::UnknownCombatantType { .. })
        ));
    }

    #[test]
    fn element_needs_magic_class() {
        let mut config = WorldConfig::default();
        config.player.element = Some(Element::Ice);
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));
        config.player.class = "wizard".to_string();
        config.validate().unwrap();
    }

    #[test]
    fn elements_are_read_by_snake_case_name() {
        let config =
            WorldConfig::from_json_str(r#"{ "player": { "class": "wizard", "element": "lightning" } }"#)
                .unwrap();
        assert_eq!(config.player.element, Some(Element::Lightning));
        assert!(matches!(
            WorldConfig::from_json_str(r#"{ "player": { "class": "wizard", "element": "water" } }"#),
            Err(CoreError::ConfigParse(_))
        ));
    }

    #[test]
    fn overfull_population_is_rejected() {
        let mut config = WorldConfig::default();
        config.population.obstacles = 100;
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn extreme_values_are_rejected_not_overflowed() {
        for json in [
            r#"{ "player": { "stat_delta": { "health": 2147483647, "power": 1 } } }"#,
            r#"{ "player": { "stat_delta": { "health": 2147483647, "power": -2147483647 } } }"#,
            r#"{ "player": { "stat_delta": { "health": -2147483647, "power": 2147483647 } } }"#,
            r#"{ "population": { "enemies": 18446744073709551615 } }"#,
            r#"{ "population": { "obstacles": 18446744073709551615, "potions": 1 } }"#,
        ] {
            assert!(
                matches!(WorldConfig::from_json_str(json), Err(CoreError::InvalidConfig(_))),
                "{json}"
            );
        }
    }

    #[test]
    fn population_total_reports_overflow() {
        let population = Population {
            enemies: usize::MAX,
            treasures: 1,
            ..Population::default()
        };
        assert_eq!(population.total(), None);
        assert_eq!(Population::default().total(), Some(16));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            WorldConfig::from_json_str("{ not json"),
            Err(CoreError::ConfigParse(_))
        ));
    }

    #[test]
    fn modifiers_parse_from_json() {
        let config = WorldConfig::from_json_str(
            r#"{ "player": { "modifiers": [ { "kind": "bonus_damage", "amount": 2 } ] } }"#,
        )
        .unwrap();
        assert_eq!(
            config.player.modifiers,
            vec![ModifierKind::BonusDamage { amount: 2 }]
        );
    }
}
