//! Combat classes and the capability flags they grant.
//!
//! A class is a tag. Everything that varies by class (attack range, evasion
//! rule, starting stats, capabilities) is looked up from its
//! [`ClassProfile`], so dispatch never interrogates concrete types.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

bitflags! {
    /// Combat styles a combatant can use.
    ///
    /// Melee and ranged attackers deal base power with a critical-hit roll;
    /// magic attackers deal elemental-modified damage instead.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Capabilities: u8 {
        /// Adjacent attacks only.
        const MELEE = 0b0001;
        /// Attacks at a distance.
        const RANGED = 0b0010;
        /// Elemental spell attacks.
        const MAGIC = 0b0100;
    }
}

/// How a class derives its evasion probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvasionProfile {
    /// A fixed probability.
    Fixed(f64),
    /// Derived from an agility score drawn in `min..=max` at creation.
    Agility {
        /// Lowest starting agility.
        min: u32,
        /// Highest starting agility.
        max: u32,
    },
}

/// Static per-class parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassProfile {
    /// Starting and maximum health.
    pub max_health: i32,
    /// Lowest starting power.
    pub power_min: i32,
    /// Highest starting power.
    pub power_max: i32,
    /// Attack reach in Manhattan distance.
    pub range: u32,
    /// Evasion rule.
    pub evasion: EvasionProfile,
    /// Fraction of elemental damage shrugged off (enemies only).
    pub resistance: f64,
    /// Combat styles this class uses.
    pub capabilities: Capabilities,
}

/// Every concrete combatant class.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatClass {
    /// Player melee fighter.
    Warrior,
    /// Player ranged fighter with agility-based evasion.
    Archer,
    /// Player spell caster.
    Wizard,
    /// Enemy melee brute.
    Goblin,
    /// Enemy archer.
    Skeleton,
    /// Enemy spell caster.
    Sorcerer,
}

impl CombatClass {
    /// Classes a player may pick.
    pub const PLAYER_CLASSES: [Self; 3] = [Self::Warrior, Self::Archer, Self::Wizard];

    /// Classes that populate the dungeon.
    pub const ENEMY_CLASSES: [Self; 3] = [Self::Goblin, Self::Skeleton, Self::Sorcerer];

    /// Returns the static profile for this class.
    #[must_use]
    pub const fn profile(self) -> ClassProfile {
        match self {
            Self::Warrior => ClassProfile {
                max_health: 100,
                power_min: 8,
                power_max: 12,
                range: 1,
                evasion: EvasionProfile::Fixed(0.10),
                resistance: 0.0,
                capabilities: Capabilities::MELEE,
            },
            Self::Archer => ClassProfile {
                max_health: 90,
                power_min: 6,
                power_max: 10,
                range: 2,
                evasion: EvasionProfile::Agility { min: 3, max: 7 },
                resistance: 0.0,
                capabilities: Capabilities::RANGED,
            },
            Self::Wizard => ClassProfile {
                max_health: 80,
                power_min: 7,
                power_max: 11,
                range: 2,
                evasion: EvasionProfile::Fixed(0.05),
                resistance: 0.0,
                capabilities: Capabilities::MAGIC.union(Capabilities::RANGED),
            },
            Self::Goblin => ClassProfile {
                max_health: 30,
                power_min: 3,
                power_max: 6,
                range: 1,
                evasion: EvasionProfile::Fixed(0.25),
                resistance: 0.0,
                capabilities: Capabilities::MELEE,
            },
            Self::Skeleton => ClassProfile {
                max_health: 40,
                power_min: 4,
                power_max: 7,
                range: 2,
                evasion: EvasionProfile::Fixed(0.15),
                resistance: 0.1,
                capabilities: Capabilities::RANGED,
            },
            Self::Sorcerer => ClassProfile {
                max_health: 35,
                power_min: 4,
                power_max: 8,
                range: 2,
                evasion: EvasionProfile::Fixed(0.10),
                resistance: 0.25,
                capabilities: Capabilities::MAGIC.union(Capabilities::RANGED),
            },
        }
    }

    /// Returns `true` for classes a player may pick.
    #[must_use]
    pub const fn is_player_class(self) -> bool {
        matches!(self, Self::Warrior | Self::Archer | Self::Wizard)
    }

    /// Returns `true` if this class casts elemental spells.
    #[must_use]
    pub const fn is_magic(self) -> bool {
        self.profile().capabilities.contains(Capabilities::MAGIC)
    }
}

impl fmt::Display for CombatClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warrior => write!(f, "Warrior"),
            Self::Archer => write!(f, "Archer"),
            Self::Wizard => write!(f, "Wizard"),
            Self::Goblin => write!(f, "Goblin"),
            Self::Skeleton => write!(f, "Skeleton"),
            Self::Sorcerer => write!(f, "Sorcerer"),
        }
    }
}

impl FromStr for CombatClass {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warrior" => Ok(Self::Warrior),
            "archer" => Ok(Self::Archer),
            "wizard" => Ok(Self::Wizard),
            "goblin" => Ok(Self::Goblin),
            "skeleton" => Ok(Self::Skeleton),
            "sorcerer" => Ok(Self::Sorcerer),
            _ => Err(CoreError::UnknownCombatantType { tag: s.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn melee_classes_reach_one_cell() {
        assert_eq!(CombatClass::Warrior.profile().range, 1);
        assert_eq!(CombatClass::Goblin.profile().range, 1);
    }

    #[test]
    fn ranged_and_magic_classes_reach_two_cells() {
        for class in [
            CombatClass::Archer,
            CombatClass::Wizard,
            CombatClass::Skeleton,
            CombatClass::Sorcerer,
        ] {
            assert_eq!(class.profile().range, 2, "{class}");
        }
    }

    #[test]
    fn magic_flag() {
        assert!(CombatClass::Wizard.is_magic());
        assert!(CombatClass::Sorcerer.is_magic());
        assert!(!CombatClass::Warrior.is_magic());
        assert!(!CombatClass::Skeleton.is_magic());
    }

    #[test]
    fn player_and_enemy_partition() {
        for class in CombatClass::PLAYER_CLASSES {
            assert!(class.is_player_class());
        }
        for class in CombatClass::ENEMY_CLASSES {
            assert!(!class.is_player_class());
        }
    }

    #[test]
    fn power_ranges_are_well_formed() {
        for class in CombatClass::PLAYER_CLASSES
            .into_iter()
            .chain(CombatClass::ENEMY_CLASSES)
        {
            let profile = class.profile();
            assert!(profile.power_min > 0);
            assert!(profile.power_min <= profile.power_max);
            assert!(profile.max_health > 0);
        }
    }

    #[test]
    fn parse_tags() {
        assert_eq!("Goblin".parse::<CombatClass>().unwrap(), CombatClass::Goblin);
        assert_eq!(" wizard".parse::<CombatClass>().unwrap(), CombatClass::Wizard);
        let err = "dragon".parse::<CombatClass>().unwrap_err();
        assert!(matches!(err, CoreError::UnknownCombatantType { tag } if tag == "dragon"));
    }
}
