//! Class-tag driven construction of combatants.

use rand::Rng;
use warren::Position;

use super::class::{CombatClass, EvasionProfile};
use super::combatant::{Combatant, Evasion};
use super::element::Element;
use super::EntityId;
use crate::config::PlayerSetup;
use crate::error::{CoreError, CoreResult};

/// Smallest loot value an enemy can carry.
pub const LOOT_MIN: u32 = 5;

/// Largest loot value an enemy can carry.
pub const LOOT_MAX: u32 = 25;

/// Builds combatants from class tags with randomized starting stats.
///
/// # Example
///
/// ```
/// use delve_core::entity::{CombatantFactory, CombatClass, EntityId};
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
/// use warren::Position;
///
/// let mut rng = ChaCha8Rng::seed_from_u64(5);
/// let skeleton = CombatantFactory::enemy(EntityId::new(9), "Skeleton", Position::new(1, 1), &mut rng).unwrap();
/// assert_eq!(skeleton.class(), CombatClass::Skeleton);
/// assert!((4..=7).contains(&skeleton.power()));
///
/// assert!(CombatantFactory::enemy(EntityId::new(10), "dragon", Position::new(1, 1), &mut rng).is_err());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CombatantFactory;

impl CombatantFactory {
    /// Builds the player from setup choices.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownCombatantType`] for an unrecognised tag and
    /// [`CoreError::InvalidConfig`] for an enemy class tag.
    pub fn player<R: Rng + ?Sized>(
        id: EntityId,
        setup: &PlayerSetup,
        position: Position,
        rng: &mut R,
    ) -> CoreResult<Combatant> {
        let class: CombatClass = setup.class.parse()?;
        if !class.is_player_class() {
            return Err(CoreError::InvalidConfig(format!(
                "`{}` is not a player class",
                setup.class
            )));
        }
        let mut player = Self::build(id, class, &setup.name, position, rng);
        if class.is_magic() {
            player.set_element(Some(setup.element.unwrap_or_else(|| Element::random(rng))));
        }
        player.set_max_health(player.max_health().saturating_add(setup.stat_delta.health));
        player.heal_capped(player.max_health());
        player.set_power(player.power().saturating_add(setup.stat_delta.power));
        for kind in &setup.modifiers {
            player.wrap(*kind);
        }
        Ok(player)
    }

    /// Builds an enemy with randomized power, element and loot.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownCombatantType`] for an unrecognised tag and
    /// [`CoreError::InvalidConfig`] for a player class tag.
    pub fn enemy<R: Rng + ?Sized>(
        id: EntityId,
        tag: &str,
        position: Position,
        rng: &mut R,
    ) -> CoreResult<Combatant> {
        let class: CombatClass = tag.parse()?;
        if class.is_player_class() {
            return Err(CoreError::InvalidConfig(format!("`{tag}` is not an enemy class")));
        }
        let mut enemy = Self::build(id, class, &class.to_string(), position, rng);
        if class.is_magic() {
            enemy.set_element(Some(Element::random(rng)));
        }
        enemy.set_loot(rng.gen_range(LOOT_MIN..=LOOT_MAX));
        Ok(enemy)
    }

    /// Builds a combatant of `class` with power (and agility) drawn from the
    /// class ranges.
    pub fn build<R: Rng + ?Sized>(
        id: EntityId,
        class: CombatClass,
        name: &str,
        position: Position,
        rng: &mut R,
    ) -> Combatant {
        let profile = class.profile();
        let mut combatant = Combatant::new(id, name, class, position);
        combatant.set_power(rng.gen_range(profile.power_min..=profile.power_max));
        if let EvasionProfile::Agility { min, max } = profile.evasion {
            combatant.set_evasion(Evasion::Agility(rng.gen_range(min..=max)));
        }
        combatant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StatDelta;
    use crate::modifier::ModifierKind;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(77)
    }

    #[test]
    fn enemy_stats_fall_in_class_ranges() {
        let mut rng = rng();
        for i in 0..200 {
            for class in CombatClass::ENEMY_CLASSES {
                let enemy =
                    CombatantFactory::enemy(EntityId::new(i), &class.to_string(), Position::new(0, 0), &mut rng)
                        .unwrap();
                let profile = class.profile();
                assert!((profile.power_min..=profile.power_max).contains(&enemy.power()));
                assert!((LOOT_MIN..=LOOT_MAX).contains(&enemy.loot().unwrap()));
                assert_eq!(enemy.element().is_some(), class.is_magic());
                assert!(!enemy.is_player());
            }
        }
    }

    #[test]
    fn tags_are_case_insensitive() {
        let mut rng = rng();
        let enemy = CombatantFactory::enemy(EntityId::new(1), "GOBLIN", Position::new(0, 0), &mut rng).unwrap();
        assert_eq!(enemy.class(), CombatClass::Goblin);
    }

    #[test]
    fn unknown_tag_fails_only_that_call() {
        let mut rng = rng();
        assert!(matches!(
            CombatantFactory::enemy(EntityId::new(1), "lich", Position::new(0, 0), &mut rng),
            Err(CoreError::UnknownCombatantType { .. })
        ));
        assert!(CombatantFactory::enemy(EntityId::new(2), "goblin", Position::new(0, 0), &mut rng).is_ok());
    }

    #[test]
    fn wrong_side_tags_are_rejected() {
        let mut rng = rng();
        assert!(matches!(
            CombatantFactory::enemy(EntityId::new(1), "warrior", Position::new(0, 0), &mut rng),
            Err(CoreError::InvalidConfig(_))
        ));
        let setup = PlayerSetup {
            class: "goblin".to_string(),
            ..PlayerSetup::default()
        };
        assert!(CombatantFactory::player(EntityId::new(1), &setup, Position::new(0, 0), &mut rng).is_err());
    }

    #[test]
    fn player_applies_setup() {
        let mut rng = rng();
        let setup = PlayerSetup {
            class: "wizard".to_string(),
            name: "Merlin".to_string(),
            element: Some(Element::Acid),
            stat_delta: StatDelta {
                health: -3,
                power: 3,
            },
            modifiers: vec![ModifierKind::BonusDamage { amount: 2 }],
        };
        let player = CombatantFactory::player(EntityId::new(1), &setup, Position::new(2, 2), &mut rng).unwrap();
        assert!(player.is_player());
        assert_eq!(player.name(), "Merlin");
        assert_eq!(player.element(), Some(Element::Acid));
        assert_eq!(player.max_health(), 77);
        assert_eq!(player.health(), 77);
        assert!((10..=14).contains(&player.power()));
        assert_eq!(player.modifiers().len(), 1);
    }

    #[test]
    fn wizard_without_element_gets_one() {
        let mut rng = rng();
        let setup = PlayerSetup {
            class: "wizard".to_string(),
            ..PlayerSetup::default()
        };
        let player = CombatantFactory::player(EntityId::new(1), &setup, Position::new(0, 0), &mut rng).unwrap();
        assert!(player.element().is_some());
    }

    #[test]
    fn archer_agility_in_range() {
        let mut rng = rng();
        for _ in 0..100 {
            let archer = CombatantFactory::build(EntityId::new(1), CombatClass::Archer, "Robin", Position::new(0, 0), &mut rng);
            match archer.evasion() {
                Evasion::Agility(a) => assert!((3..=7).contains(&a)),
                Evasion::Fixed(_) => panic!("archer evasion should be agility based"),
            }
        }
    }
}
