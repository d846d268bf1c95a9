//! World builders and invariant checks shared by the test modules.

use warren::Position;

use crate::config::{Population, SchedulerConfig, WorldConfig};
use crate::entity::{Combatant, EntityId, Evasion, Occupant};
use crate::world::World;

// =============================================================================
// World Setup
// =============================================================================

/// A configuration with an empty population and no wandering.
///
/// Only the player is placed at construction, so tests can lay out every
/// other occupant themselves.
pub fn quiet_config(seed: u64) -> WorldConfig {
    WorldConfig {
        seed,
        population: Population {
            enemies: 0,
            obstacles: 0,
            potions: 0,
            treasures: 0,
            ..Population::default()
        },
        scheduler: SchedulerConfig {
            wander_chance: 0.0,
            ..SchedulerConfig::default()
        },
        ..WorldConfig::default()
    }
}

/// Builds a world from [`quiet_config`].
pub fn quiet_world(seed: u64) -> World {
    World::new(quiet_config(seed)).expect("quiet config is valid")
}

/// Moves the player to `position` unless it already stands there.
pub fn place_player(world: &World, position: Position) {
    if world.player().position() == position {
        return;
    }
    let outcome = world.move_player_to(position).expect("player move");
    assert!(outcome.is_moved(), "could not place player: {outcome:?}");
}

/// Removes every source of randomness from a combatant's own rolls.
pub fn make_certain(combatant: &mut Combatant) {
    combatant.set_evasion(Evasion::Fixed(0.0));
    combatant.set_crit_chance(0.0);
}

/// Spawns an enemy of class `tag` that never evades or crits and hits for
/// exactly `power`.
pub fn spawn_certain_enemy(world: &World, tag: &str, position: Position, power: i32) -> EntityId {
    let id = world.spawn_enemy(tag, position).expect("spawn enemy");
    world
        .with_enemy(id, |enemy| {
            make_certain(enemy);
            enemy.set_power(power);
        })
        .expect("enemy exists");
    id
}

/// Makes the player deterministic and sets its power.
pub fn certain_player(world: &World, power: i32) {
    world.with_player(|player| {
        make_certain(player);
        player.set_power(power);
    });
}

// =============================================================================
// Invariants
// =============================================================================

/// Asserts that every combatant occupies exactly the cell its record names
/// and that no cell holds two blocking occupants.
pub fn assert_occupancy_consistent(world: &World) {
    let grid = world.grid();
    let player = world.player();
    assert_eq!(
        grid.positions_of(&Occupant::Player(player.id())),
        vec![player.position()],
        "player record and grid disagree"
    );
    for enemy in world.enemies() {
        assert_eq!(
            grid.positions_of(&Occupant::Enemy(enemy.id())),
            vec![enemy.position()],
            "enemy {} record and grid disagree",
            enemy.id()
        );
    }
    for (position, occupants) in grid.occupied_cells() {
        let blocking = occupants.iter().filter(|o| o.blocks_movement()).count();
        assert!(blocking <= 1, "cell {position} holds {blocking} blocking occupants");
    }
}
