//! Headless Delve driver.
//!
//! Builds a world from an optional JSON configuration, lets the agent
//! scheduler drive the enemies and plays the player from this thread with a
//! simple scripted policy until time runs out, the dungeon is cleared or the
//! player falls.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use delve_core::item::ItemKind;
use delve_core::warren::{Direction, Position};
use delve_core::{AgentScheduler, CoreError, ExchangeOutcome, GameEvent, MoveOutcome, World, WorldConfig};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Run a Delve world headless with a scripted player
#[derive(Parser, Debug)]
#[command(name = "delve")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON world configuration (defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Wall-clock seconds to run
    #[arg(long, default_value_t = 10)]
    seconds: u64,

    /// Pause between scripted player actions, in milliseconds
    #[arg(long, default_value_t = 250)]
    step_ms: u64,

    /// Snapshot at start and rewind to it whenever the player falls
    #[arg(long)]
    rewind: bool,
}

/// What the scripted player did on one turn.
#[derive(Debug)]
enum Action {
    Drank(i32),
    PickedUp(usize),
    Attacked(Option<ExchangeOutcome>),
    Moved(MoveOutcome),
    Waited,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let config = load_config(&args)?;
    let world = Arc::new(World::new(config).context("failed to build world")?);
    let changes = world.subscribe(256);
    let mut scheduler = AgentScheduler::start(Arc::clone(&world))?;
    if args.rewind {
        world.save_snapshot();
    }

    let step = Duration::from_millis(args.step_ms);
    let deadline = Instant::now() + Duration::from_secs(args.seconds);
    let mut turns = 0u64;
    let mut rewinds = 0u64;
    while Instant::now() < deadline {
        if world.is_game_over() {
            if !args.rewind {
                break;
            }
            world.restore_snapshot()?;
            world.save_snapshot();
            rewinds += 1;
            info!(rewinds, "player fell, rewound to start");
            continue;
        }
        if world.enemy_ids().is_empty() {
            info!("every enemy defeated");
            break;
        }
        match play_turn(&world) {
            Ok(action) => debug!(?action, "player turn"),
            Err(CoreError::PlayerDefeated) => continue,
            Err(err) => return Err(err.into()),
        }
        turns += 1;
        thread::sleep(step);
    }

    scheduler.stop();
    let notifications = changes.try_iter().count();
    print_summary(&world, &scheduler, turns, rewinds, notifications);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn load_config(args: &Args) -> Result<WorldConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            WorldConfig::from_json_str(&raw).with_context(|| format!("invalid config {}", path.display()))?
        }
        None => WorldConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    config.validate()?;
    Ok(config)
}

/// One turn of the scripted player: drink when low, grab what is in reach,
/// fight what is in range, otherwise walk toward the nearest enemy.
fn play_turn(world: &World) -> Result<Action, CoreError> {
    let player = world.player();
    let here = player.position();

    if player.health() * 2 < player.max_health() {
        let potion = player.player_state().and_then(|state| {
            state
                .inventory
                .iter()
                .find(|item| matches!(item.kind, ItemKind::Potion { .. }))
                .map(|item| item.id)
        });
        if let Some(potion) = potion {
            return world.use_item(potion).map(Action::Drank);
        }
    }

    let mut picked = 0;
    for placed in world.items() {
        if here.distance(placed.position) <= delve_core::world::PICKUP_REACH {
            picked += world.pick_up_item_at(placed.position)?.len();
        }
    }
    if picked > 0 {
        return Ok(Action::PickedUp(picked));
    }

    let Some(target) = world
        .enemies()
        .into_iter()
        .filter(|enemy| !enemy.is_dead())
        .min_by_key(|enemy| (here.distance(enemy.position()), enemy.id()))
    else {
        return Ok(Action::Waited);
    };
    if player.is_in_range(target.position()) {
        let report = world.resolve_combat_at(target.position())?;
        return Ok(Action::Attacked(report.map(|r| r.outcome)));
    }

    step_toward(world, here, target.position()).map(Action::Moved)
}

/// Tries the greedy step first, then the remaining neighbours nearest the
/// goal first.
fn step_toward(world: &World, here: Position, goal: Position) -> Result<MoveOutcome, CoreError> {
    let mut candidates: Vec<Position> = Direction::ALL.iter().map(|d| here.offset(*d)).collect();
    let greedy = here.step_toward(goal);
    candidates.sort_by_key(|p| (*p != greedy, p.distance(goal)));

    let mut last = MoveOutcome::Blocked;
    for next in candidates {
        if !world.grid().in_bounds(next) {
            continue;
        }
        last = world.move_player_to(next)?;
        if last.is_moved() {
            break;
        }
    }
    Ok(last)
}

fn print_summary(world: &World, scheduler: &AgentScheduler, turns: u64, rewinds: u64, notifications: usize) {
    let events = world.events().take_events();
    let exchanges = events.iter().filter(|e| matches!(e, GameEvent::Exchange(_))).count();
    let defeated = events
        .iter()
        .filter(|e| matches!(e, GameEvent::EnemyDefeated { .. }))
        .count();
    let player = world.player();
    let treasure = player.player_state().map_or(0, |state| state.treasure);

    println!("Delve run complete");
    println!("  agent ticks:     {}", scheduler.ticks());
    println!("  player turns:    {turns}");
    println!("  rewinds:         {rewinds}");
    println!("  exchanges:       {exchanges}");
    println!("  enemies slain:   {defeated}");
    println!("  enemies left:    {}", world.enemy_ids().len());
    println!("  notifications:   {notifications}");
    println!(
        "  {} the {}: {}/{} health, {} treasure{}",
        player.name(),
        player.class(),
        player.health(),
        player.max_health(),
        treasure,
        if world.is_game_over() { ", defeated" } else { "" }
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn shipped_config_is_valid() {
        let config = WorldConfig::from_json_str(include_str!("../configs/crypt.json")).unwrap();
        assert_eq!(config.grid_size, 14);
        assert_eq!(config.player.modifiers.len(), 1);
    }

    #[test]
    fn seed_flag_overrides_config() {
        let args = Args::parse_from(["delve", "--seed", "77"]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.seed, 77);
    }

    #[test]
    fn scripted_player_closes_in_and_fights() {
        let mut config = WorldConfig::default();
        config.population.enemies = 1;
        config.population.obstacles = 0;
        config.population.potions = 0;
        config.population.treasures = 0;
        config.population.enemy_classes = vec!["goblin".to_string()];
        config.population.max_enemy_modifiers = 0;
        let world = World::new(config).unwrap();

        let mut attacked = false;
        for _ in 0..40 {
            match play_turn(&world) {
                Ok(Action::Attacked(_)) => {
                    attacked = true;
                    break;
                }
                Ok(_) => {}
                Err(CoreError::PlayerDefeated) => break,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
        assert!(attacked);
    }
}
