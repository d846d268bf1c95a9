//! World orchestrator: the grid, the roster and every action on them.
//!
//! [`World`] is shared between the foreground action path and the agent
//! scheduler's workers, so every operation takes `&self`.
//!
//! # Lock order
//!
//! Locks are always taken in this order and released in reverse:
//!
//! 1. the world gate (read for ordinary actions, write for save/restore)
//! 2. at most one destination cell lock
//! 3. combatant mutexes, ascending by [`EntityId`]
//! 4. leaf locks (grid occupancy, roster, RNG, event log, notifier), each
//!    held only for one short operation
//!
//! Relocations after an exchange (teleports, removing the dead, dropping
//! loot) run after the combatant mutexes are released, so they can take a
//! cell lock without breaking the order.
//!
//! # Example
//!
//! ```
//! use delve_core::config::{Population, WorldConfig};
//! use delve_core::world::{MoveOutcome, World};
//! use warren::Position;
//!
//! let config = WorldConfig {
//!     population: Population { enemies: 0, obstacles: 0, potions: 0, treasures: 0, ..Population::default() },
//!     ..WorldConfig::default()
//! };
//! let world = World::new(config).unwrap();
//!
//! let outcome = world.move_player_to(Position::new(4, 4)).unwrap();
//! assert!(outcome.is_moved() || outcome == MoveOutcome::Blocked);
//! assert_eq!(world.player().position(), Position::new(4, 4));
//! ```

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};
use warren::{Direction, Grid, Position};

use crate::agent::{decide, AgentView, Intent, TickOutcome};
use crate::arena::{Arena, SharedCombatant};
use crate::config::WorldConfig;
use crate::entity::{Combatant, CombatantFactory, EntityId, Occupant};
use crate::error::{CoreError, CoreResult};
use crate::item::{Item, ItemKind, PlacedItem};
use crate::modifier::{self, Effect, ModifierKind};
use crate::notify::{Notifier, StateChanged};
use crate::resolver::{CombatResolver, EventLog, ExchangeOutcome, ExchangeReport, GameEvent};
use crate::snapshot::{Snapshot, SnapshotStack};
use crate::sync::{lock, read, write};

/// How far from the player an item may lie and still be picked up.
pub const PICKUP_REACH: u32 = 1;

/// Result of a movement attempt that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveOutcome {
    /// The mover now stands in `to`.
    Moved {
        /// Previous cell.
        from: Position,
        /// New cell.
        to: Position,
    },
    /// The destination holds something that blocks movement.
    Blocked,
    /// The destination lies off the grid.
    OutOfBounds,
    /// The destination cell lock was not acquired in time. The move is
    /// abandoned for this tick.
    Contended,
    /// The mover is dead or no longer where the grid expected it.
    Skipped,
}

impl MoveOutcome {
    /// Returns `true` if the move happened.
    #[must_use]
    pub fn is_moved(&self) -> bool {
        matches!(self, Self::Moved { .. })
    }
}

/// Follow-up work from an exchange, applied once the combatant locks are
/// released.
#[derive(Debug, Default)]
struct Fallout {
    defeated: Vec<(EntityId, Position, u32)>,
    player_died: bool,
    relocations: Vec<EntityId>,
}

/// The running simulation.
#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    grid: Grid<Occupant>,
    player_id: EntityId,
    player: SharedCombatant,
    arena: RwLock<Arena>,
    resolver: CombatResolver,
    rng: Mutex<ChaCha8Rng>,
    gate: RwLock<()>,
    events: EventLog,
    notifier: Notifier,
    snapshots: Mutex<SnapshotStack>,
    game_over: AtomicBool,
    started: Instant,
}

impl World {
    /// Builds and populates a world.
    ///
    /// Obstacles are placed first, then the player, the enemies (each with
    /// zero or more random modifiers) and finally the items, each on a random
    /// empty cell.
    ///
    /// # Errors
    ///
    /// Returns the configuration errors of [`WorldConfig::validate`] and
    /// [`CoreError::NoSpaceAvailable`] when a placement search gives up.
    pub fn new(config: WorldConfig) -> CoreResult<Self> {
        config.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let grid = Grid::new(config.grid_size);
        let mut arena = Arena::new();
        let population = &config.population;

        for _ in 0..population.obstacles {
            let position = grid.random_empty_position(&mut rng)?;
            let id = arena.allocate_id();
            grid.add(position, Occupant::Obstacle(id))?;
            arena.insert_obstacle(id, position);
        }

        let player_id = arena.allocate_id();
        let position = grid.random_empty_position(&mut rng)?;
        let player = CombatantFactory::player(player_id, &config.player, position, &mut rng)?;
        grid.add(position, Occupant::Player(player_id))?;

        for index in 0..population.enemies {
            let tag = population
                .enemy_classes
                .get(index % population.enemy_classes.len().max(1))
                .ok_or_else(|| CoreError::InvalidConfig("enemy_classes is empty".to_string()))?;
            let position = grid.random_empty_position(&mut rng)?;
            let id = arena.allocate_id();
            let mut enemy = CombatantFactory::enemy(id, tag, position, &mut rng)?;
            for _ in 0..rng.gen_range(0..=population.max_enemy_modifiers) {
                enemy.wrap(ModifierKind::random_enemy(&mut rng));
            }
            grid.add(position, Occupant::Enemy(id))?;
            debug!(enemy = %id, class = %enemy.class(), modifiers = ?enemy.modifiers().kinds(), "enemy spawned");
            arena.insert_enemy(enemy);
        }

        let potion = ItemKind::Potion {
            restore: population.potion_restore,
        };
        let treasure = ItemKind::Treasure {
            points: population.treasure_points,
        };
        for kind in std::iter::repeat(potion)
            .take(population.potions)
            .chain(std::iter::repeat(treasure).take(population.treasures))
        {
            let position = grid.random_empty_position(&mut rng)?;
            let id = arena.allocate_id();
            grid.add(position, Occupant::Item(id))?;
            arena.insert_item(position, Item::new(id, kind));
        }

        info!(
            size = config.grid_size,
            seed = config.seed,
            player = %player.name(),
            class = %player.class(),
            enemies = arena.enemy_count(),
            "world created"
        );

        Ok(Self {
            grid,
            player_id,
            player: std::sync::Arc::new(Mutex::new(player)),
            arena: RwLock::new(arena),
            resolver: CombatResolver::new(),
            rng: Mutex::new(rng),
            gate: RwLock::new(()),
            events: EventLog::new(),
            notifier: Notifier::new(),
            snapshots: Mutex::new(SnapshotStack::new()),
            game_over: AtomicBool::new(false),
            started: Instant::now(),
            config,
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The configuration the world was built from.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// The occupancy grid.
    #[must_use]
    pub fn grid(&self) -> &Grid<Occupant> {
        &self.grid
    }

    /// Edge length of the grid.
    #[must_use]
    pub fn grid_size(&self) -> i32 {
        self.grid.size()
    }

    /// Occupants of `position` (empty off the grid).
    #[must_use]
    pub fn entities_at(&self, position: Position) -> BTreeSet<Occupant> {
        self.grid.entities_at(position)
    }

    /// The player's ID.
    #[must_use]
    pub fn player_id(&self) -> EntityId {
        self.player_id
    }

    /// Copy of the player record.
    #[must_use]
    pub fn player(&self) -> Combatant {
        lock(&self.player).clone()
    }

    /// Copy of one enemy record.
    #[must_use]
    pub fn enemy(&self, id: EntityId) -> Option<Combatant> {
        let handle = read(&self.arena).enemy(id)?;
        let enemy = lock(&handle).clone();
        Some(enemy)
    }

    /// IDs of every enemy still in the roster.
    #[must_use]
    pub fn enemy_ids(&self) -> Vec<EntityId> {
        read(&self.arena).enemy_ids()
    }

    /// Copies of every enemy record, ascending by ID.
    #[must_use]
    pub fn enemies(&self) -> Vec<Combatant> {
        let handles = read(&self.arena).enemy_handles();
        handles.iter().map(|(_, handle)| lock(handle).clone()).collect()
    }

    /// Every item lying on the grid.
    #[must_use]
    pub fn items(&self) -> Vec<PlacedItem> {
        read(&self.arena).items().copied().collect()
    }

    /// Returns `true` once the player has died.
    #[must_use]
    pub fn is_game_over(&self) -> bool {
        self.game_over.load(Ordering::SeqCst)
    }

    /// Time since the world was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// The fire-and-forget event log.
    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Registers an observer of state changes.
    #[must_use]
    pub fn subscribe(&self, capacity: usize) -> Receiver<StateChanged> {
        self.notifier.subscribe(capacity)
    }

    // =========================================================================
    // Setup
    // =========================================================================

    /// Spawns an enemy of class `tag` on an empty cell.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPosition`] off the grid,
    /// [`CoreError::CellOccupied`] for a non-empty or busy cell and the
    /// factory errors for a bad tag.
    pub fn spawn_enemy(&self, tag: &str, position: Position) -> CoreResult<EntityId> {
        let _gate = read(&self.gate);
        self.grid.check(position)?;
        let _cell = self.claim_empty_cell(position)?;
        let id = write(&self.arena).allocate_id();
        let enemy = {
            let mut rng = lock(&self.rng);
            CombatantFactory::enemy(id, tag, position, &mut *rng)?
        };
        self.grid.add(position, Occupant::Enemy(id))?;
        write(&self.arena).insert_enemy(enemy);
        debug!(enemy = %id, %position, "enemy spawned");
        self.notifier.publish();
        Ok(id)
    }

    /// Places an item on a cell without an obstacle or combatant.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPosition`] off the grid and
    /// [`CoreError::CellOccupied`] for a blocked or busy cell.
    pub fn add_item(&self, position: Position, kind: ItemKind) -> CoreResult<EntityId> {
        let _gate = read(&self.gate);
        self.grid.check(position)?;
        let _cell = self
            .grid
            .lock_cell(position, self.lock_timeout())
            .ok_or(CoreError::CellOccupied { position })?;
        if self.grid.any_at(position, |o| o.blocks_movement()) {
            return Err(CoreError::CellOccupied { position });
        }
        let id = {
            let mut arena = write(&self.arena);
            let id = arena.allocate_id();
            arena.insert_item(position, Item::new(id, kind));
            id
        };
        self.grid.add(position, Occupant::Item(id))?;
        self.notifier.publish();
        Ok(id)
    }

    /// Places an obstacle on an empty cell.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPosition`] off the grid and
    /// [`CoreError::CellOccupied`] for a non-empty or busy cell.
    pub fn add_obstacle(&self, position: Position) -> CoreResult<EntityId> {
        let _gate = read(&self.gate);
        self.grid.check(position)?;
        let _cell = self.claim_empty_cell(position)?;
        let id = {
            let mut arena = write(&self.arena);
            let id = arena.allocate_id();
            arena.insert_obstacle(id, position);
            id
        };
        self.grid.add(position, Occupant::Obstacle(id))?;
        self.notifier.publish();
        Ok(id)
    }

    /// Runs `f` on the locked player record.
    ///
    /// `f` must not call back into the world. Position changes go through
    /// the movement actions instead.
    pub fn with_player<T>(&self, f: impl FnOnce(&mut Combatant) -> T) -> T {
        let _gate = read(&self.gate);
        let mut player = lock(&self.player);
        let result = f(&mut player);
        if player.is_dead() {
            self.game_over.store(true, Ordering::SeqCst);
        }
        result
    }

    /// Runs `f` on the locked record of enemy `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownEntity`] if `id` is not in the roster.
    pub fn with_enemy<T>(&self, id: EntityId, f: impl FnOnce(&mut Combatant) -> T) -> CoreResult<T> {
        let _gate = read(&self.gate);
        let handle = read(&self.arena)
            .enemy(id)
            .ok_or(CoreError::UnknownEntity(id))?;
        let mut enemy = lock(&handle);
        Ok(f(&mut enemy))
    }

    // =========================================================================
    // Player actions
    // =========================================================================

    /// Moves the player to `position`.
    ///
    /// The destination must not hold an obstacle or another combatant; items
    /// do not block. The destination cell lock is taken with the configured
    /// timeout, and a timeout yields [`MoveOutcome::Contended`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PlayerDefeated`] after game over and
    /// [`CoreError::InvalidPosition`] off the grid.
    pub fn move_player_to(&self, position: Position) -> CoreResult<MoveOutcome> {
        let _gate = read(&self.gate);
        self.ensure_alive()?;
        self.grid.check(position)?;
        let Some(_cell) = self.grid.lock_cell(position, self.lock_timeout()) else {
            trace!(to = %position, "player move contended");
            return Ok(MoveOutcome::Contended);
        };
        if self.grid.any_at(position, |o| o.blocks_movement()) {
            return Ok(MoveOutcome::Blocked);
        }
        let from = {
            let mut player = lock(&self.player);
            let from = player.position();
            let occupant = Occupant::Player(self.player_id);
            if player.is_dead() || !matches!(self.grid.move_entity(&occupant, from, position), Ok(true)) {
                return Ok(MoveOutcome::Skipped);
            }
            player.set_position(position);
            from
        };
        self.events.record(GameEvent::PlayerMoved { from, to: position });
        self.notifier.publish();
        Ok(MoveOutcome::Moved { from, to: position })
    }

    /// Moves the player one cell in `direction`. Stepping off the grid
    /// yields [`MoveOutcome::OutOfBounds`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PlayerDefeated`] after game over.
    pub fn move_player(&self, direction: Direction) -> CoreResult<MoveOutcome> {
        self.ensure_alive()?;
        let to = lock(&self.player).position().offset(direction);
        if !self.grid.in_bounds(to) {
            return Ok(MoveOutcome::OutOfBounds);
        }
        self.move_player_to(to)
    }

    /// Attacks the enemy standing at `position`.
    ///
    /// Returns `None` when no living enemy is there.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PlayerDefeated`] after game over and
    /// [`CoreError::InvalidPosition`] off the grid.
    pub fn resolve_combat_at(&self, position: Position) -> CoreResult<Option<ExchangeReport>> {
        let _gate = read(&self.gate);
        self.ensure_alive()?;
        self.grid.check(position)?;
        let Some(enemy_id) = self.grid.entities_at(position).into_iter().find_map(|o| match o {
            Occupant::Enemy(id) => Some(id),
            _ => None,
        }) else {
            return Ok(None);
        };
        let Some(handle) = read(&self.arena).enemy(enemy_id) else {
            return Ok(None);
        };
        let mut rng = self.fork_rng();
        Ok(self.exchange((self.player_id, &self.player), (enemy_id, &handle), &mut rng))
    }

    /// Picks up every item at `position`, which must be the player's cell or
    /// adjacent to it.
    ///
    /// Treasure and loot turn into treasure points at once; potions go to the
    /// inventory. Returns the items collected, empty if out of reach.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PlayerDefeated`] after game over and
    /// [`CoreError::InvalidPosition`] off the grid.
    pub fn pick_up_item_at(&self, position: Position) -> CoreResult<Vec<Item>> {
        let _gate = read(&self.gate);
        self.ensure_alive()?;
        self.grid.check(position)?;
        let Some(_cell) = self.grid.lock_cell(position, self.lock_timeout()) else {
            return Ok(Vec::new());
        };
        let mut player = lock(&self.player);
        if player.position().distance(position) > PICKUP_REACH {
            return Ok(Vec::new());
        }

        let mut picked = Vec::new();
        for occupant in self.grid.entities_at(position) {
            let Occupant::Item(item_id) = occupant else {
                continue;
            };
            let Some(placed) = write(&self.arena).remove_item(item_id) else {
                continue;
            };
            if let Err(err) = self.grid.remove(position, &occupant) {
                warn!(item = %item_id, %err, "item missing from grid");
            }
            let item = placed.item;
            if let Some(state) = player.player_state_mut() {
                match item.kind.points() {
                    Some(points) => state.treasure = state.treasure.saturating_add(points),
                    None => {
                        if !state.inventory.add(item) {
                            warn!(item = %item_id, "item already carried");
                        }
                    }
                }
            }
            picked.push(item);
        }
        drop(player);

        for item in &picked {
            self.events.record(GameEvent::ItemPickedUp {
                item: item.id,
                kind: item.kind,
            });
        }
        if !picked.is_empty() {
            self.notifier.publish();
        }
        Ok(picked)
    }

    /// Uses the inventory item `id` and returns the health restored.
    ///
    /// Potions heal up to max health, never past it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PlayerDefeated`] after game over and
    /// [`CoreError::UnknownEntity`] if the item is not carried.
    pub fn use_item(&self, id: EntityId) -> CoreResult<i32> {
        let _gate = read(&self.gate);
        self.ensure_alive()?;
        let restored = {
            let mut player = lock(&self.player);
            let item = player
                .player_state_mut()
                .and_then(|state| state.inventory.remove(id))
                .ok_or(CoreError::UnknownEntity(id))?;
            match item.kind {
                ItemKind::Potion { restore } => player.heal_capped(restore),
                ItemKind::Treasure { points } | ItemKind::Loot { points } => {
                    if let Some(state) = player.player_state_mut() {
                        state.treasure = state.treasure.saturating_add(points);
                    }
                    0
                }
            }
        };
        self.events.record(GameEvent::ItemUsed { item: id, restored });
        self.notifier.publish();
        Ok(restored)
    }

    /// Runs the player's periodic modifiers at elapsed world time `now`.
    pub fn update(&self, now: Duration) {
        let _gate = read(&self.gate);
        let effects = modifier::on_tick(&mut lock(&self.player), now);
        self.record_regeneration(self.player_id, &effects);
    }

    // =========================================================================
    // Agents
    // =========================================================================

    /// Runs one scheduler tick for enemy `id`: periodic modifiers, then a
    /// decision and its execution.
    pub fn step_agent<R: Rng + ?Sized>(&self, id: EntityId, rng: &mut R, now: Duration) -> TickOutcome {
        let _gate = read(&self.gate);
        let Some(handle) = read(&self.arena).enemy(id) else {
            return TickOutcome::Idle;
        };
        let (position, attack_range, dead, effects) = {
            let mut enemy = lock(&handle);
            let effects = modifier::on_tick(&mut enemy, now);
            (enemy.position(), enemy.range(), enemy.is_dead(), effects)
        };
        self.record_regeneration(id, &effects);
        let (player_position, player_dead) = {
            let player = lock(&self.player);
            (player.position(), player.is_dead())
        };
        let view = AgentView {
            enemy: id,
            position,
            attack_range,
            dead,
            player_position,
            player_dead: player_dead || self.is_game_over(),
        };

        let intent = decide(&view, &self.config.scheduler, rng);
        trace!(enemy = %id, ?intent, "agent decision");
        match intent {
            Intent::Idle => TickOutcome::Idle,
            Intent::Move(to) => TickOutcome::Moved(self.try_move_enemy(id, &handle, to)),
            Intent::Attack => {
                TickOutcome::Attacked(self.exchange((id, &handle), (self.player_id, &self.player), rng))
            }
        }
    }

    /// Moves enemy `id` into `to` under the same rules as its agent: the
    /// cell must be in bounds, its lock won in time and the cell empty.
    /// An unknown or dead enemy yields [`MoveOutcome::Skipped`].
    pub fn move_enemy_to(&self, id: EntityId, to: Position) -> MoveOutcome {
        let _gate = read(&self.gate);
        match read(&self.arena).enemy(id) {
            Some(handle) => self.try_move_enemy(id, &handle, to),
            None => MoveOutcome::Skipped,
        }
    }

    /// Moves an enemy into `to` if the cell is in bounds, its lock is won in
    /// time and it is still empty under the lock.
    fn try_move_enemy(&self, id: EntityId, handle: &SharedCombatant, to: Position) -> MoveOutcome {
        if !self.grid.in_bounds(to) {
            return MoveOutcome::OutOfBounds;
        }
        let Some(_cell) = self.grid.lock_cell(to, self.lock_timeout()) else {
            trace!(enemy = %id, to = %to, "cell lock contended, skipping move");
            return MoveOutcome::Contended;
        };
        if !self.grid.is_empty(to) {
            return MoveOutcome::Blocked;
        }
        let from = {
            let mut enemy = lock(handle);
            let from = enemy.position();
            if enemy.is_dead() || !matches!(self.grid.move_entity(&Occupant::Enemy(id), from, to), Ok(true)) {
                return MoveOutcome::Skipped;
            }
            enemy.set_position(to);
            from
        };
        trace!(enemy = %id, %from, %to, "enemy moved");
        self.events.record(GameEvent::EnemyMoved { enemy: id, from, to });
        self.notifier.publish();
        MoveOutcome::Moved { from, to }
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Pushes a deep copy of the current state and returns the stack depth.
    pub fn save_snapshot(&self) -> usize {
        let _gate = write(&self.gate);
        let snapshot = self.capture();
        let depth = lock(&self.snapshots).push(snapshot);
        info!(depth, "snapshot saved");
        self.events.record(GameEvent::SnapshotSaved { depth });
        depth
    }

    /// Pops the most recent snapshot and makes it the current state.
    /// Returns the remaining stack depth.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NothingToRestore`] when the stack is empty.
    pub fn restore_snapshot(&self) -> CoreResult<usize> {
        let _gate = write(&self.gate);
        let snapshot = lock(&self.snapshots)
            .pop()
            .ok_or(CoreError::NothingToRestore)?;

        let mut cells = snapshot.grid.clone();
        cells.push((
            snapshot.player.position(),
            BTreeSet::from([Occupant::Player(self.player_id)]),
        ));
        if let Err(err) = self.grid.replace_contents(cells) {
            lock(&self.snapshots).push(snapshot);
            return Err(err.into());
        }

        self.game_over.store(snapshot.player.is_dead(), Ordering::SeqCst);
        *lock(&self.player) = snapshot.player;
        {
            let mut arena = write(&self.arena);
            arena.replace_enemies(snapshot.enemies);
            arena.replace_items(snapshot.items);
            arena.replace_obstacles(snapshot.obstacles);
            arena.reserve_through(snapshot.last_id);
        }

        let depth = lock(&self.snapshots).depth();
        info!(depth, "snapshot restored");
        self.events.record(GameEvent::SnapshotRestored { depth });
        self.notifier.publish();
        Ok(depth)
    }

    /// Number of saved snapshots.
    #[must_use]
    pub fn snapshot_depth(&self) -> usize {
        lock(&self.snapshots).depth()
    }

    /// Copies the current state. Callers hold the gate for writing.
    fn capture(&self) -> Snapshot {
        let player = lock(&self.player).clone();
        let arena = read(&self.arena);
        let enemies = arena
            .enemy_handles()
            .iter()
            .map(|(_, handle)| lock(handle).clone())
            .collect();
        let grid = self
            .grid
            .occupied_cells()
            .into_iter()
            .filter_map(|(position, mut set)| {
                set.retain(|o| !o.is_player());
                (!set.is_empty()).then_some((position, set))
            })
            .collect();
        Snapshot {
            player,
            enemies,
            items: arena.items().copied().collect(),
            obstacles: arena.obstacles().collect(),
            grid,
            last_id: arena.last_id(),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn lock_timeout(&self) -> Duration {
        self.config.scheduler.lock_timeout()
    }

    fn ensure_alive(&self) -> CoreResult<()> {
        if self.is_game_over() {
            Err(CoreError::PlayerDefeated)
        } else {
            Ok(())
        }
    }

    /// Draws a private generator from the world stream so the world RNG is
    /// never held across other locks.
    fn fork_rng(&self) -> ChaCha8Rng {
        let seed: u64 = lock(&self.rng).gen();
        ChaCha8Rng::seed_from_u64(seed)
    }

    fn claim_empty_cell(&self, position: Position) -> CoreResult<warren::CellGuard<'_>> {
        let guard = self
            .grid
            .lock_cell(position, self.lock_timeout())
            .ok_or(CoreError::CellOccupied { position })?;
        if self.grid.is_empty(position) {
            Ok(guard)
        } else {
            Err(CoreError::CellOccupied { position })
        }
    }

    /// Resolves an exchange with both records locked, then applies the
    /// fallout. `None` if either side was already dead.
    fn exchange<R: Rng + ?Sized>(
        &self,
        attacker: (EntityId, &SharedCombatant),
        defender: (EntityId, &SharedCombatant),
        rng: &mut R,
    ) -> Option<ExchangeReport> {
        let (report, fallout) = {
            let (mut a, mut d) = lock_pair(attacker, defender);
            if a.is_dead() || d.is_dead() {
                return None;
            }
            let report = self.resolver.resolve(&mut a, &mut d, rng);
            if report.outcome == ExchangeOutcome::OutOfRange {
                return Some(report);
            }
            let mut fallout = Fallout {
                relocations: report.relocations.clone(),
                ..Fallout::default()
            };
            for side in [&*a, &*d] {
                if !side.is_dead() {
                    continue;
                }
                if side.is_player() {
                    fallout.player_died = true;
                } else {
                    fallout
                        .defeated
                        .push((side.id(), side.position(), side.loot().unwrap_or(0)));
                }
            }
            (report, fallout)
        };
        self.events.record(GameEvent::Exchange(report.clone()));
        self.apply_fallout(fallout);
        self.notifier.publish();
        Some(report)
    }

    fn apply_fallout(&self, fallout: Fallout) {
        for (id, position, loot) in fallout.defeated {
            self.remove_defeated(id, position, loot);
        }
        if fallout.player_died && !self.game_over.swap(true, Ordering::SeqCst) {
            info!("player defeated");
            self.events.record(GameEvent::PlayerDefeated);
        }
        for id in fallout.relocations {
            self.relocate(id);
        }
    }

    /// Takes a dead enemy off the roster and the grid and drops its loot
    /// where it fell. Only the first caller for a given enemy does anything.
    fn remove_defeated(&self, id: EntityId, position: Position, loot: u32) {
        if write(&self.arena).remove_enemy(id).is_none() {
            return;
        }
        if let Err(err) = self.grid.remove(position, &Occupant::Enemy(id)) {
            warn!(enemy = %id, %err, "defeated enemy missing from grid");
        }
        if loot > 0 {
            let item_id = {
                let mut arena = write(&self.arena);
                let item_id = arena.allocate_id();
                arena.insert_item(position, Item::new(item_id, ItemKind::Loot { points: loot }));
                item_id
            };
            if let Err(err) = self.grid.add(position, Occupant::Item(item_id)) {
                warn!(item = %item_id, %err, "could not drop loot");
            }
        }
        debug!(enemy = %id, %position, loot, "enemy defeated");
        self.events.record(GameEvent::EnemyDefeated {
            enemy: id,
            position,
            loot,
        });
    }

    /// Moves a low-health survivor to a random empty cell.
    fn relocate(&self, id: EntityId) {
        let handle = if id == self.player_id {
            std::sync::Arc::clone(&self.player)
        } else {
            let Some(handle) = read(&self.arena).enemy(id) else {
                return;
            };
            handle
        };
        let target = {
            let mut rng = lock(&self.rng);
            self.grid.random_empty_position(&mut *rng)
        };
        let target = match target {
            Ok(target) => target,
            Err(err) => {
                warn!(entity = %id, %err, "no cell to teleport to");
                return;
            }
        };
        let Some(_cell) = self.grid.lock_cell(target, self.lock_timeout()) else {
            return;
        };
        if !self.grid.is_empty(target) {
            return;
        }
        let from = {
            let mut combatant = lock(&handle);
            let from = combatant.position();
            let occupant = if combatant.is_player() {
                Occupant::Player(id)
            } else {
                Occupant::Enemy(id)
            };
            if combatant.is_dead() || !matches!(self.grid.move_entity(&occupant, from, target), Ok(true)) {
                return;
            }
            combatant.set_position(target);
            from
        };
        debug!(entity = %id, %from, to = %target, "teleported");
        self.events.record(GameEvent::Teleported {
            entity: id,
            from,
            to: target,
        });
    }

    fn record_regeneration(&self, id: EntityId, effects: &[Effect]) {
        let mut changed = false;
        for effect in effects {
            if let Effect::Regenerate { healed } = *effect {
                if healed > 0 {
                    changed = true;
                    self.events.record(GameEvent::Regenerated { entity: id, healed });
                }
            }
        }
        if changed {
            self.notifier.publish();
        }
    }
}

/// Locks two combatant records in ascending ID order and returns the guards
/// in argument order.
fn lock_pair<'a>(
    first: (EntityId, &'a SharedCombatant),
    second: (EntityId, &'a SharedCombatant),
) -> (MutexGuard<'a, Combatant>, MutexGuard<'a, Combatant>) {
    if first.0 < second.0 {
        let a = lock(first.1);
        let b = lock(second.1);
        (a, b)
    } else {
        let b = lock(second.1);
        let a = lock(first.1);
        (a, b)
    }
}
