//! Agent scheduler: one recurring task per enemy on a shared thread pool.
//!
//! A dedicated driver thread waits on a `crossbeam_channel::tick` and, on
//! each tick, fans the live agent tasks out onto a `rayon` pool with
//! [`rayon::ThreadPool::scope`]. The scope joins every task before the next
//! tick is taken, so a task never overlaps with itself while tasks for
//! different enemies run in parallel with each other and with the foreground
//! action path.
//!
//! # Tick
//!
//! 1. Reconcile the task table with the world roster: enemies that appeared
//!    get a task, enemies that left lose theirs.
//! 2. Run the player's periodic modifiers.
//! 3. Run every task whose running flag is set.
//!
//! # Cancellation
//!
//! Cancellation is cooperative. [`AgentScheduler::stop_task`] clears one
//! task's flag and drops it from the table; [`AgentScheduler::stop`] clears
//! every flag, wakes the driver and joins it. A task already inside a move
//! finishes that move (it waits at most the cell lock timeout), so stopping
//! never leaves a half-applied move and never waits on a lock indefinitely.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use delve_core::config::WorldConfig;
//! use delve_core::scheduler::AgentScheduler;
//! use delve_core::world::World;
//!
//! let mut config = WorldConfig::default();
//! config.scheduler.period_ms = 10;
//! let world = Arc::new(World::new(config).unwrap());
//!
//! let mut scheduler = AgentScheduler::start(Arc::clone(&world)).unwrap();
//! std::thread::sleep(Duration::from_millis(50));
//! scheduler.stop();
//! assert!(!scheduler.is_running());
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use rand_chacha::ChaCha8Rng;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, trace, warn};

use crate::agent::{agent_rng, TickOutcome};
use crate::config::SchedulerConfig;
use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use crate::sync::lock;
use crate::world::World;

/// The recurring unit of work driving one enemy.
#[derive(Debug)]
pub struct AgentTask {
    enemy: EntityId,
    running: AtomicBool,
    rng: Mutex<ChaCha8Rng>,
}

impl AgentTask {
    /// Creates a running task with the enemy's private random stream.
    #[must_use]
    pub fn new(enemy: EntityId, seed: u64) -> Self {
        Self {
            enemy,
            running: AtomicBool::new(true),
            rng: Mutex::new(agent_rng(seed, enemy)),
        }
    }

    /// The enemy this task drives.
    #[must_use]
    pub fn enemy(&self) -> EntityId {
        self.enemy
    }

    /// Returns `true` until the task is stopped.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Clears the running flag. The next invocation does nothing.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// One invocation: does nothing once stopped, otherwise steps the agent.
    pub fn run(&self, world: &World) -> TickOutcome {
        if !self.is_running() {
            return TickOutcome::Idle;
        }
        let mut rng = lock(&self.rng);
        world.step_agent(self.enemy, &mut *rng, world.elapsed())
    }
}

/// State shared between the scheduler handle and its driver thread.
struct Shared {
    world: Arc<World>,
    pool: ThreadPool,
    tasks: Mutex<BTreeMap<EntityId, Arc<AgentTask>>>,
    cancelled: Mutex<BTreeSet<EntityId>>,
    running: AtomicBool,
    ticks: AtomicU64,
    seed: u64,
}

impl Shared {
    fn tick(&self) {
        if !self.running.load(Ordering::Acquire) {
            return;
        }
        let tasks = self.reconcile();
        self.world.update(self.world.elapsed());
        let world = &*self.world;
        self.pool.scope(|scope| {
            for task in &tasks {
                scope.spawn(move |_| {
                    let outcome = task.run(world);
                    trace!(enemy = %task.enemy(), ?outcome, "agent tick");
                });
            }
        });
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Brings the task table in line with the roster and returns the tasks
    /// to run this tick.
    fn reconcile(&self) -> Vec<Arc<AgentTask>> {
        let roster: BTreeSet<EntityId> = self.world.enemy_ids().into_iter().collect();
        let cancelled = lock(&self.cancelled);
        let mut tasks = lock(&self.tasks);
        tasks.retain(|id, task| {
            let keep = roster.contains(id);
            if !keep {
                task.stop();
                debug!(enemy = %id, "agent task retired");
            }
            keep
        });
        for id in roster.difference(&cancelled) {
            tasks
                .entry(*id)
                .or_insert_with(|| Arc::new(AgentTask::new(*id, self.seed)));
        }
        tasks.values().filter(|t| t.is_running()).cloned().collect()
    }
}

/// Handle to a running scheduler. Dropping it stops the scheduler.
pub struct AgentScheduler {
    shared: Arc<Shared>,
    stop_tx: Option<Sender<()>>,
    driver: Option<JoinHandle<()>>,
}

impl AgentScheduler {
    /// Starts driving every enemy of `world` with the world's scheduler
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SchedulerStart`] if the pool or driver thread
    /// cannot be created.
    pub fn start(world: Arc<World>) -> CoreResult<Self> {
        let config = world.config().scheduler.clone();
        Self::start_with(world, &config)
    }

    /// Starts with an explicit configuration for period and pool size.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SchedulerStart`] if the pool or driver thread
    /// cannot be created.
    pub fn start_with(world: Arc<World>, config: &SchedulerConfig) -> CoreResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.threads.max(1))
            .thread_name(|index| format!("agent-{index}"))
            .build()
            .map_err(|err| CoreError::SchedulerStart(err.to_string()))?;
        let seed = world.config().seed;
        let shared = Arc::new(Shared {
            world,
            pool,
            tasks: Mutex::new(BTreeMap::new()),
            cancelled: Mutex::new(BTreeSet::new()),
            running: AtomicBool::new(true),
            ticks: AtomicU64::new(0),
            seed,
        });
        shared.reconcile();

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let period = config.period();
        let driver_shared = Arc::clone(&shared);
        let driver = thread::Builder::new()
            .name("agent-scheduler".to_string())
            .spawn(move || drive(&driver_shared, &stop_rx, tick(period)))
            .map_err(|err| CoreError::SchedulerStart(err.to_string()))?;

        info!(
            period_ms = config.period_ms,
            threads = config.threads,
            agents = lock(&shared.tasks).len(),
            "agent scheduler started"
        );
        Ok(Self {
            shared,
            stop_tx: Some(stop_tx),
            driver: Some(driver),
        })
    }

    /// Stops the task for `enemy`. Returns `false` if it had none.
    ///
    /// The enemy is not given a new task while this scheduler runs.
    pub fn stop_task(&self, enemy: EntityId) -> bool {
        lock(&self.shared.cancelled).insert(enemy);
        match lock(&self.shared.tasks).remove(&enemy) {
            Some(task) => {
                task.stop();
                debug!(enemy = %enemy, "agent task stopped");
                true
            }
            None => false,
        }
    }

    /// IDs of enemies with a live task.
    #[must_use]
    pub fn active_tasks(&self) -> Vec<EntityId> {
        lock(&self.shared.tasks)
            .values()
            .filter(|t| t.is_running())
            .map(|t| t.enemy())
            .collect()
    }

    /// Ticks completed so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::Relaxed)
    }

    /// Returns `true` until [`AgentScheduler::stop`] is called.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Cancels every task and joins the driver. Idempotent.
    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        for task in lock(&self.shared.tasks).values() {
            task.stop();
        }
        if let Some(tx) = self.stop_tx.take() {
            // A full channel or a finished driver both mean it will exit.
            let _ = tx.try_send(());
        }
        if let Some(driver) = self.driver.take() {
            if driver.join().is_err() {
                warn!("agent scheduler driver panicked");
            }
            info!(ticks = self.ticks(), "agent scheduler stopped");
        }
    }
}

impl Drop for AgentScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for AgentScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentScheduler")
            .field("running", &self.is_running())
            .field("ticks", &self.ticks())
            .finish_non_exhaustive()
    }
}

fn drive(shared: &Shared, stop_rx: &Receiver<()>, ticker: Receiver<std::time::Instant>) {
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(ticker) -> _ => {
                if !shared.running.load(Ordering::Acquire) {
                    break;
                }
                shared.tick();
            }
        }
    }
}
