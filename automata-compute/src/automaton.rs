//! # Automaton - The Cascade Scheduler
//!
//! Owns the cell store and drives the partition cascade:
//!
//! 1. `start_step` dispatches partition 0 onto the worker pool.
//! 2. Each partition, once its cells are evaluated, dispatches the next one
//!    from the same worker. The last one completes the step.
//! 3. `advance` joins every partition, publishes the batches, commits the
//!    store and starts the next step.
//!
//! The commit takes the store's write lock, which no worker can hold at
//! that point: every partition task has been joined. So no partition ever
//! reads `current` for step N+1 while another still writes `next` for
//! step N.
//!
//! The first step runs synchronously during construction, so visual
//! records are valid before the host's first tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::ThreadPool;
use tracing::{debug, error, info, trace};

use automata_core::{
    AutomataConfig, AutomataError, AutomataResult, CellId, CellStore, InstanceBuffers,
    MonotonicClock, StepClock, StepStats, TickMode, VisualSink,
};

use crate::cascade::{CascadeState, Transition};
use crate::engine::{PartitionReport, StepEngine};
use crate::listener::{CascadeEvent, CascadeListener};
use crate::task::{self, Completion, TaskHandle};

/// State shared with the partition tasks
struct Shared {
    engine: StepEngine,
    store: RwLock<CellStore>,
    sink: Arc<dyn VisualSink>,
    listener: Option<Arc<dyn CascadeListener>>,
    cascade: Mutex<CascadeSlot>,
    evaluated: AtomicU64,
    changed: AtomicU64,
    compute_time_us: AtomicU64,
}

struct CascadeSlot {
    state: CascadeState,
    started_at: Instant,
    /// Completions of partitions not yet dispatched this step
    pending: Vec<Option<Completion>>,
}

impl Shared {
    fn notify(&self, event: CascadeEvent) {
        if let Some(listener) = &self.listener {
            listener.on_event(event);
        }
    }

    fn record(&self, report: &PartitionReport) {
        self.evaluated.fetch_add(report.evaluated, Ordering::Relaxed);
        self.changed.fetch_add(report.changed, Ordering::Relaxed);
    }
}

/// Builder for [`Automaton`]
pub struct AutomatonBuilder {
    config: AutomataConfig,
    states: Option<Vec<bool>>,
    sink: Option<Arc<dyn VisualSink>>,
    clock: Option<Arc<dyn StepClock>>,
    listener: Option<Arc<dyn CascadeListener>>,
}

impl AutomatonBuilder {
    /// Start from explicit cell states instead of random seeding
    pub fn states(mut self, states: Vec<bool>) -> Self {
        self.states = Some(states);
        self
    }

    /// Visual output destination (default: in-memory [`InstanceBuffers`])
    pub fn sink(mut self, sink: Arc<dyn VisualSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Time source for fade scheduling (default: [`MonotonicClock`])
    pub fn clock(mut self, clock: Arc<dyn StepClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn CascadeListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Build the automaton and run its first step synchronously
    pub fn build(self) -> AutomataResult<Automaton> {
        let config = self.config;
        let engine = StepEngine::new(&config)?;
        let num_cells = engine.topology().num_cells();
        let divisions = engine.partitions().len();

        let store = match self.states {
            Some(states) if states.len() != num_cells => {
                return Err(AutomataError::config(format!(
                    "expected {} initial states, got {}",
                    num_cells,
                    states.len()
                )));
            }
            Some(states) => CellStore::from_states(&states),
            None => {
                let mut rng = match config.seeding.seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                CellStore::seeded(num_cells, config.seeding.probability, &mut rng)
            }
        };

        let (sink, buffers) = match self.sink {
            Some(sink) => (sink, None),
            None => {
                let buffers = Arc::new(InstanceBuffers::for_partitions(engine.partitions()));
                (buffers.clone() as Arc<dyn VisualSink>, Some(buffers))
            }
        };
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));

        let pool = Arc::new(task::build_pool(config.cascade.worker_threads)?);

        info!(
            "🧫 Automaton: {}x{} cells, {} clusters, {} partitions, rules {}, {} workers",
            engine.topology().x_cells(),
            engine.topology().z_cells(),
            engine.topology().num_clusters(),
            divisions,
            engine.rules(),
            pool.current_num_threads()
        );

        engine.write_initial_visuals(&store, config.initial_switch_time(), sink.as_ref());

        let shared = Arc::new(Shared {
            engine,
            store: RwLock::new(store),
            sink,
            listener: self.listener,
            cascade: Mutex::new(CascadeSlot {
                state: CascadeState::new(divisions)?,
                started_at: Instant::now(),
                pending: Vec::new(),
            }),
            evaluated: AtomicU64::new(0),
            changed: AtomicU64::new(0),
            compute_time_us: AtomicU64::new(0),
        });

        run_first_step(&shared, &pool)?;

        info!(
            "✨ Initial step evaluated synchronously ({} alive)",
            shared.store.read().population()
        );

        Ok(Automaton {
            shared,
            pool,
            handles: (0..divisions).map(|_| TaskHandle::finished()).collect(),
            published: vec![false; divisions],
            clock,
            buffers,
            step_period: config.timing.step_period,
            tick_mode: config.cascade.tick_mode,
            stagger_tick: 0,
            last_stats: StepStats::default(),
            config,
        })
    }
}

/// Parallel cascade cellular automaton
pub struct Automaton {
    shared: Arc<Shared>,
    pool: Arc<ThreadPool>,
    /// One handle per partition for the step in flight
    handles: Vec<TaskHandle>,
    /// Batches already handed to the sink this step
    published: Vec<bool>,
    clock: Arc<dyn StepClock>,
    buffers: Option<Arc<InstanceBuffers>>,
    step_period: f32,
    tick_mode: TickMode,
    /// Staggered mode: batches published so far this step
    stagger_tick: usize,
    last_stats: StepStats,
    config: AutomataConfig,
}

impl Automaton {
    pub fn builder(config: AutomataConfig) -> AutomatonBuilder {
        AutomatonBuilder {
            config,
            states: None,
            sink: None,
            clock: None,
            listener: None,
        }
    }

    /// Seeded automaton with in-memory buffers and a monotonic clock
    pub fn new(config: AutomataConfig) -> AutomataResult<Self> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &AutomataConfig {
        &self.config
    }

    pub fn engine(&self) -> &StepEngine {
        &self.shared.engine
    }

    pub fn divisions(&self) -> usize {
        self.handles.len()
    }

    pub fn num_cells(&self) -> usize {
        self.shared.engine.topology().num_cells()
    }

    /// Built-in buffers, when no sink was supplied
    pub fn instance_buffers(&self) -> Option<&Arc<InstanceBuffers>> {
        self.buffers.as_ref()
    }

    /// Step currently being evaluated (or evaluated and awaiting commit)
    pub fn step(&self) -> u64 {
        self.shared.cascade.lock().state.step()
    }

    /// Statistics of the last committed step
    pub fn stats(&self) -> &StepStats {
        &self.last_stats
    }

    /// Number of live cells in the committed state
    pub fn population(&self) -> usize {
        self.shared.store.read().population()
    }

    /// Committed state of a cell
    pub fn cell(&self, cell: CellId) -> AutomataResult<bool> {
        self.check_cell(cell)?;
        Ok(self.shared.store.read().read(cell))
    }

    /// Copy of every committed state
    pub fn current_states(&self) -> Vec<bool> {
        self.shared.store.read().current_states()
    }

    /// Host tick entry point
    ///
    /// Returns the committed step's statistics when the tick completed a step.
    pub fn tick(&mut self) -> AutomataResult<Option<StepStats>> {
        match self.tick_mode {
            TickMode::PerStep => self.advance().map(Some),
            TickMode::Staggered => {
                if self.stagger_tick < self.divisions() {
                    let batch = self.stagger_tick;
                    self.handles[batch].join();
                    self.publish(batch);
                    self.stagger_tick += 1;
                    Ok(None)
                } else {
                    self.advance().map(Some)
                }
            }
        }
    }

    /// Join the cascade, publish, commit, and start the next step
    pub fn advance(&mut self) -> AutomataResult<StepStats> {
        self.join_step()?;

        for batch in 0..self.divisions() {
            self.publish(batch);
        }

        let step = self.step();
        let evaluated = self.shared.evaluated.load(Ordering::Relaxed);
        let stats = StepStats {
            step,
            cells_evaluated: evaluated,
            cells_skipped: self.num_cells() as u64 - evaluated,
            cells_changed: self.shared.changed.load(Ordering::Relaxed),
            compute_time_us: self.shared.compute_time_us.load(Ordering::Relaxed),
        };

        self.shared.store.write().commit();
        self.shared.notify(CascadeEvent::Committed(step));
        debug!(
            step,
            evaluated = stats.cells_evaluated,
            skipped = stats.cells_skipped,
            changed = stats.cells_changed,
            compute_us = stats.compute_time_us,
            "step committed"
        );

        self.last_stats = stats.clone();
        self.start_step()?;
        Ok(stats)
    }

    /// Override a cell's state for the pending commit
    ///
    /// Waits for the running cascade first. The cell and its neighbors are
    /// marked dirty so the following step re-evaluates around the edit.
    pub fn set_cell(&mut self, cell: CellId, alive: bool) -> AutomataResult<()> {
        self.check_cell(cell)?;
        self.join_step()?;

        let next_step_time = self.shared.cascade.lock().state.next_step_time();
        let engine = &self.shared.engine;
        let store = self.shared.store.read();

        store.stage(cell, alive);
        store.mark_changed(cell);
        for &n in engine.topology().neighbors_of(cell) {
            store.mark_neighborhood_changed(n);
        }

        if let Some((partition, position)) = engine.partitions().locate(cell) {
            engine.write_visual(
                &store,
                partition,
                position,
                cell,
                next_step_time,
                self.shared.sink.as_ref(),
            );
            self.published[partition] = false;
        }
        Ok(())
    }

    /// Block until every partition of the current step has finished
    pub fn join(&self) {
        for handle in &self.handles {
            handle.join();
        }
    }

    fn join_step(&self) -> AutomataResult<()> {
        self.join();
        let slot = self.shared.cascade.lock();
        if slot.state.is_step_complete() {
            Ok(())
        } else {
            Err(AutomataError::transition(slot.state.phase(), "advance"))
        }
    }

    fn publish(&mut self, batch: usize) {
        if !self.published[batch] {
            self.shared.sink.publish(batch);
            self.published[batch] = true;
            self.shared.notify(CascadeEvent::BatchPublished(batch));
        }
    }

    fn start_step(&mut self) -> AutomataResult<()> {
        // f32 for the visual record; see `StepClock` on precision
        let next_step_time = (self.clock.now() + self.step_period as f64) as f32;
        let divisions = self.divisions();

        let (handles, mut pending): (Vec<_>, Vec<_>) = (0..divisions)
            .map(|_| {
                let (handle, completion) = TaskHandle::pending();
                (handle, Some(completion))
            })
            .unzip();

        self.shared.evaluated.store(0, Ordering::Relaxed);
        self.shared.changed.store(0, Ordering::Relaxed);

        let mut slot = self.shared.cascade.lock();
        let transition = slot.state.start_step(next_step_time)?;
        let step = slot.state.step();
        let first = match transition {
            Transition::Dispatch(first) => pending[first].take(),
            Transition::Complete => None,
        };
        slot.pending = pending;
        slot.started_at = Instant::now();
        drop(slot);

        self.handles = handles;
        self.published = vec![false; divisions];
        self.stagger_tick = 0;

        self.shared.notify(CascadeEvent::StepStarted(step));
        if let (Transition::Dispatch(index), Some(completion)) = (transition, first) {
            dispatch(&self.shared, &self.pool, index, next_step_time, completion);
        }
        Ok(())
    }
}

impl Drop for Automaton {
    fn drop(&mut self) {
        self.join();
    }
}

impl std::fmt::Debug for Automaton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Automaton")
            .field("cells", &self.num_cells())
            .field("divisions", &self.divisions())
            .field("tick_mode", &self.tick_mode)
            .field("last_stats", &self.last_stats)
            .finish()
    }
}

impl Automaton {
    fn check_cell(&self, cell: CellId) -> AutomataResult<()> {
        let num_cells = self.num_cells();
        if cell < num_cells {
            Ok(())
        } else {
            Err(AutomataError::InvalidCell { cell, num_cells })
        }
    }
}

/// Step 0: the whole cascade on the calling thread, `next_step_time = 0`
fn run_first_step(shared: &Shared, pool: &ThreadPool) -> AutomataResult<()> {
    let started = Instant::now();
    let mut slot = shared.cascade.lock();
    let mut transition = slot.state.start_step(0.0)?;
    shared.notify(CascadeEvent::StepStarted(slot.state.step()));

    let store = shared.store.read();
    while let Transition::Dispatch(index) = transition {
        shared.notify(CascadeEvent::PartitionStarted(index));
        let report = pool.install(|| {
            shared
                .engine
                .evaluate_partition(&store, index, 0.0, shared.sink.as_ref())
        });
        shared.record(&report);
        shared.notify(CascadeEvent::PartitionFinished(index));
        transition = slot.state.partition_finished(index)?;
    }

    shared
        .compute_time_us
        .store(started.elapsed().as_micros() as u64, Ordering::Relaxed);
    Ok(())
}

fn dispatch(
    shared: &Arc<Shared>,
    pool: &Arc<ThreadPool>,
    index: usize,
    next_step_time: f32,
    completion: Completion,
) {
    trace!(partition = index, "dispatch");
    let (s, p) = (shared.clone(), pool.clone());
    task::spawn_with(pool, completion, move || {
        run_partition(s, p, index, next_step_time)
    });
}

/// Body of a partition task: evaluate, then continue the cascade
fn run_partition(shared: Arc<Shared>, pool: Arc<ThreadPool>, index: usize, next_step_time: f32) {
    shared.notify(CascadeEvent::PartitionStarted(index));
    let report = {
        let store = shared.store.read();
        shared
            .engine
            .evaluate_partition(&store, index, next_step_time, shared.sink.as_ref())
    };
    shared.record(&report);
    trace!(
        partition = index,
        evaluated = report.evaluated,
        changed = report.changed,
        "partition finished"
    );
    shared.notify(CascadeEvent::PartitionFinished(index));

    let mut slot = shared.cascade.lock();
    match slot.state.partition_finished(index) {
        Ok(Transition::Dispatch(next)) => {
            let completion = slot.pending.get_mut(next).and_then(Option::take);
            drop(slot);
            match completion {
                Some(completion) => dispatch(&shared, &pool, next, next_step_time, completion),
                None => error!(partition = next, "partition has no pending handle"),
            }
        }
        Ok(Transition::Complete) => {
            shared.compute_time_us.store(
                slot.started_at.elapsed().as_micros() as u64,
                Ordering::Relaxed,
            );
        }
        Err(e) => {
            // Release every waiter; the host sees the broken step on join.
            error!("Cascade stalled: {}", e);
            slot.pending.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use automata_core::ManualClock;

    fn small(divisions: usize) -> AutomataConfig {
        let mut config = AutomataConfig::small(4, 3, divisions);
        config.grid.x_cells_per_cluster = 2;
        config.grid.z_cells_per_cluster = 2;
        config.cascade.worker_threads = 2;
        config
    }

    #[test]
    fn test_new_runs_first_step() {
        let automaton = Automaton::new(small(2)).unwrap();
        assert_eq!(automaton.step(), 0);
        assert_eq!(automaton.num_cells(), 48);
        assert_eq!(automaton.divisions(), 2);
        assert!(automaton.instance_buffers().is_some());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = small(2);
        config.cascade.divisions = 0;
        assert!(Automaton::new(config).is_err());
    }

    #[test]
    fn test_wrong_state_count_rejected() {
        let result = Automaton::builder(small(2)).states(vec![true; 3]).build();
        assert!(matches!(result, Err(AutomataError::Config(_))));
    }

    #[test]
    fn test_advance_counts_steps() {
        let mut automaton = Automaton::new(small(3)).unwrap();
        let first = automaton.advance().unwrap();
        assert_eq!(first.step, 0);
        assert_eq!(first.cells_evaluated, 48);
        assert_eq!(first.cells_skipped, 0);

        let second = automaton.advance().unwrap();
        assert_eq!(second.step, 1);
        assert_eq!(second.cells_evaluated + second.cells_skipped, 48);
        assert_eq!(automaton.stats(), &second);
    }

    #[test]
    fn test_next_step_time_follows_clock() {
        let clock = Arc::new(ManualClock::new(10.0));
        let mut config = small(1);
        config.timing.step_period = 0.5;
        let mut automaton = Automaton::builder(config)
            .clock(clock.clone())
            .build()
            .unwrap();

        automaton.advance().unwrap();
        automaton.join();
        assert_eq!(automaton.shared.cascade.lock().state.next_step_time(), 10.5);

        clock.set(20.0);
        automaton.advance().unwrap();
        automaton.join();
        assert_eq!(automaton.shared.cascade.lock().state.next_step_time(), 20.5);
    }

    #[test]
    fn test_set_cell_out_of_range() {
        let mut automaton = Automaton::new(small(2)).unwrap();
        assert!(matches!(
            automaton.set_cell(48, true),
            Err(AutomataError::InvalidCell { cell: 48, num_cells: 48 })
        ));
        assert!(automaton.cell(100).is_err());
    }
}
