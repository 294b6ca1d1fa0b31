//! # Step Engine
//!
//! Evaluates the rule for one partition at a time, data-parallel over the
//! partition's cells with Rayon.
//!
//! ## Incremental evaluation
//!
//! A cell is only evaluated when it flipped last step or one of its
//! neighbors did. The rule is a pure function of the cell's own state and
//! its live-neighbor count, so a clean cell would reproduce its staged
//! state and is skipped.
//!
//! ## Concurrency
//!
//! During a step cells read only `current`, and each cell writes only its
//! own `next` bit and visual record. Neighbor dirty marks may land in
//! another partition's cells; they are idempotent atomic ORs.

use rayon::prelude::*;

use automata_core::{
    AutomataConfig, AutomataResult, CellId, CellStore, GridTopology, PartitionSet, RuleTable,
    SlotRole, VisualSink, STAYS_ON,
};

/// Outcome of evaluating one partition
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PartitionReport {
    pub partition: usize,
    /// Cells in the partition
    pub cells: u64,
    /// Cells that passed the dirty check
    pub evaluated: u64,
    /// Cells whose staged state differs from their current state
    pub changed: u64,
}

impl PartitionReport {
    pub fn skipped(&self) -> u64 {
        self.cells - self.evaluated
    }
}

/// Immutable evaluation context shared by every worker
#[derive(Clone, Debug)]
pub struct StepEngine {
    topology: GridTopology,
    rules: RuleTable,
    partitions: PartitionSet,
}

impl StepEngine {
    /// Build topology, rules and partitions from a validated config
    pub fn new(config: &AutomataConfig) -> AutomataResult<Self> {
        config.validate()?;
        let topology = GridTopology::new(&config.grid)?;
        let rules = RuleTable::from_config(&config.rules);
        Self::from_parts(topology, rules, config.cascade.divisions)
    }

    pub fn from_parts(
        topology: GridTopology,
        rules: RuleTable,
        divisions: usize,
    ) -> AutomataResult<Self> {
        let partitions = PartitionSet::new(&topology, divisions)?;
        Ok(Self {
            topology,
            rules,
            partitions,
        })
    }

    pub fn topology(&self) -> &GridTopology {
        &self.topology
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn partitions(&self) -> &PartitionSet {
        &self.partitions
    }

    /// Live cells among the 8 neighbors
    #[inline]
    pub fn alive_neighbors(&self, store: &CellStore, cell: CellId) -> usize {
        self.topology
            .neighbors_of(cell)
            .iter()
            .filter(|&&n| store.read(n))
            .count()
    }

    /// What the rule says the cell becomes, ignoring dirty flags
    #[inline]
    pub fn force_next_state(&self, store: &CellStore, cell: CellId) -> bool {
        self.rules
            .next_state(store.read(cell), self.alive_neighbors(store, cell))
    }

    /// Stage a cell's next state and propagate dirtiness
    ///
    /// Returns whether the cell flips.
    pub fn apply_rules(&self, store: &CellStore, cell: CellId) -> bool {
        let next = self.force_next_state(store, cell);
        store.stage(cell, next);

        let flips = next != store.read(cell);
        if flips {
            store.mark_changed(cell);
            for &n in self.topology.neighbors_of(cell) {
                store.mark_neighborhood_changed(n);
            }
        }
        flips
    }

    /// Evaluate every dirty cell of a partition and write its visual record
    ///
    /// Must run inside the worker pool for the cells to spread over it.
    pub fn evaluate_partition(
        &self,
        store: &CellStore,
        index: usize,
        next_step_time: f32,
        sink: &dyn VisualSink,
    ) -> PartitionReport {
        let partition = &self.partitions[index];

        let (evaluated, changed) = partition
            .cells()
            .par_iter()
            .enumerate()
            .filter(|(_, &cell)| store.is_dirty(cell))
            .map(|(position, &cell)| {
                let flips = self.apply_rules(store, cell);
                self.write_visual(store, index, position, cell, next_step_time, sink);
                (1u64, flips as u64)
            })
            .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1));

        PartitionReport {
            partition: index,
            cells: partition.len() as u64,
            evaluated,
            changed,
        }
    }

    /// Refresh a cell's visual record from its current and staged state
    ///
    /// The switch-off time becomes `STAYS_ON` for a cell alive next step and
    /// `next_step_time` for a cell about to die. A cell that stays dead keeps
    /// its old switch-off time so its fade carries on.
    pub fn write_visual(
        &self,
        store: &CellStore,
        partition: usize,
        position: usize,
        cell: CellId,
        next_step_time: f32,
        sink: &dyn VisualSink,
    ) {
        let p = &self.partitions[partition];
        let alive = store.read(cell);
        let next = store.next_state(cell);

        sink.write(p.slot(position, SlotRole::Current), alive as u8 as f32);
        sink.write(p.slot(position, SlotRole::Next), next as u8 as f32);
        if next {
            sink.write(p.slot(position, SlotRole::SwitchOffTime), STAYS_ON);
        } else if alive {
            sink.write(p.slot(position, SlotRole::SwitchOffTime), next_step_time);
        }
    }

    /// Write every cell's record once, before the first step
    pub fn write_initial_visuals(
        &self,
        store: &CellStore,
        initial_switch_time: f32,
        sink: &dyn VisualSink,
    ) {
        for partition in self.partitions.iter() {
            partition
                .cells()
                .par_iter()
                .enumerate()
                .for_each(|(position, &cell)| {
                    let state = store.read(cell) as u8 as f32;
                    sink.write(partition.slot(position, SlotRole::Current), state);
                    sink.write(partition.slot(position, SlotRole::Next), state);
                    sink.write(
                        partition.slot(position, SlotRole::SwitchOffTime),
                        initial_switch_time,
                    );
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use automata_core::config::GridConfig;
    use automata_core::{InstanceBuffers, SlotHandle};

    fn engine(xc: usize, zc: usize, birth: &str, survive: &str, divisions: usize) -> StepEngine {
        let topology = GridTopology::new(&GridConfig {
            x_clusters: xc,
            z_clusters: zc,
            x_cells_per_cluster: 1,
            z_cells_per_cluster: 1,
        })
        .unwrap();
        StepEngine::from_parts(topology, RuleTable::from_strings(birth, survive), divisions)
            .unwrap()
    }

    fn run_step(engine: &StepEngine, store: &mut CellStore, sink: &InstanceBuffers, t: f32) {
        for i in 0..engine.partitions().len() {
            engine.evaluate_partition(store, i, t, sink);
        }
        store.commit();
    }

    /// Store whose "this step" flags are clear while every cell is still dirty
    fn settled(states: &[bool]) -> CellStore {
        let mut store = CellStore::from_states(states);
        for (c, &alive) in states.iter().enumerate() {
            store.stage(c, alive);
        }
        store.commit();
        store
    }

    /// Reference implementation: evaluate every cell from scratch
    fn naive_step(engine: &StepEngine, states: &[bool]) -> Vec<bool> {
        let store = CellStore::from_states(states);
        (0..states.len())
            .map(|c| engine.force_next_state(&store, c))
            .collect()
    }

    #[test]
    fn test_center_is_born_with_three_neighbors() {
        // 3x3 torus: on a grid this small every cell neighbors every other
        let engine = engine(3, 3, "3", "23", 1);
        let mut states = vec![false; 9];
        states[0] = true;
        states[1] = true;
        states[2] = true;
        let mut store = CellStore::from_states(&states);
        let sink = InstanceBuffers::for_partitions(engine.partitions());

        assert_eq!(engine.alive_neighbors(&store, 4), 3);
        let report = engine.evaluate_partition(&store, 0, 0.0, &sink);
        assert_eq!(report.evaluated, 9);
        store.commit();

        assert!(store.read(4), "center should be born");
        // the three live cells each see only 2 live neighbors and survive
        assert!(store.read(0) && store.read(1) && store.read(2));
        // every dead cell sees 3 live neighbors on the 3x3 torus
        assert_eq!(store.population(), 9);
    }

    #[test]
    fn test_all_alive_torus_dies() {
        let engine = engine(3, 3, "3", "23", 1);
        let mut store = CellStore::from_states(&[true; 9]);
        let sink = InstanceBuffers::for_partitions(engine.partitions());
        run_step(&engine, &mut store, &sink, 0.0);
        assert_eq!(store.population(), 0);
    }

    #[test]
    fn test_rule_determinism() {
        let engine = engine(5, 4, "3", "23", 2);
        let states: Vec<bool> = (0..20).map(|i| i % 3 == 0).collect();
        let store = CellStore::from_states(&states);
        let first: Vec<bool> = (0..20).map(|c| engine.force_next_state(&store, c)).collect();
        let second: Vec<bool> = (0..20).map(|c| engine.force_next_state(&store, c)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_dirty_flag_soundness() {
        let engine = engine(8, 8, "3", "23", 3);
        let states: Vec<bool> = (0..64).map(|i| (i * 7 + i / 8) % 5 < 2).collect();
        let mut store = CellStore::from_states(&states);
        let sink = InstanceBuffers::for_partitions(engine.partitions());

        for _ in 0..12 {
            run_step(&engine, &mut store, &sink, 0.0);
            for c in 0..64 {
                if !store.is_dirty(c) {
                    assert_eq!(
                        engine.force_next_state(&store, c),
                        store.read(c),
                        "clean cell {} would change",
                        c
                    );
                }
            }
        }
    }

    #[test]
    fn test_dirtiness_propagates_to_neighbors() {
        let engine = engine(6, 6, "3", "23", 2);
        // blinker
        let mut states = vec![false; 36];
        for x in 1..4 {
            states[2 * 6 + x] = true;
        }
        let store = settled(&states);
        let sink = InstanceBuffers::for_partitions(engine.partitions());
        for i in 0..2 {
            engine.evaluate_partition(&store, i, 0.0, &sink);
        }

        let flipped: Vec<CellId> = (0..36)
            .filter(|&c| store.next_state(c) != store.read(c))
            .collect();
        assert_eq!(flipped.len(), 4);
        for c in flipped {
            assert!(store.changed_this_step(c));
            for &n in engine.topology().neighbors_of(c) {
                assert!(store.neighborhood_changed_this_step(n));
            }
        }
        // far corner is untouched
        assert!(!store.changed_this_step(35));
        assert!(!store.neighborhood_changed_this_step(35));
    }

    #[test]
    fn test_incremental_matches_naive() {
        let engine = engine(7, 5, "36", "23", 4);
        let mut expected: Vec<bool> = (0..35).map(|i| (i * 13) % 7 < 3).collect();
        let mut store = CellStore::from_states(&expected);
        let sink = InstanceBuffers::for_partitions(engine.partitions());

        for step in 0..20 {
            run_step(&engine, &mut store, &sink, step as f32);
            expected = naive_step(&engine, &expected);
            assert_eq!(store.current_states(), expected, "step {}", step);
        }
    }

    #[test]
    fn test_dead_grid_without_births_stays_dead() {
        let engine = engine(4, 4, "", "23", 2);
        let mut store = CellStore::from_states(&[false; 16]);
        let sink = InstanceBuffers::for_partitions(engine.partitions());
        for _ in 0..5 {
            run_step(&engine, &mut store, &sink, 0.0);
            assert_eq!(store.population(), 0);
        }
        // nothing flipped, so nothing is left to evaluate
        let report = engine.evaluate_partition(&store, 0, 0.0, &sink);
        assert_eq!(report.evaluated, 0);
        assert_eq!(report.skipped(), report.cells);
    }

    #[test]
    fn test_visual_switch_off_times() {
        let engine = engine(3, 3, "3", "23", 1);
        // row of three: survivors see 2 neighbors, dead cells see 3
        let mut states = vec![false; 9];
        states[0] = true;
        states[1] = true;
        states[2] = true;
        let store = CellStore::from_states(&states);
        let sink = InstanceBuffers::for_partitions(engine.partitions());
        engine.write_initial_visuals(&store, -20.0, &sink);

        let p = &engine.partitions()[0];
        let pos = |cell: CellId| p.cells().iter().position(|&c| c == cell).unwrap();
        let off = |cell: CellId| sink.read(p.slot(pos(cell), SlotRole::SwitchOffTime));

        assert_eq!(off(0), -20.0);
        assert_eq!(sink.read(p.slot(pos(0), SlotRole::Current)), 1.0);

        engine.evaluate_partition(&store, 0, 5.0, &sink);
        // every cell is alive next step on the 3x3 torus
        for c in 0..9 {
            assert_eq!(off(c), STAYS_ON);
            assert_eq!(sink.read(p.slot(pos(c), SlotRole::Next)), 1.0);
        }
    }

    #[test]
    fn test_dying_cell_records_next_step_time() {
        let engine = engine(4, 4, "3", "23", 1);
        // a lone cell dies of loneliness
        let mut states = vec![false; 16];
        states[5] = true;
        let store = CellStore::from_states(&states);
        let sink = InstanceBuffers::for_partitions(engine.partitions());
        engine.write_initial_visuals(&store, -20.0, &sink);
        engine.evaluate_partition(&store, 0, 7.5, &sink);

        let p = &engine.partitions()[0];
        let pos = p.cells().iter().position(|&c| c == 5).unwrap();
        assert_eq!(sink.read(p.slot(pos, SlotRole::SwitchOffTime)), 7.5);
        // a cell that stays dead keeps its old fade time
        let dead = p.cells().iter().position(|&c| c == 15).unwrap();
        assert_eq!(sink.read(p.slot(dead, SlotRole::SwitchOffTime)), -20.0);
        assert_eq!(
            sink.read(SlotHandle {
                buffer: 0,
                offset: pos * 3 + 1
            }),
            0.0
        );
    }
}
