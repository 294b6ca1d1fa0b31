//! # Cell State Store
//!
//! Double-buffered cell state plus the dirty flags that drive incremental
//! evaluation.
//!
//! Per cell:
//! - `current` / `next`: committed state and the state staged this step
//! - `changed_*`: the cell's own state flipped
//! - `neighborhood_changed_*`: some neighbor's state flipped
//!
//! During a step, `current` and the `*_last` flags are only read, `next`
//! and the `*_this` flags are only written. [`CellStore::commit`] takes
//! `&mut self`, so it cannot overlap a running step.

use rand::Rng;

use crate::bitset::AtomicBitSet;
use crate::CellId;

/// Struct-of-arrays cell state, one bit per cell per array
#[derive(Clone, Debug)]
pub struct CellStore {
    current: AtomicBitSet,
    next: AtomicBitSet,
    changed_last: AtomicBitSet,
    changed_this: AtomicBitSet,
    neighborhood_changed_last: AtomicBitSet,
    neighborhood_changed_this: AtomicBitSet,
}

impl CellStore {
    /// Store with the given current states
    ///
    /// `next` and every changed flag start set, so the first evaluation
    /// treats all cells as dirty.
    pub fn from_states(states: &[bool]) -> Self {
        let len = states.len();
        Self {
            current: AtomicBitSet::from_bools(states),
            next: AtomicBitSet::new(len, true),
            changed_last: AtomicBitSet::new(len, true),
            changed_this: AtomicBitSet::new(len, true),
            neighborhood_changed_last: AtomicBitSet::new(len, true),
            neighborhood_changed_this: AtomicBitSet::new(len, true),
        }
    }

    /// Store where every cell is independently alive with `probability`
    pub fn seeded<R: Rng + ?Sized>(num_cells: usize, probability: f32, rng: &mut R) -> Self {
        let states: Vec<bool> = (0..num_cells)
            .map(|_| rng.gen::<f32>() < probability)
            .collect();
        Self::from_states(&states)
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Committed state of a cell
    #[inline]
    pub fn read(&self, cell: CellId) -> bool {
        self.current.get(cell)
    }

    /// Staged state of a cell
    #[inline]
    pub fn next_state(&self, cell: CellId) -> bool {
        self.next.get(cell)
    }

    /// Stage a cell's next state
    #[inline]
    pub fn stage(&self, cell: CellId, alive: bool) {
        self.next.assign(cell, alive);
    }

    #[inline]
    pub fn mark_changed(&self, cell: CellId) {
        self.changed_this.set(cell);
    }

    #[inline]
    pub fn mark_neighborhood_changed(&self, cell: CellId) {
        self.neighborhood_changed_this.set(cell);
    }

    #[inline]
    pub fn changed_last_step(&self, cell: CellId) -> bool {
        self.changed_last.get(cell)
    }

    #[inline]
    pub fn neighborhood_changed_last_step(&self, cell: CellId) -> bool {
        self.neighborhood_changed_last.get(cell)
    }

    #[inline]
    pub fn changed_this_step(&self, cell: CellId) -> bool {
        self.changed_this.get(cell)
    }

    #[inline]
    pub fn neighborhood_changed_this_step(&self, cell: CellId) -> bool {
        self.neighborhood_changed_this.get(cell)
    }

    /// Whether a cell must be re-evaluated this step
    ///
    /// A cell whose own state and neighborhood were both stable last step
    /// would reproduce its previous outcome.
    #[inline]
    pub fn is_dirty(&self, cell: CellId) -> bool {
        self.changed_last.get(cell) || self.neighborhood_changed_last.get(cell)
    }

    /// Number of dirty cells for the coming evaluation
    pub fn dirty_count(&self) -> usize {
        (0..self.len()).filter(|&c| self.is_dirty(c)).count()
    }

    /// Shift the step: `current <- next`, `*_last <- *_this`, clear `*_this`
    ///
    /// Idempotent on `current`: a second call without an evaluation in
    /// between copies the same `next` again.
    pub fn commit(&mut self) {
        self.current.copy_from(&self.next);
        self.changed_last.copy_from(&self.changed_this);
        self.changed_this.fill(false);
        self.neighborhood_changed_last.copy_from(&self.neighborhood_changed_this);
        self.neighborhood_changed_this.fill(false);
    }

    /// Number of live cells
    pub fn population(&self) -> usize {
        self.current.count_ones()
    }

    /// Copy of the committed states
    pub fn current_states(&self) -> Vec<bool> {
        self.current.to_bools()
    }

    /// Copy of the staged states
    pub fn next_states(&self) -> Vec<bool> {
        self.next.to_bools()
    }
}
