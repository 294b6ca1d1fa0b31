//! # Automata Core
//!
//! Data model for the cascade automaton - a Life-like cellular automaton
//! on a toroidal grid, stepped in partitions so that visual output can be
//! published one batch at a time.
//!
//! This crate provides the fundamental building blocks:
//! - **Topology**: Cell IDs, clusters and precomputed Moore neighborhoods
//! - **Rules**: Birth/survival lookup tables parsed from rule strings
//! - **State**: Double-buffered cell state plus dirty-flag bitsets
//! - **Partition**: Contiguous cluster ranges, one per cascade slot
//! - **Visual**: Output slot layout and the sink the renderer provides
//!
//! ## Memory Layout
//!
//! Everything is struct-of-arrays indexed by integer cell ID. Topology,
//! rules and partitions are immutable after construction; only the state
//! bitsets and the visual sink change while the automaton runs.

pub mod bitset;
pub mod clock;
pub mod config;
pub mod error;
pub mod partition;
pub mod rules;
pub mod state;
pub mod topology;
pub mod traits;
pub mod visual;

// Re-export main types at crate root
pub use bitset::AtomicBitSet;
pub use clock::{ManualClock, MonotonicClock};
pub use config::{AutomataConfig, TickMode};
pub use error::{AutomataError, AutomataResult};
pub use partition::{Partition, PartitionSet};
pub use rules::RuleTable;
pub use state::CellStore;
pub use topology::GridTopology;
pub use traits::*;
pub use visual::{InstanceBuffers, SlotHandle, SlotRole, VisualParams};

/// Linear cell identifier in `[0, num_cells)`
pub type CellId = usize;

/// Cells in a Moore neighborhood
pub const NEIGHBORHOOD_SIZE: usize = 8;

/// Largest meaningful neighbor count (table size is this + 1)
pub const MAX_NEIGHBORS: usize = NEIGHBORHOOD_SIZE;

/// Visual parameters written per cell
pub const PARAMS_PER_CELL: usize = 3;

/// Switch-off time meaning "stays on, do not fade"
pub const STAYS_ON: f32 = f32::MAX;
