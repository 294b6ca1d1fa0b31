//! # Automata Compute
//!
//! Runs the cascade automaton on a Rayon worker pool.
//!
//! - **Engine**: incremental rule evaluation and visual output per partition
//! - **Cascade**: the explicit partition state machine
//! - **Task**: blocking handles on partition work units
//! - **Automaton**: the scheduler the host ticks
//!
//! ## Usage
//!
//! ```no_run
//! use automata_compute::Automaton;
//! use automata_core::AutomataConfig;
//!
//! let mut automaton = Automaton::new(AutomataConfig::small(16, 16, 4))?;
//! for _ in 0..10 {
//!     automaton.tick()?;
//! }
//! # Ok::<(), automata_core::AutomataError>(())
//! ```

pub mod automaton;
pub mod cascade;
pub mod engine;
pub mod listener;
pub mod task;

pub use automaton::{Automaton, AutomatonBuilder};
pub use cascade::{CascadePhase, CascadeState, Transition};
pub use engine::{PartitionReport, StepEngine};
pub use listener::{CascadeEvent, CascadeListener, RecordingListener, TracingListener};
pub use task::TaskHandle;
