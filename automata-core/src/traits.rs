//! # Traits - Seams Between the Automaton and Its Host
//!
//! The automaton never owns the renderer's memory or the host's notion of
//! time. Both are injected through these traits.
//!
//! ## Key Traits
//!
//! - `VisualSink`: Receives per-cell visual parameters, batch by batch
//! - `StepClock`: Supplies the time used to schedule fades

use crate::visual::SlotHandle;

/// Destination for per-cell visual output
///
/// Slot handles are assigned once at initialization and never move.
/// Within a step every handle is written by exactly one partition, so
/// implementations only need per-slot write atomicity.
pub trait VisualSink: Send + Sync {
    /// Store one visual parameter
    fn write(&self, slot: SlotHandle, value: f32);

    /// A batch's slots are complete for this step and may be uploaded
    fn publish(&self, batch: usize);
}

/// Source of the time fades are scheduled against, in seconds
///
/// Step times are stored as `f32` in the visual records, so a clock should
/// count from the automaton's start: the `f32` spacing passes 1ms after
/// about 2.3 hours and 8ms after about 18 hours, which is when fades of a
/// 10ms step period start to snap.
pub trait StepClock: Send + Sync {
    fn now(&self) -> f64;
}

/// Statistics for one committed step
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepStats {
    /// Step number (0 = the synchronous initial step)
    pub step: u64,

    /// Cells whose rule was evaluated
    pub cells_evaluated: u64,

    /// Cells skipped by the dirty check
    pub cells_skipped: u64,

    /// Cells whose state flipped
    pub cells_changed: u64,

    /// Wall time from dispatch of partition 0 to the commit (microseconds)
    pub compute_time_us: u64,
}

impl StepStats {
    /// Fraction of cells the dirty check let us skip
    pub fn skip_ratio(&self) -> f32 {
        let total = self.cells_evaluated + self.cells_skipped;
        if total == 0 {
            0.0
        } else {
            self.cells_skipped as f32 / total as f32
        }
    }
}
