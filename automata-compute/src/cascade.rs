//! # Cascade State Machine
//!
//! Partitions of one step run one after another: partition `i` finishing
//! dispatches partition `i + 1`, and the last one finishing completes the
//! step. The commit happens outside this machine, after a join.
//!
//! ```text
//!   Idle ──start_step──▶ Running(0) ──finished(0)──▶ Running(1) ─ ... ─▶ StepComplete
//!                            ▲                                              │
//!                            └─────────────────start_step───────────────────┘
//! ```
//!
//! Transitions are pure: they only touch this struct and tell the caller
//! what to do next.

use automata_core::{AutomataError, AutomataResult};

/// Where the cascade is within a step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CascadePhase {
    /// No step has been started yet
    Idle,
    /// Partition `i` is evaluating
    Running(usize),
    /// Every partition of the current step has finished
    StepComplete,
}

/// What the caller must do after a transition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Start evaluating this partition
    Dispatch(usize),
    /// The step is fully evaluated; join and commit when ready
    Complete,
}

/// Scheduler state for the partition cascade
#[derive(Clone, Debug)]
pub struct CascadeState {
    phase: CascadePhase,
    divisions: usize,
    step: u64,
    next_step_time: f32,
}

impl CascadeState {
    pub fn new(divisions: usize) -> AutomataResult<Self> {
        if divisions == 0 {
            return Err(AutomataError::config("cascade needs at least one division"));
        }
        Ok(Self {
            phase: CascadePhase::Idle,
            divisions,
            step: 0,
            next_step_time: 0.0,
        })
    }

    /// Begin a step scheduled to take effect at `next_step_time`
    pub fn start_step(&mut self, next_step_time: f32) -> AutomataResult<Transition> {
        match self.phase {
            CascadePhase::Idle => self.step = 0,
            CascadePhase::StepComplete => self.step += 1,
            CascadePhase::Running(_) => {
                return Err(AutomataError::transition(self.phase, "start_step"));
            }
        }
        self.next_step_time = next_step_time;
        self.phase = CascadePhase::Running(0);
        Ok(Transition::Dispatch(0))
    }

    /// Partition `index` has finished its cells
    pub fn partition_finished(&mut self, index: usize) -> AutomataResult<Transition> {
        if self.phase != CascadePhase::Running(index) {
            return Err(AutomataError::transition(
                self.phase,
                format!("partition_finished({})", index),
            ));
        }

        let next = (index + 1) % self.divisions;
        if next == 0 {
            self.phase = CascadePhase::StepComplete;
            Ok(Transition::Complete)
        } else {
            self.phase = CascadePhase::Running(next);
            Ok(Transition::Dispatch(next))
        }
    }

    pub fn phase(&self) -> CascadePhase {
        self.phase
    }

    pub fn is_step_complete(&self) -> bool {
        self.phase == CascadePhase::StepComplete
    }

    /// Partition currently evaluating, if any
    pub fn current_partition(&self) -> Option<usize> {
        match self.phase {
            CascadePhase::Running(i) => Some(i),
            _ => None,
        }
    }

    pub fn divisions(&self) -> usize {
        self.divisions
    }

    /// Number of the step most recently started
    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn next_step_time(&self) -> f32 {
        self.next_step_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cascade_visits_partitions_in_order() {
        let mut state = CascadeState::new(3).unwrap();
        let mut visited = Vec::new();

        for _ in 0..2 {
            let mut next = state.start_step(1.0).unwrap();
            while let Transition::Dispatch(i) = next {
                visited.push(i);
                next = state.partition_finished(i).unwrap();
            }
            assert!(state.is_step_complete());
        }

        assert_eq!(visited, vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(state.step(), 1);
    }

    #[test]
    fn test_single_division_completes_immediately() {
        let mut state = CascadeState::new(1).unwrap();
        assert_eq!(state.start_step(0.0).unwrap(), Transition::Dispatch(0));
        assert_eq!(state.partition_finished(0).unwrap(), Transition::Complete);
        assert_eq!(state.phase(), CascadePhase::StepComplete);
    }

    #[test]
    fn test_start_step_records_time() {
        let mut state = CascadeState::new(2).unwrap();
        state.start_step(0.0).unwrap();
        assert_eq!(state.step(), 0);
        assert_eq!(state.next_step_time(), 0.0);
        assert_eq!(state.current_partition(), Some(0));

        state.partition_finished(0).unwrap();
        state.partition_finished(1).unwrap();
        state.start_step(3.5).unwrap();
        assert_eq!(state.step(), 1);
        assert_eq!(state.next_step_time(), 3.5);
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut state = CascadeState::new(2).unwrap();
        assert!(matches!(
            state.partition_finished(0),
            Err(AutomataError::InvalidTransition { .. })
        ));

        state.start_step(0.0).unwrap();
        assert!(state.start_step(0.0).is_err());
        assert!(state.partition_finished(1).is_err());
        // a rejected input leaves the phase untouched
        assert_eq!(state.phase(), CascadePhase::Running(0));
    }

    #[test]
    fn test_zero_divisions_rejected() {
        assert!(CascadeState::new(0).is_err());
    }
}
