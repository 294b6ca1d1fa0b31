//! # Error Types
//!
//! Unified error handling across the automata crates.
//!
//! Construction, config I/O and host calls (`advance`, `set_cell`) return
//! errors. Partition workers never do: bad indices there are invariant
//! violations and are caught with debug assertions instead.

use thiserror::Error;

/// Main error type for automaton operations
#[derive(Error, Debug)]
pub enum AutomataError {
    /// Configuration error (fatal at initialization)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cascade state machine received an input it cannot accept
    #[error("Invalid cascade transition: {event} while {from}")]
    InvalidTransition { from: String, event: String },

    /// Cell ID outside the grid
    #[error("Cell {cell} is outside the grid of {num_cells} cells")]
    InvalidCell { cell: usize, num_cells: usize },

    /// Worker pool could not be created
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for automaton operations
pub type AutomataResult<T> = Result<T, AutomataError>;

impl AutomataError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a scheduler error
    pub fn scheduler(msg: impl Into<String>) -> Self {
        Self::Scheduler(msg.into())
    }

    /// Create an invalid transition error
    pub fn transition(from: impl std::fmt::Debug, event: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: format!("{:?}", from),
            event: event.into(),
        }
    }
}

impl From<serde_json::Error> for AutomataError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
