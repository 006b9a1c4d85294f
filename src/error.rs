//! Error taxonomy shared across the crate.
//!
//! The five kinds mirror the simulator's own classification of faults: some are fatal to
//! scenario construction, others abort a single running simulation without touching the
//! controller that spawned it. See `DispatchError::aborts_simulation`.

use thiserror::Error;

/// Unified error type for every fallible operation in this crate.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    /// A configuration value fell outside its allowed set (e.g. an unknown connection endpoint).
    #[error("invalid choice: {0}")]
    InvalidChoice(String),

    /// A collaborator was built from data of the wrong shape.
    #[error("invalid class: expected {expected}, got {actual}")]
    InvalidClass {
        expected: &'static str,
        actual: String,
    },

    /// Input was structurally usable but could not be placed or processed.
    #[error("unprocessable entity: {0}")]
    UnprocessableEntity(String),

    /// Runtime state violated an invariant. Simulations abort on this; controllers keep running.
    #[error("conflict condition: {0}")]
    ConflictCondition(String),

    /// A lookup by name failed.
    #[error("not found: {0}")]
    NotFound(String),
}

impl DispatchError {
    /// Per §7: only `ConflictCondition` is the kind a running simulation catches and converts
    /// into an abort; every other kind is fatal to whatever constructed the offending value.
    pub fn aborts_simulation(&self) -> bool {
        matches!(self, DispatchError::ConflictCondition(_))
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;
