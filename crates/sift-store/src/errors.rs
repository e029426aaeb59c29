//! Store error taxonomy.

use sift_core::status::{RunStatus, StepStatus};

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the run store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Connection pool exhausted or broken.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Underlying `SQLite` error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Run not found.
    #[error("run not found: {0}")]
    RunNotFound(String),

    /// Step not found.
    #[error("step not found: {0}")]
    StepNotFound(String),

    /// Status write violating the monotonic state machine.
    #[error("illegal run transition {from} -> {to} for {id}")]
    IllegalRunTransition {
        /// Run ID.
        id: String,
        /// Current status.
        from: RunStatus,
        /// Rejected target status.
        to: RunStatus,
    },

    /// Status write violating the monotonic state machine.
    #[error("illegal step transition {from} -> {to} for {id}")]
    IllegalStepTransition {
        /// Step ID.
        id: String,
        /// Current status.
        from: StepStatus,
        /// Rejected target status.
        to: StepStatus,
    },

    /// A persisted value failed to parse back into its typed form.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}
