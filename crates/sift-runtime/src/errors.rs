//! Runtime error taxonomy.

/// Errors surfaced by the orchestration layer.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The server is at its concurrent-run limit.
    #[error("server busy: {current} of {max} runs active")]
    ServerBusy {
        /// Active runs at rejection time.
        current: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The run already has an orchestration task.
    #[error("run already active: {0}")]
    RunActive(String),

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] sift_store::StoreError),
}
