//! Run and step status state machines.
//!
//! Both state machines are monotonic: once a row leaves a state it never
//! returns, and terminal states accept no further transitions. The store
//! enforces `can_transition_to` on every status write.

use serde::{Deserialize, Serialize};

/// Run lifecycle status.
///
/// `queued → running → {completed, failed, cancelled}`. `running` is entered
/// exactly once. `cancelled` is reserved for a future cancel operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Persisted, waiting for the orchestration task to pick it up.
    Queued,
    /// Step execution in progress.
    Running,
    /// All steps completed.
    Completed,
    /// A step failed, or orchestration hit an unexpected error.
    Failed,
    /// Reserved terminal state for a future cancel operation.
    Cancelled,
}

impl RunStatus {
    /// Whether this status is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the monotonic state machine permits `self → next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running)
                | (Self::Running, Self::Completed | Self::Failed | Self::Cancelled)
                // A queued run that never started may still fail (dispatch rejected).
                | (Self::Queued, Self::Failed | Self::Cancelled)
        )
    }

    /// SQL string representation (matches the `runs.status` CHECK constraint).
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse from the SQL string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Step lifecycle status.
///
/// `queued → running → {completed, failed}`. A step never reaches a terminal
/// state without passing through `running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Created with the run, not yet started.
    Queued,
    /// Inference call in flight.
    Running,
    /// Completed with an artifact.
    Completed,
    /// Failed (budget, providers, or internal error).
    Failed,
}

impl StepStatus {
    /// Whether this status is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether the monotonic state machine permits `self → next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running) | (Self::Running, Self::Completed | Self::Failed)
        )
    }

    /// SQL string representation (matches the `steps.status` CHECK constraint).
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse from the SQL string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Pipeline execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// One step at a time in catalog order (default). Each step may depend on
    /// earlier steps' artifacts.
    Sequential,
    /// All steps fan out concurrently; a failure still fails the run, but
    /// started siblings run to completion first.
    Parallel,
}

impl PipelineMode {
    /// SQL string representation.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
        }
    }

    /// Parse from the SQL string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sequential" => Some(Self::Sequential),
            "parallel" => Some(Self::Parallel),
            _ => None,
        }
    }
}

impl Default for PipelineMode {
    fn default() -> Self {
        Self::Sequential
    }
}

impl std::fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}
