//! Lifecycle events relayed to stream listeners.
//!
//! Events are ephemeral: they exist only inside the event bus for the
//! lifetime of a run's active listeners and are never persisted — the
//! run/step rows are the durable record of truth. They are serialize-only:
//! nothing in the system deserializes them, and the step-terminal and
//! run-terminal variants intentionally share the `complete` wire type (a
//! listener has exactly one exit condition: `allDone == true`).

use serde::Serialize;

use crate::agents::AgentType;

/// Common fields for all run events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseEvent {
    /// Run this event belongs to.
    pub run_id: String,
    /// ISO 8601 timestamp.
    pub timestamp: String,
}

impl BaseEvent {
    /// Create a new base event with the current UTC timestamp.
    #[must_use]
    pub fn now(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// A state-transition event published by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum RunEvent {
    /// A step entered `running`.
    #[serde(rename = "running")]
    StepRunning {
        /// Common fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Step that started.
        step_id: String,
        /// Agent performing the step.
        agent: AgentType,
        /// Initial progress (0).
        progress: u8,
        /// Human-readable label.
        label: String,
    },

    /// A step completed successfully.
    #[serde(rename = "complete")]
    StepCompleted {
        /// Common fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Step that completed.
        step_id: String,
        /// Agent that performed the step.
        agent: AgentType,
        /// Final progress (100).
        progress: u8,
        /// Tokens consumed by the step.
        tokens_used: u64,
        /// Reference to the produced artifact.
        #[serde(skip_serializing_if = "Option::is_none")]
        artifact_id: Option<String>,
    },

    /// A step failed.
    #[serde(rename = "error")]
    StepFailed {
        /// Common fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Step that failed.
        step_id: String,
        /// Agent that was performing the step.
        agent: AgentType,
        /// Error text.
        message: String,
    },

    /// Terminal run event — the sole signal that no further events follow.
    #[serde(rename = "complete")]
    RunFinished {
        /// Common fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Always `true`; listeners stop on this flag.
        all_done: bool,
        /// Whether the run failed.
        error: bool,
    },
}

impl RunEvent {
    /// Get the base event fields.
    #[must_use]
    pub fn base(&self) -> &BaseEvent {
        match self {
            Self::StepRunning { base, .. }
            | Self::StepCompleted { base, .. }
            | Self::StepFailed { base, .. }
            | Self::RunFinished { base, .. } => base,
        }
    }

    /// Run ID this event belongs to.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.base().run_id
    }

    /// Wire type string.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StepRunning { .. } => "running",
            Self::StepCompleted { .. } | Self::RunFinished { .. } => "complete",
            Self::StepFailed { .. } => "error",
        }
    }

    /// Whether this is the terminal event for the run.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RunFinished { .. })
    }

    /// Build the terminal event for a run.
    #[must_use]
    pub fn finished(run_id: impl Into<String>, error: bool) -> Self {
        Self::RunFinished {
            base: BaseEvent::now(run_id),
            all_done: true,
            error,
        }
    }
}
