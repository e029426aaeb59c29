//! Run and step model rows.
//!
//! All serializable types use `camelCase` for wire compatibility with the
//! dashboard. These are the durable record of truth; events are a best-effort
//! notification layer on top.

use serde::{Deserialize, Serialize};

use crate::agents::AgentType;
use crate::status::{PipelineMode, RunStatus, StepStatus};

/// One execution of the analysis pipeline for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    /// Run ID (`run_<uuid>`).
    pub id: String,
    /// Project the run analyzes.
    pub project_id: String,
    /// Billing tenant.
    pub tenant_id: String,
    /// Execution mode.
    pub mode: PipelineMode,
    /// Selected agents in execution order.
    pub agents: Vec<AgentType>,
    /// Current status.
    pub status: RunStatus,
    /// Sum of all owned steps' tokens. Only ever incremented.
    pub total_tokens: u64,
    /// Sum of all owned steps' cost in USD. Only ever incremented.
    pub total_cost: f64,
    /// Error text when `status == failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Creator identifier (opaque to this core).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// When the run entered `running`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// When the run reached a terminal status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

/// One agent's unit of work within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Step ID (`step_<uuid>`).
    pub id: String,
    /// Owning run.
    pub run_id: String,
    /// Agent performing this step.
    pub agent: AgentType,
    /// Execution position within the run (0-based).
    pub position: u32,
    /// Current status.
    pub status: StepStatus,
    /// Progress percentage, 0–100, non-decreasing while running.
    pub progress: u8,
    /// Human-readable progress label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_label: Option<String>,
    /// Tokens consumed by this step's inference call.
    pub tokens_used: u64,
    /// Artifact produced on completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
    /// Error text when `status == failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the step entered `running`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// When the step reached a terminal status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}
