//! Run API: create, snapshot, list.
//!
//! Creation enforces the admission preconditions before any run row exists:
//! at least one ready data source for the project, and a non-exhausted
//! monthly token budget. On success the run is persisted as `queued`,
//! orchestration is dispatched, and the caller gets an acknowledgement
//! immediately — not the pipeline's outcome.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use sift_core::agents::{in_catalog_order, AgentType};
use sift_core::run::{Run, Step};
use sift_core::status::PipelineMode;
use sift_gateway::ledger::BudgetWindow;
use sift_runtime::RuntimeError;
use sift_store::NewRun;

use crate::error::ApiError;
use crate::state::AppState;

/// Run-creation request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRunRequest {
    /// Project to analyze.
    pub project_id: String,
    /// Billing tenant.
    pub tenant_id: String,
    /// Selected agent type names.
    pub agents: Vec<String>,
    /// Execution mode; defaults to sequential.
    #[serde(default)]
    pub mode: PipelineMode,
    /// Creator identifier.
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Run-creation acknowledgement.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRunResponse {
    /// The created run's ID.
    pub run_id: String,
    /// Always `queued` at acknowledgement time.
    pub status: String,
}

/// Run snapshot: the persisted run plus its steps.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    /// The run row.
    pub run: Run,
    /// Its steps in execution order.
    pub steps: Vec<Step>,
}

/// Query parameters for listing runs.
#[derive(Debug, Deserialize)]
pub struct ListRunsQuery {
    /// Maximum number of runs to return (default 20, capped at 100).
    pub limit: Option<u32>,
}

/// Runs listing response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRunsResponse {
    /// Most recent runs, newest first.
    pub runs: Vec<Run>,
}

fn parse_agents(names: &[String]) -> Result<Vec<AgentType>, ApiError> {
    if names.is_empty() {
        return Err(ApiError::InvalidRequest(
            "at least one agent must be selected".into(),
        ));
    }
    let mut agents = Vec::with_capacity(names.len());
    for name in names {
        let agent = AgentType::parse(name)
            .ok_or_else(|| ApiError::InvalidRequest(format!("unknown agent type: {name}")))?;
        agents.push(agent);
    }
    // Execution order is catalog order; duplicates collapse.
    Ok(in_catalog_order(&agents))
}

/// `POST /api/runs`
#[instrument(skip_all, fields(project_id = %request.project_id, tenant_id = %request.tenant_id))]
pub async fn create_run(
    State(state): State<AppState>,
    Json(request): Json<CreateRunRequest>,
) -> Result<(StatusCode, Json<CreateRunResponse>), ApiError> {
    let agents = parse_agents(&request.agents)?;

    // Precondition: a ready upstream data source exists.
    if state.sources.ready_source_count(&request.project_id).await == 0 {
        return Err(ApiError::NoDataSources {
            project_id: request.project_id,
        });
    }

    // Precondition: monthly budget not exhausted. No run row exists on
    // rejection; per-call daily gating happens inside the gateway later.
    let monthly_usage = state
        .ledger
        .usage(&request.tenant_id, BudgetWindow::Monthly)
        .await;
    let monthly_limit = state.settings.budgets.monthly_tokens;
    if monthly_usage >= monthly_limit {
        return Err(ApiError::BudgetExhausted {
            tenant_id: request.tenant_id,
            usage: monthly_usage,
            limit: monthly_limit,
        });
    }

    let (run, _steps) = state.store.create_run(&NewRun {
        project_id: request.project_id,
        tenant_id: request.tenant_id,
        mode: request.mode,
        agents,
        created_by: request.created_by,
    })?;

    // Dispatch and acknowledge; the caller never blocks on the pipeline.
    match Arc::clone(&state.orchestrator).dispatch(run.clone()) {
        Ok(_handle) => {}
        Err(RuntimeError::ServerBusy { current, max }) => {
            warn!(run_id = %run.id, current, max, "dispatch rejected, failing run");
            if let Err(error) = state.store.fail_run(&run.id, "server at concurrent run limit") {
                warn!(run_id = %run.id, %error, "failed to record dispatch rejection");
            }
            return Err(ApiError::ServerBusy);
        }
        Err(error) => return Err(ApiError::Internal(error.to_string())),
    }

    info!(run_id = %run.id, "run accepted");
    Ok((
        StatusCode::ACCEPTED,
        Json(CreateRunResponse {
            run_id: run.id,
            status: "queued".into(),
        }),
    ))
}

/// `GET /api/runs/{run_id}` — snapshot, not a stream.
pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunSnapshot>, ApiError> {
    let (run, steps) = state
        .store
        .run_with_steps(&run_id)?
        .ok_or(ApiError::NotFound("run"))?;
    Ok(Json(RunSnapshot { run, steps }))
}

/// `GET /api/projects/{project_id}/runs` — newest first, bounded.
pub async fn list_runs(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Query(query): Query<ListRunsQuery>,
) -> Result<Json<ListRunsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(20).min(100);
    let runs = state.store.list_runs(&project_id, limit)?;
    Ok(Json(ListRunsResponse { runs }))
}
