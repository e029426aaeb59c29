//! # sift-server
//!
//! The HTTP boundary of the pipeline:
//!
//! - **Run API** — create a run (precondition-checked, acknowledged
//!   immediately), fetch a run snapshot, list a project's recent runs
//! - **Stream API** — long-lived SSE connection relaying a run's events
//!   until the terminal event
//! - **Operational** — `/health` liveness and `/metrics` Prometheus
//!   exposition
//!
//! All state is explicit: handlers receive an [`state::AppState`] bundling
//! the store, orchestrator, event bus, ledger, and collaborator seams.

#![deny(unsafe_code)]

pub mod error;
pub mod metrics;
pub mod routes;
pub mod sources;
pub mod state;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use sources::{AllowAllSources, ProjectSources, StaticSources};
pub use state::AppState;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/runs", axum::routing::post(routes::runs::create_run))
        .route("/api/runs/{run_id}", get(routes::runs::get_run))
        .route("/api/runs/{run_id}/events", get(routes::stream::stream_run_events))
        .route("/api/projects/{project_id}/runs", get(routes::runs::list_runs))
        .route("/health", get(routes::health::health))
        .route("/metrics", get(routes::health::metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
