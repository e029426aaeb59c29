//! Shared application state.
//!
//! One explicit context object instead of ambient globals: every handler's
//! collaborators are injectable, which keeps the HTTP layer testable with
//! in-memory stores and scripted providers.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use sift_gateway::ledger::BudgetLedger;
use sift_runtime::bus::EventBus;
use sift_runtime::orchestrator::Orchestrator;
use sift_settings::Settings;
use sift_store::RunStore;

use crate::sources::ProjectSources;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Durable run/step store.
    pub store: Arc<RunStore>,
    /// Pipeline orchestrator.
    pub orchestrator: Arc<Orchestrator>,
    /// Per-run event fan-out.
    pub bus: Arc<EventBus>,
    /// Budget counters (monthly admission checks live here).
    pub ledger: Arc<dyn BudgetLedger>,
    /// Upstream data-source readiness.
    pub sources: Arc<dyn ProjectSources>,
    /// Loaded settings snapshot.
    pub settings: Arc<Settings>,
    /// Prometheus render handle, when metrics are installed.
    pub metrics: Option<PrometheusHandle>,
}
