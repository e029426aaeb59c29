//! Prometheus metrics recorder.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at server startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

// Metric name constants to avoid typos across crates.

/// Active pipeline runs (gauge).
pub const PIPELINE_RUNS_ACTIVE: &str = "pipeline_runs_active";
/// Completed runs (counter).
pub const PIPELINE_RUNS_COMPLETED_TOTAL: &str = "pipeline_runs_completed_total";
/// Failed runs (counter).
pub const PIPELINE_RUNS_FAILED_TOTAL: &str = "pipeline_runs_failed_total";
/// Completed steps (counter).
pub const PIPELINE_STEPS_COMPLETED_TOTAL: &str = "pipeline_steps_completed_total";
/// Failed steps (counter).
pub const PIPELINE_STEPS_FAILED_TOTAL: &str = "pipeline_steps_failed_total";
/// Gateway cache hits (counter).
pub const GATEWAY_CACHE_HITS_TOTAL: &str = "gateway_cache_hits_total";
/// Gateway cache misses (counter).
pub const GATEWAY_CACHE_MISSES_TOTAL: &str = "gateway_cache_misses_total";
/// Budget gate rejections (counter).
pub const GATEWAY_BUDGET_REJECTIONS_TOTAL: &str = "gateway_budget_rejections_total";
/// Primary-to-fallback failovers (counter).
pub const GATEWAY_FALLBACKS_TOTAL: &str = "gateway_fallbacks_total";
/// Calls where both providers failed (counter).
pub const GATEWAY_TOTAL_FAILURES_TOTAL: &str = "gateway_total_failures_total";
/// Provider requests (counter, labels: provider).
pub const PROVIDER_REQUESTS_TOTAL: &str = "provider_requests_total";
/// Provider errors (counter, labels: provider).
pub const PROVIDER_ERRORS_TOTAL: &str = "provider_errors_total";
/// Live event-bus channels (gauge).
pub const EVENT_BUS_CHANNELS: &str = "event_bus_channels";
/// Open event-stream connections (gauge).
pub const STREAM_CONNECTIONS_ACTIVE: &str = "stream_connections_active";
