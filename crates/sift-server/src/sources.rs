//! Upstream data-source readiness.
//!
//! Document upload and parsing are external collaborators; the run API only
//! needs the precondition "at least one ready source exists for this
//! project" before a run may be created.

use std::collections::HashMap;

use async_trait::async_trait;

/// Readiness of a project's upstream data sources.
#[async_trait]
pub trait ProjectSources: Send + Sync {
    /// Number of ready sources for the project.
    async fn ready_source_count(&self, project_id: &str) -> usize;
}

/// Every project is considered to have a ready source. For deployments
/// where readiness is enforced upstream of this service.
pub struct AllowAllSources;

#[async_trait]
impl ProjectSources for AllowAllSources {
    async fn ready_source_count(&self, _project_id: &str) -> usize {
        1
    }
}

/// Fixed per-project source counts, configured at construction.
pub struct StaticSources {
    counts: HashMap<String, usize>,
}

impl StaticSources {
    /// Build from `(project_id, ready count)` pairs. Unlisted projects have
    /// zero ready sources.
    #[must_use]
    pub fn new(counts: impl IntoIterator<Item = (String, usize)>) -> Self {
        Self {
            counts: counts.into_iter().collect(),
        }
    }
}

#[async_trait]
impl ProjectSources for StaticSources {
    async fn ready_source_count(&self, project_id: &str) -> usize {
        self.counts.get(project_id).copied().unwrap_or(0)
    }
}
