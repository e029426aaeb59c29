//! Artifact production seam.
//!
//! Each successful step hands its content to an artifact collaborator and
//! records the returned reference. Artifact shape and storage are outside
//! this core.

use async_trait::async_trait;
use dashmap::DashMap;

use sift_core::agents::AgentType;
use sift_core::ids;

/// Artifact creation failure.
#[derive(Debug, thiserror::Error)]
#[error("artifact creation failed: {0}")]
pub struct ArtifactError(pub String);

/// Receives step output, returns an artifact reference.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Store one step's produced content. Returns the artifact ID.
    async fn create(
        &self,
        run_id: &str,
        step_id: &str,
        agent: AgentType,
        content: &str,
    ) -> Result<String, ArtifactError>;
}

/// A stored artifact record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    /// Owning run.
    pub run_id: String,
    /// Producing step.
    pub step_id: String,
    /// Producing agent.
    pub agent: AgentType,
    /// Artifact content.
    pub content: String,
}

/// In-process artifact sink.
pub struct MemoryArtifactSink {
    artifacts: DashMap<String, StoredArtifact>,
}

impl MemoryArtifactSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            artifacts: DashMap::new(),
        }
    }

    /// Fetch a stored artifact by ID.
    #[must_use]
    pub fn get(&self, artifact_id: &str) -> Option<StoredArtifact> {
        self.artifacts.get(artifact_id).map(|a| a.clone())
    }

    /// Number of stored artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Whether the sink holds no artifacts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl Default for MemoryArtifactSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactSink for MemoryArtifactSink {
    async fn create(
        &self,
        run_id: &str,
        step_id: &str,
        agent: AgentType,
        content: &str,
    ) -> Result<String, ArtifactError> {
        let id = ids::artifact_id();
        let _ = self.artifacts.insert(
            id.clone(),
            StoredArtifact {
                run_id: run_id.into(),
                step_id: step_id.into(),
                agent,
                content: content.into(),
            },
        );
        Ok(id)
    }
}
