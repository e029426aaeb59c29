//! Context assembly seam.
//!
//! What goes into a step's prompt is owned by collaborators outside this
//! core (document stores, earlier artifacts, repository analysis). The
//! orchestrator only needs the assembled prompt plus a deterministic
//! fingerprint of whatever context went into it, so the seam is one trait.

use async_trait::async_trait;

use sift_core::agents::AgentType;
use sift_core::run::Run;
use sift_gateway::fingerprint::context_fingerprint;

/// Assembled input for one step's inference call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepContext {
    /// Optional system context.
    pub system: Option<String>,
    /// Assembled prompt content.
    pub prompt: String,
    /// Deterministic digest of the assembled context.
    pub fingerprint: String,
}

/// Context assembly failure.
#[derive(Debug, thiserror::Error)]
#[error("context assembly failed: {0}")]
pub struct ContextError(pub String);

/// Builds each step's prompt, system context, and fingerprint.
#[async_trait]
pub trait ContextAssembler: Send + Sync {
    /// Assemble the context for one step.
    async fn assemble(&self, run: &Run, agent: AgentType) -> Result<StepContext, ContextError>;
}

/// Default assembler: a per-agent instruction template over the project
/// reference, fingerprinted from the prompt itself.
pub struct PromptContextAssembler;

impl PromptContextAssembler {
    fn instruction(agent: AgentType) -> &'static str {
        match agent {
            AgentType::QaConsultant => {
                "Assess the project's overall QA posture: risks, coverage gaps, and strategy."
            }
            AgentType::RequirementsAnalyst => {
                "Extract and analyze the functional and non-functional requirements."
            }
            AgentType::TestChecklist => {
                "Produce a prioritized test checklist from the analyzed requirements."
            }
            AgentType::AutomationScripts => {
                "Generate automation scripts covering the test checklist."
            }
        }
    }
}

#[async_trait]
impl ContextAssembler for PromptContextAssembler {
    async fn assemble(&self, run: &Run, agent: AgentType) -> Result<StepContext, ContextError> {
        let prompt = format!(
            "Project: {}\nAgent: {}\n\n{}",
            run.project_id,
            agent.as_str(),
            Self::instruction(agent)
        );
        let fingerprint = context_fingerprint(&prompt);
        Ok(StepContext {
            system: Some(format!("You are the {} for this project.", agent.display_label())),
            prompt,
            fingerprint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_core::ids;
    use sift_core::status::{PipelineMode, RunStatus};

    fn run() -> Run {
        Run {
            id: ids::run_id(),
            project_id: "proj_1".into(),
            tenant_id: "tenant_1".into(),
            mode: PipelineMode::Sequential,
            agents: vec![AgentType::QaConsultant],
            status: RunStatus::Queued,
            total_tokens: 0,
            total_cost: 0.0,
            error: None,
            created_by: None,
            created_at: ids::now_rfc3339(),
            started_at: None,
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn assembles_per_agent_prompts() {
        let assembler = PromptContextAssembler;
        let run = run();
        let qa = assembler.assemble(&run, AgentType::QaConsultant).await.unwrap();
        let checklist = assembler.assemble(&run, AgentType::TestChecklist).await.unwrap();

        assert!(qa.prompt.contains("proj_1"));
        assert!(qa.prompt.contains("qa_consultant"));
        assert_ne!(qa.prompt, checklist.prompt);
        assert_ne!(qa.fingerprint, checklist.fingerprint);
    }

    #[tokio::test]
    async fn fingerprint_is_deterministic_for_same_input() {
        let assembler = PromptContextAssembler;
        let run = run();
        let a = assembler.assemble(&run, AgentType::QaConsultant).await.unwrap();
        let b = assembler.assemble(&run, AgentType::QaConsultant).await.unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
    }
}
