//! The closed agent catalog.
//!
//! Each agent is a named role in the analysis pipeline with a fixed position
//! in catalog order. Sequential runs execute selected agents in this order;
//! later agents consume earlier agents' artifacts, which is why pipeline
//! failure is fail-fast.

use serde::{Deserialize, Serialize};

/// An analysis role in the pipeline catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    /// Overall QA strategy assessment for the project.
    QaConsultant,
    /// Requirements extraction and analysis.
    RequirementsAnalyst,
    /// Test checklist generation from analyzed requirements.
    TestChecklist,
    /// Automation script generation from the test checklist.
    AutomationScripts,
}

/// Full catalog in execution order.
pub const CATALOG: [AgentType; 4] = [
    AgentType::QaConsultant,
    AgentType::RequirementsAnalyst,
    AgentType::TestChecklist,
    AgentType::AutomationScripts,
];

impl AgentType {
    /// Wire/SQL string representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::QaConsultant => "qa_consultant",
            Self::RequirementsAnalyst => "requirements_analyst",
            Self::TestChecklist => "test_checklist",
            Self::AutomationScripts => "automation_scripts",
        }
    }

    /// Parse from the wire/SQL string. Returns `None` for unknown agents.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "qa_consultant" => Some(Self::QaConsultant),
            "requirements_analyst" => Some(Self::RequirementsAnalyst),
            "test_checklist" => Some(Self::TestChecklist),
            "automation_scripts" => Some(Self::AutomationScripts),
            _ => None,
        }
    }

    /// Human-readable display label.
    #[must_use]
    pub fn display_label(self) -> &'static str {
        match self {
            Self::QaConsultant => "QA Consultant",
            Self::RequirementsAnalyst => "Requirements Analyst",
            Self::TestChecklist => "Test Checklist",
            Self::AutomationScripts => "Automation Scripts",
        }
    }

    /// Progress label shown while the step is running.
    #[must_use]
    pub fn running_label(self) -> &'static str {
        match self {
            Self::QaConsultant => "Assessing QA strategy",
            Self::RequirementsAnalyst => "Analyzing requirements",
            Self::TestChecklist => "Generating test checklist",
            Self::AutomationScripts => "Generating automation scripts",
        }
    }

    /// Position in catalog order.
    #[must_use]
    pub fn catalog_position(self) -> usize {
        CATALOG.iter().position(|a| *a == self).unwrap_or(usize::MAX)
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort agent types into catalog execution order, dropping duplicates.
#[must_use]
pub fn in_catalog_order(selected: &[AgentType]) -> Vec<AgentType> {
    let mut ordered: Vec<AgentType> = CATALOG
        .iter()
        .copied()
        .filter(|a| selected.contains(a))
        .collect();
    ordered.dedup();
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_all_agents() {
        for agent in CATALOG {
            assert_eq!(AgentType::parse(agent.as_str()), Some(agent));
        }
    }

    #[test]
    fn unknown_agent_fails_to_parse() {
        assert_eq!(AgentType::parse("mystery_agent"), None);
        assert_eq!(AgentType::parse(""), None);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&AgentType::QaConsultant).unwrap();
        assert_eq!(json, "\"qa_consultant\"");
        let back: AgentType = serde_json::from_str("\"test_checklist\"").unwrap();
        assert_eq!(back, AgentType::TestChecklist);
    }

    #[test]
    fn catalog_order_is_stable() {
        assert_eq!(AgentType::QaConsultant.catalog_position(), 0);
        assert_eq!(AgentType::AutomationScripts.catalog_position(), 3);
    }

    #[test]
    fn in_catalog_order_sorts_and_dedups() {
        let selected = [
            AgentType::AutomationScripts,
            AgentType::QaConsultant,
            AgentType::AutomationScripts,
        ];
        let ordered = in_catalog_order(&selected);
        assert_eq!(
            ordered,
            vec![AgentType::QaConsultant, AgentType::AutomationScripts]
        );
    }

    #[test]
    fn in_catalog_order_empty_selection() {
        assert!(in_catalog_order(&[]).is_empty());
    }
}
