//! Prompt identifiers and catalog entries
//!
//! Prompt bodies live as Markdown files under `prompts/` and are embedded
//! into the binary at compile time.

use serde::Serialize;
use std::fmt;

/// Known prompt identifiers (case-sensitive on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    CreatePipeline,
    SecurityAudit,
    K8sDeploy,
    DoraReport,
}

impl PromptId {
    /// Catalog order, which is also the order of `prompts/list`
    pub const ALL: [PromptId; 4] = [
        PromptId::CreatePipeline,
        PromptId::SecurityAudit,
        PromptId::K8sDeploy,
        PromptId::DoraReport,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PromptId::CreatePipeline => "create-pipeline",
            PromptId::SecurityAudit => "security-audit",
            PromptId::K8sDeploy => "k8s-deploy",
            PromptId::DoraReport => "dora-report",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            PromptId::CreatePipeline => "Create production-ready CI/CD pipeline with security scanning and multi-environment deployments",
            PromptId::SecurityAudit => "Comprehensive security audit with SAST, dependency scanning, and compliance framework mapping",
            PromptId::K8sDeploy => "Production Kubernetes deployment with security hardening, autoscaling, and observability",
            PromptId::DoraReport => "Generate comprehensive DORA metrics report with performance analysis and improvement recommendations",
        }
    }

    /// File name of the embedded body
    pub(crate) fn file_name(self) -> String {
        format!("{}.md", self.as_str())
    }

    pub(crate) fn index(self) -> usize {
        match self {
            PromptId::CreatePipeline => 0,
            PromptId::SecurityAudit => 1,
            PromptId::K8sDeploy => 2,
            PromptId::DoraReport => 3,
        }
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A loaded prompt: identifier, description and full body text
#[derive(Debug, Clone)]
pub struct PromptEntry {
    pub id: PromptId,
    pub description: &'static str,
    pub body: String,
}

/// Name and description pair returned by prompt listings
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PromptSummary {
    pub name: &'static str,
    pub description: &'static str,
}

impl From<&PromptEntry> for PromptSummary {
    fn from(entry: &PromptEntry) -> Self {
        Self {
            name: entry.id.as_str(),
            description: entry.description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_round_trips_every_id() {
        for id in PromptId::ALL {
            assert_eq!(PromptId::parse(id.as_str()), Some(id));
        }
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert_eq!(PromptId::parse("Create-Pipeline"), None);
        assert_eq!(PromptId::parse("dora_report"), None);
        assert_eq!(PromptId::parse(""), None);
    }

    #[test]
    fn test_ids_and_indexes_are_unique() {
        let names: HashSet<_> = PromptId::ALL.iter().map(|id| id.as_str()).collect();
        let indexes: HashSet<_> = PromptId::ALL.iter().map(|id| id.index()).collect();
        assert_eq!(names.len(), PromptId::ALL.len());
        assert_eq!(indexes.len(), PromptId::ALL.len());
    }
}
