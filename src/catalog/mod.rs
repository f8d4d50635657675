//! Prompt and tool catalog
//!
//! The catalog is loaded once at startup and never mutated afterwards. It is
//! shared behind an `Arc` by the HTTP handlers and every MCP session.

mod prompts;
mod tools;

pub use prompts::{PromptEntry, PromptId, PromptSummary};
pub use tools::{
    get_tool_definitions, ComplianceFramework, CreatePipelineArgs, DoraMetricsArgs, Platform,
    ScanType, SecurityScanArgs, ToolCall, ToolId, DEFAULT_PERIOD_DAYS,
};

use crate::mcp::protocol::Tool;
use crate::types::CatalogError;
use include_dir::{include_dir, Dir};
use serde_json::Value;
use tracing::{debug, info};

// Embed the prompt bodies at compile time
static PROMPTS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/prompts");

#[derive(Debug)]
pub struct Catalog {
    /// Entries in `PromptId::ALL` order
    prompts: Vec<PromptEntry>,
    tools: Vec<Tool>,
}

impl Catalog {
    /// Load the catalog from the embedded prompt bodies
    pub fn load() -> Result<Self, CatalogError> {
        Self::load_from(&PROMPTS_DIR)
    }

    fn load_from(dir: &Dir<'_>) -> Result<Self, CatalogError> {
        let mut prompts = Vec::with_capacity(PromptId::ALL.len());

        for id in PromptId::ALL {
            let file = dir
                .get_file(id.file_name())
                .ok_or(CatalogError::MissingBody(id.as_str()))?;
            let body = file
                .contents_utf8()
                .ok_or(CatalogError::InvalidBody(id.as_str()))?
                .trim()
                .to_string();

            debug!("Loaded prompt {} ({} bytes)", id, body.len());
            prompts.push(PromptEntry {
                id,
                description: id.description(),
                body,
            });
        }

        let tools = get_tool_definitions();
        info!(
            "Loaded catalog with {} prompts and {} tools",
            prompts.len(),
            tools.len()
        );

        Ok(Self { prompts, tools })
    }

    pub fn prompt(&self, id: PromptId) -> &PromptEntry {
        &self.prompts[id.index()]
    }

    /// Look up a prompt by its wire name
    pub fn get_prompt(&self, name: &str) -> Result<&PromptEntry, CatalogError> {
        PromptId::parse(name)
            .map(|id| self.prompt(id))
            .ok_or_else(|| CatalogError::UnknownPrompt(name.to_string()))
    }

    pub fn list_prompts(&self) -> Vec<PromptSummary> {
        self.prompts.iter().map(PromptSummary::from).collect()
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Validate a tool call and render its composite text
    pub fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<String, CatalogError> {
        let call = ToolCall::parse(name, arguments)?;
        let prompt = self.prompt(call.id().prompt());
        Ok(call.render(&prompt.body))
    }
}
