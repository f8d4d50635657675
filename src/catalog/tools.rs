//! Tool definitions and argument handling
//!
//! Every tool is bound to one prompt. Calling a tool validates its arguments
//! into a typed record and renders a configuration header in front of the
//! bound prompt body.

use crate::catalog::PromptId;
use crate::mcp::protocol::Tool;
use crate::types::CatalogError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

/// Known tool identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolId {
    CreatePipeline,
    SecurityScan,
    DoraMetrics,
}

impl ToolId {
    pub const ALL: [ToolId; 3] = [
        ToolId::CreatePipeline,
        ToolId::SecurityScan,
        ToolId::DoraMetrics,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolId::CreatePipeline => "opsera_create_pipeline",
            ToolId::SecurityScan => "opsera_security_scan",
            ToolId::DoraMetrics => "opsera_dora_metrics",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == name)
    }

    /// Prompt whose body is appended to this tool's output
    pub fn prompt(self) -> PromptId {
        match self {
            ToolId::CreatePipeline => PromptId::CreatePipeline,
            ToolId::SecurityScan => PromptId::SecurityAudit,
            ToolId::DoraMetrics => PromptId::DoraReport,
        }
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Get all tool definitions
pub fn get_tool_definitions() -> Vec<Tool> {
    vec![
        Tool {
            name: ToolId::CreatePipeline.as_str().to_string(),
            description: "Create a production-ready CI/CD pipeline".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "platform": {
                        "type": "string",
                        "description": "CI/CD platform (github-actions, gitlab-ci, jenkins, azure-devops)",
                        "enum": ["github-actions", "gitlab-ci", "jenkins", "azure-devops"]
                    },
                    "language": {
                        "type": "string",
                        "description": "Programming language (auto-detected if not specified)"
                    },
                    "deployment_target": {
                        "type": "string",
                        "description": "Deployment target (kubernetes, docker, serverless, vm)"
                    }
                },
                "required": ["platform"]
            }),
        },
        Tool {
            name: ToolId::SecurityScan.as_str().to_string(),
            description: "Run comprehensive security scan with compliance mapping".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "scan_type": {
                        "type": "string",
                        "description": "Type of security scan",
                        "enum": ["full", "secrets", "vulnerabilities", "compliance"]
                    },
                    "compliance_framework": {
                        "type": "string",
                        "description": "Compliance framework to map findings against",
                        "enum": ["soc2", "hipaa", "pci-dss", "iso27001"]
                    }
                },
                "required": ["scan_type"]
            }),
        },
        Tool {
            name: ToolId::DoraMetrics.as_str().to_string(),
            description: "Generate DORA metrics report with recommendations".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "period_days": {
                        "type": "number",
                        "description": "Analysis period in days (default: 90)",
                        "default": DEFAULT_PERIOD_DAYS
                    }
                }
            }),
        },
    ]
}

pub const DEFAULT_PERIOD_DAYS: u32 = 90;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    #[default]
    GithubActions,
    GitlabCi,
    Jenkins,
    AzureDevops,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::GithubActions => "github-actions",
            Platform::GitlabCi => "gitlab-ci",
            Platform::Jenkins => "jenkins",
            Platform::AzureDevops => "azure-devops",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    #[default]
    Full,
    Secrets,
    Vulnerabilities,
    Compliance,
}

impl ScanType {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanType::Full => "full",
            ScanType::Secrets => "secrets",
            ScanType::Vulnerabilities => "vulnerabilities",
            ScanType::Compliance => "compliance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ComplianceFramework {
    #[serde(rename = "soc2")]
    Soc2,
    #[serde(rename = "hipaa")]
    Hipaa,
    #[serde(rename = "pci-dss")]
    PciDss,
    #[serde(rename = "iso27001")]
    Iso27001,
}

impl ComplianceFramework {
    pub fn as_str(self) -> &'static str {
        match self {
            ComplianceFramework::Soc2 => "soc2",
            ComplianceFramework::Hipaa => "hipaa",
            ComplianceFramework::PciDss => "pci-dss",
            ComplianceFramework::Iso27001 => "iso27001",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePipelineArgs {
    pub platform: Option<Platform>,
    pub language: Option<String>,
    pub deployment_target: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityScanArgs {
    pub scan_type: Option<ScanType>,
    pub compliance_framework: Option<ComplianceFramework>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DoraMetricsArgs {
    pub period_days: Option<u32>,
}

/// A validated tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    CreatePipeline(CreatePipelineArgs),
    SecurityScan(SecurityScanArgs),
    DoraMetrics(DoraMetricsArgs),
}

impl ToolCall {
    /// Resolve `name` and validate `arguments` against the tool's parameters.
    ///
    /// Absent or `null` arguments select every default.
    pub fn parse(name: &str, arguments: Option<Value>) -> Result<Self, CatalogError> {
        let tool = ToolId::parse(name).ok_or_else(|| CatalogError::UnknownTool(name.to_string()))?;

        let args = match arguments.unwrap_or(Value::Null) {
            Value::Null => Value::Object(Map::new()),
            value @ Value::Object(_) => value,
            _ => {
                return Err(CatalogError::InvalidArguments {
                    tool: tool.as_str(),
                    reason: "arguments must be an object".to_string(),
                })
            }
        };

        let call = match tool {
            ToolId::CreatePipeline => ToolCall::CreatePipeline(decode_args(tool, args)?),
            ToolId::SecurityScan => ToolCall::SecurityScan(decode_args(tool, args)?),
            ToolId::DoraMetrics => {
                let args: DoraMetricsArgs = decode_args(tool, args)?;
                if args.period_days == Some(0) {
                    return Err(CatalogError::InvalidArguments {
                        tool: tool.as_str(),
                        reason: "period_days must be at least 1".to_string(),
                    });
                }
                ToolCall::DoraMetrics(args)
            }
        };

        Ok(call)
    }

    pub fn id(&self) -> ToolId {
        match self {
            ToolCall::CreatePipeline(_) => ToolId::CreatePipeline,
            ToolCall::SecurityScan(_) => ToolId::SecurityScan,
            ToolCall::DoraMetrics(_) => ToolId::DoraMetrics,
        }
    }

    /// Render the composite text: title, configuration block, prompt body
    /// and an optional closing instruction.
    pub fn render(&self, body: &str) -> String {
        let (title, settings, closing) = self.layout();

        let mut output = format!("# {}\n\n## Configuration\n", title);
        for (label, value) in settings {
            output.push_str(&format!("- **{}**: {}\n", label, value));
        }
        output.push('\n');
        output.push_str(body);

        if let Some(closing) = closing {
            output.push_str("\n\n---\n");
            output.push_str(&closing);
        }

        output
    }

    fn layout(&self) -> (&'static str, Vec<(&'static str, String)>, Option<String>) {
        match self {
            ToolCall::CreatePipeline(args) => {
                let platform = args.platform.unwrap_or_default().as_str();
                (
                    "CI/CD Pipeline Generation",
                    vec![
                        ("Platform", platform.to_string()),
                        ("Language", or_default(&args.language, "auto-detect")),
                        (
                            "Deployment Target",
                            or_default(&args.deployment_target, "kubernetes"),
                        ),
                    ],
                    Some(format!(
                        "Now analyze this project and generate a production-ready {} pipeline.",
                        platform
                    )),
                )
            }
            ToolCall::SecurityScan(args) => (
                "Security Scan",
                vec![
                    ("Scan Type", args.scan_type.unwrap_or_default().as_str().to_string()),
                    (
                        "Compliance Framework",
                        args.compliance_framework
                            .map(ComplianceFramework::as_str)
                            .unwrap_or("None specified")
                            .to_string(),
                    ),
                ],
                Some("Now execute the security scan and provide a detailed report.".to_string()),
            ),
            ToolCall::DoraMetrics(args) => (
                "DORA Metrics Analysis",
                vec![(
                    "Analysis Period",
                    format!("{} days", args.period_days.unwrap_or(DEFAULT_PERIOD_DAYS)),
                )],
                None,
            ),
        }
    }
}

fn decode_args<T: DeserializeOwned>(tool: ToolId, args: Value) -> Result<T, CatalogError> {
    serde_json::from_value(args).map_err(|e| CatalogError::InvalidArguments {
        tool: tool.as_str(),
        reason: e.to_string(),
    })
}

// Empty strings fall back to the default, same as an absent value
fn or_default(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}
