//! MCP server implementation
//!
//! One `McpServer` exists per open session. It answers JSON-RPC requests
//! against the shared catalog; the transport around it (SSE stream plus
//! POSTed messages) lives in `crate::server`.

use crate::catalog::Catalog;
use crate::mcp::protocol::*;
use crate::types::CatalogError;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub const SERVER_NAME: &str = "opsera-devops-agent";

pub struct McpServer {
    catalog: Arc<Catalog>,
    initialized: bool,
}

impl McpServer {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Handle one inbound JSON-RPC message.
    ///
    /// Returns `None` for notifications, which never get a response.
    pub fn handle_message(&mut self, message: Value) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_value(message) {
            Ok(req) => req,
            Err(e) => {
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::new(INVALID_REQUEST, format!("Invalid request: {}", e)),
                ));
            }
        };

        let Some(id) = request.id.clone() else {
            self.handle_notification(&request);
            return None;
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::failure(
                id,
                JsonRpcError::new(
                    INVALID_REQUEST,
                    format!("Unsupported jsonrpc version: {}", request.jsonrpc),
                ),
            ));
        }

        debug!("Handling request: {}", request.method);

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => self.handle_list_tools(),
            "tools/call" => self.handle_call_tool(request.params),
            "prompts/list" => self.handle_list_prompts(),
            "prompts/get" => self.handle_get_prompt(request.params),
            _ => Err(JsonRpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            )),
        };

        Some(match result {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    fn handle_notification(&mut self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" => {
                debug!("Client confirmed initialization");
            }
            other => debug!("Ignoring notification: {}", other),
        }
    }

    fn handle_initialize(&mut self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: InitializeParams = parse_params(params, "initialize")?;

        if let Some(client) = &params.client_info {
            debug!(
                "Initializing session for client {} (protocol {})",
                client.name, params.protocol_version
            );
        }
        if params.protocol_version != PROTOCOL_VERSION {
            warn!(
                "Client requested protocol {}, answering with {}",
                params.protocol_version, PROTOCOL_VERSION
            );
        }

        self.initialized = true;

        to_result(InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                prompts: Some(serde_json::json!({})),
                tools: Some(serde_json::json!({})),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        })
    }

    fn handle_list_tools(&self) -> Result<Value, JsonRpcError> {
        to_result(ListToolsResult {
            tools: self.catalog.tools().to_vec(),
        })
    }

    fn handle_call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        self.ensure_initialized()?;
        let params: CallToolParams = parse_params(params, "tool call")?;

        let text = self
            .catalog
            .call_tool(&params.name, params.arguments)
            .map_err(catalog_error)?;

        to_result(CallToolResult {
            content: vec![ToolContent::Text { text }],
            is_error: None,
        })
    }

    fn handle_list_prompts(&self) -> Result<Value, JsonRpcError> {
        to_result(ListPromptsResult {
            prompts: self.catalog.list_prompts(),
        })
    }

    fn handle_get_prompt(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        self.ensure_initialized()?;
        let params: GetPromptParams = parse_params(params, "prompt")?;

        let prompt = self.catalog.get_prompt(&params.name).map_err(catalog_error)?;

        to_result(GetPromptResult::user_text(
            Some(prompt.description.to_string()),
            prompt.body.clone(),
        ))
    }

    fn ensure_initialized(&self) -> Result<(), JsonRpcError> {
        if self.initialized {
            Ok(())
        } else {
            Err(JsonRpcError::new(INTERNAL_ERROR, "Server not initialized"))
        }
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(
    params: Option<Value>,
    what: &str,
) -> Result<T, JsonRpcError> {
    serde_json::from_value(params.unwrap_or(Value::Null)).map_err(|e| {
        JsonRpcError::new(INVALID_PARAMS, format!("Invalid {} params: {}", what, e))
    })
}

fn to_result<T: Serialize>(result: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(result).map_err(|e| {
        JsonRpcError::new(INTERNAL_ERROR, format!("Failed to serialize result: {}", e))
    })
}

fn catalog_error(err: CatalogError) -> JsonRpcError {
    JsonRpcError::new(INVALID_PARAMS, err.to_string())
}
