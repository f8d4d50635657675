//! Legacy plain-request routes
//!
//! Same catalog as the MCP session transport, answered directly in the
//! HTTP response.

use axum::{body::Bytes, extract::State, Json};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::{auth::Authorized, error::ApiError};
use crate::catalog::Catalog;
use crate::mcp::protocol::{
    CallToolResult, GetPromptResult, ListPromptsResult, ListToolsResult, ToolContent,
};

#[derive(Debug, Default, Deserialize)]
struct GetPromptBody {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CallToolBody {
    name: Option<String>,
    arguments: Option<Value>,
}

/// Parse a JSON request body. Content type is not checked and an empty body
/// reads as `{}`.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))
}

fn required(field: Option<String>, name: &str) -> Result<String, ApiError> {
    field.ok_or_else(|| ApiError::BadRequest(format!("Missing required field: {}", name)))
}

pub async fn list_tools(
    _auth: Authorized,
    State(catalog): State<Arc<Catalog>>,
) -> Json<ListToolsResult> {
    Json(ListToolsResult {
        tools: catalog.tools().to_vec(),
    })
}

pub async fn list_prompts(
    _auth: Authorized,
    State(catalog): State<Arc<Catalog>>,
) -> Json<ListPromptsResult> {
    Json(ListPromptsResult {
        prompts: catalog.list_prompts(),
    })
}

pub async fn get_prompt(
    _auth: Authorized,
    State(catalog): State<Arc<Catalog>>,
    body: Bytes,
) -> Result<Json<GetPromptResult>, ApiError> {
    let body: GetPromptBody = parse_body(&body)?;
    let name = required(body.name, "name")?;

    let prompt = catalog.get_prompt(&name)?;
    debug!("Serving prompt {}", prompt.id);

    Ok(Json(GetPromptResult::user_text(None, prompt.body.clone())))
}

pub async fn call_tool(
    _auth: Authorized,
    State(catalog): State<Arc<Catalog>>,
    body: Bytes,
) -> Result<Json<CallToolResult>, ApiError> {
    let body: CallToolBody = parse_body(&body)?;
    let name = required(body.name, "name")?;

    let text = catalog.call_tool(&name, body.arguments)?;
    debug!("Tool {} rendered {} bytes", name, text.len());

    Ok(Json(CallToolResult {
        content: vec![ToolContent::Text { text }],
        is_error: None,
    }))
}
