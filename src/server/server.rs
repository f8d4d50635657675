use anyhow::{Context, Result};
use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use super::{rest, sse, state::ServerState};
use crate::catalog::Catalog;
use crate::config::ServerConfig;
use crate::mcp::server::SERVER_NAME;
use crate::session::spawn_idle_reaper;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    server: &'static str,
    sessions: usize,
    uptime_secs: i64,
}

async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        server: SERVER_NAME,
        sessions: state.sessions.len(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

pub fn make_app(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sse", get(sse::open_session))
        .route(sse::MESSAGE_PATH, post(sse::post_message))
        .route("/tools", post(rest::list_tools))
        .route("/tools/call", post(rest::call_tool))
        .route("/prompts", post(rest::list_prompts))
        .route("/prompts/get", post(rest::get_prompt))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `shutdown` is cancelled.
///
/// On shutdown every open session is closed so the SSE streams end and the
/// graceful shutdown can complete.
pub async fn run_server(
    config: ServerConfig,
    catalog: Arc<Catalog>,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = config.bind_addr();
    let idle_timeout = config.idle_timeout;
    let state = ServerState::new(config, catalog);

    let reaper = idle_timeout.map(|timeout| {
        info!("Closing sessions idle for more than {:?}", timeout);
        spawn_idle_reaper(Arc::clone(&state.sessions), timeout, shutdown.child_token())
    });

    let sessions = Arc::clone(&state.sessions);
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Listening on http://{}", addr);
    info!("  SSE:  GET  /sse");
    info!("  Msg:  POST {}", sse::MESSAGE_PATH);
    info!("  REST: POST /tools, /tools/call, /prompts, /prompts/get");

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.cancelled().await;
            let closed = sessions.close_all();
            info!("Shutdown requested, closed {} open session(s)", closed);
        })
        .await
        .context("HTTP server failed")?;

    shutdown.cancel();
    if let Some(reaper) = reaper {
        reaper.await.context("Idle session reaper panicked")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigLoader, DEV_API_KEY};
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt; // for `oneshot`

    fn test_state() -> ServerState {
        let config = ConfigLoader::new(None)
            .without_discovery()
            .load_with_env(|_| None)
            .unwrap();
        ServerState::new(config, Arc::new(Catalog::load().unwrap()))
    }

    fn request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = if body.is_null() {
            Body::empty()
        } else {
            Body::from(body.to_string())
        };
        builder.body(body).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    const PROTECTED_ROUTES: [(&str, &str); 6] = [
        ("GET", "/sse"),
        ("POST", "/message?sessionId=00000000-0000-0000-0000-000000000000"),
        ("POST", "/tools"),
        ("POST", "/prompts"),
        ("POST", "/prompts/get"),
        ("POST", "/tools/call"),
    ];

    #[tokio::test]
    async fn health_needs_no_auth() {
        let app = make_app(test_state());
        let response = app
            .oneshot(request(Method::GET, "/health", None, Value::Null))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["server"], "opsera-devops-agent");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["sessions"], 0);
    }

    #[tokio::test]
    async fn responds_unauthorized_on_protected_routes() {
        let app = make_app(test_state());

        for (method, route) in PROTECTED_ROUTES {
            let method: Method = method.parse().unwrap();

            let response = app
                .clone()
                .oneshot(request(method.clone(), route, None, Value::Null))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", route);
            assert_eq!(body_json(response).await, json!({"error": "Missing API key"}));

            let response = app
                .clone()
                .oneshot(request(method, route, Some("wrong-key"), Value::Null))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", route);
            assert_eq!(body_json(response).await, json!({"error": "Invalid API key"}));
        }
    }

    #[tokio::test]
    async fn valid_credential_succeeds_on_catalog_routes() {
        let app = make_app(test_state());
        let cases = [
            ("/tools", Value::Null),
            ("/prompts", Value::Null),
            ("/prompts/get", json!({"name": "k8s-deploy"})),
            ("/tools/call", json!({"name": "opsera_dora_metrics"})),
        ];

        for (route, body) in cases {
            let response = app
                .clone()
                .oneshot(request(Method::POST, route, Some(DEV_API_KEY), body))
                .await
                .unwrap();
            assert!(response.status().is_success(), "{}", route);
        }

        let response = app
            .oneshot(request(Method::GET, "/sse", Some(DEV_API_KEY), Value::Null))
            .await
            .unwrap();
        assert!(response.status().is_success());
    }

    #[tokio::test]
    async fn lists_tools_and_prompts() {
        let app = make_app(test_state());

        let tools = body_json(
            app.clone()
                .oneshot(request(Method::POST, "/tools", Some(DEV_API_KEY), Value::Null))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(tools["tools"].as_array().unwrap().len(), 3);
        assert_eq!(tools["tools"][1]["inputSchema"]["required"], json!(["scan_type"]));

        let prompts = body_json(
            app.oneshot(request(Method::POST, "/prompts", Some(DEV_API_KEY), Value::Null))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(
            prompts["prompts"][0],
            json!({
                "name": "create-pipeline",
                "description": "Create production-ready CI/CD pipeline with security scanning and multi-environment deployments"
            })
        );
    }

    #[tokio::test]
    async fn get_prompt_is_byte_identical_across_calls() {
        let state = test_state();
        let expected = state.catalog.get_prompt("dora-report").unwrap().body.clone();
        let app = make_app(state);

        let mut seen = Vec::new();
        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(request(
                    Method::POST,
                    "/prompts/get",
                    Some(DEV_API_KEY),
                    json!({"name": "dora-report"}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = body_json(response).await;
            assert_eq!(body["messages"][0]["role"], "user");
            assert_eq!(body["messages"][0]["content"]["type"], "text");
            seen.push(body["messages"][0]["content"]["text"].as_str().unwrap().to_string());
        }

        assert_eq!(seen[0], expected);
        assert_eq!(seen[0], seen[1]);
    }

    #[tokio::test]
    async fn get_prompt_errors() {
        let app = make_app(test_state());

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/prompts/get",
                Some(DEV_API_KEY),
                json!({"name": "nope"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({"error": "Prompt not found: nope"}));

        let response = app
            .oneshot(request(Method::POST, "/prompts/get", Some(DEV_API_KEY), json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Missing required field: name"})
        );
    }

    #[tokio::test]
    async fn call_tool_renders_configuration_and_body() {
        let state = test_state();
        let body = state.catalog.get_prompt("create-pipeline").unwrap().body.clone();
        let app = make_app(state);

        let response = app
            .oneshot(request(
                Method::POST,
                "/tools/call",
                Some(DEV_API_KEY),
                json!({"name": "opsera_create_pipeline", "arguments": {"platform": "gitlab-ci"}}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let result = body_json(response).await;
        assert_eq!(result["content"][0]["type"], "text");
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("**Platform**: gitlab-ci"));
        assert!(text.contains(&body));
    }

    #[tokio::test]
    async fn call_unknown_tool_is_not_found() {
        let app = make_app(test_state());
        let response = app
            .oneshot(request(
                Method::POST,
                "/tools/call",
                Some(DEV_API_KEY),
                json!({"name": "unknown_tool"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Unknown tool: unknown_tool"})
        );
    }

    #[tokio::test]
    async fn call_tool_with_bad_arguments_is_bad_request() {
        let app = make_app(test_state());
        let response = app
            .oneshot(request(
                Method::POST,
                "/tools/call",
                Some(DEV_API_KEY),
                json!({"name": "opsera_create_pipeline", "arguments": {"platform": "circleci"}}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid arguments for opsera_create_pipeline"));
    }

    #[tokio::test]
    async fn sse_without_credential_allocates_nothing() {
        let state = test_state();
        let sessions = Arc::clone(&state.sessions);
        let app = make_app(state);

        let response = app
            .oneshot(request(Method::GET, "/sse", None, Value::Null))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn message_without_or_with_unknown_session() {
        let app = make_app(test_state());
        let ping = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/message", Some(DEV_API_KEY), ping.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "Missing sessionId"}));

        for uri in [
            "/message?sessionId=garbage",
            "/message?sessionId=6f1c0a8e-3c1e-4f55-9d59-0f3cbb2a7a11",
        ] {
            let response = app
                .clone()
                .oneshot(request(Method::POST, uri, Some(DEV_API_KEY), ping.clone()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(response).await, json!({"error": "Invalid session"}));
        }
    }

    fn sse_field<'a>(frame: &'a str, field: &str) -> Option<&'a str> {
        let prefix = format!("{}: ", field);
        frame
            .lines()
            .find_map(|line| line.strip_prefix(prefix.as_str()))
    }

    async fn next_event(body: &mut Body) -> String {
        loop {
            let frame = body.frame().await.unwrap().unwrap();
            if let Ok(data) = frame.into_data() {
                let text = String::from_utf8(data.to_vec()).unwrap();
                // skip keep-alive comments
                if !text.starts_with(':') {
                    return text;
                }
            }
        }
    }

    #[tokio::test]
    async fn sse_session_round_trip_and_disconnect() {
        let state = test_state();
        let sessions = Arc::clone(&state.sessions);
        let app = make_app(state);

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/sse", Some(DEV_API_KEY), Value::Null))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(sessions.len(), 1);

        let mut body = response.into_body();
        let handshake = next_event(&mut body).await;
        assert_eq!(sse_field(&handshake, "event"), Some("endpoint"));
        let endpoint = sse_field(&handshake, "data").unwrap().to_string();
        assert!(endpoint.starts_with("/message?sessionId="));

        let initialize = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {"protocolVersion": "2024-11-05", "capabilities": {}}
        });
        let response = app
            .clone()
            .oneshot(request(Method::POST, &endpoint, Some(DEV_API_KEY), initialize.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let message = next_event(&mut body).await;
        assert_eq!(sse_field(&message, "event"), Some("message"));
        let rpc: Value = serde_json::from_str(sse_field(&message, "data").unwrap()).unwrap();
        assert_eq!(rpc["id"], 1);
        assert_eq!(rpc["result"]["serverInfo"]["name"], "opsera-devops-agent");

        // client disconnects
        drop(body);
        assert!(sessions.is_empty());

        let response = app
            .oneshot(request(Method::POST, &endpoint, Some(DEV_API_KEY), initialize))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "Invalid session"}));
    }

    #[tokio::test]
    async fn message_with_malformed_json_is_bad_request() {
        let state = test_state();
        let sessions = Arc::clone(&state.sessions);
        let app = make_app(state);

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/sse", Some(DEV_API_KEY), Value::Null))
            .await
            .unwrap();
        let mut body = response.into_body();
        let handshake = next_event(&mut body).await;
        let endpoint = sse_field(&handshake, "data").unwrap().to_string();

        let bad = Request::builder()
            .method(Method::POST)
            .uri(&endpoint)
            .header(header::AUTHORIZATION, format!("Bearer {}", DEV_API_KEY))
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(bad).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid message"));

        // the session survives a rejected message
        assert_eq!(sessions.len(), 1);
    }

    #[tokio::test]
    async fn sse_respects_session_limit() {
        let mut config = ConfigLoader::new(None)
            .without_discovery()
            .load_with_env(|_| None)
            .unwrap();
        config.max_sessions = Some(1);
        let app = make_app(ServerState::new(config, Arc::new(Catalog::load().unwrap())));

        let first = app
            .clone()
            .oneshot(request(Method::GET, "/sse", Some(DEV_API_KEY), Value::Null))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(request(Method::GET, "/sse", Some(DEV_API_KEY), Value::Null))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
        drop(first);
    }
}
