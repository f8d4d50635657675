//! MCP over Server-Sent Events
//!
//! `GET /sse` opens a session and streams events to the client. The first
//! event (`endpoint`) tells the client where to POST its JSON-RPC messages;
//! responses come back on the stream as `message` events.

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures::Stream;
use serde::Deserialize;
use serde_json::Value;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{auth::Authorized, error::ApiError, state::ServerState};
use crate::session::{SessionEvent, SessionId, SessionRegistry};

pub const MESSAGE_PATH: &str = "/message";

/// Event stream of one session.
///
/// Dropping the stream (client disconnect, server shutdown) closes the
/// session, so no later message can reach a dead channel.
pub struct SessionStream {
    id: SessionId,
    events: mpsc::Receiver<SessionEvent>,
    registry: Arc<SessionRegistry>,
}

impl SessionStream {
    pub fn new(
        id: SessionId,
        events: mpsc::Receiver<SessionEvent>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            id,
            events,
            registry,
        }
    }
}

impl Stream for SessionStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx).map(|event| {
            event.map(|event| Ok(Event::default().event(event.name()).data(event.data())))
        })
    }
}

impl Drop for SessionStream {
    fn drop(&mut self) {
        if self.registry.close(&self.id) {
            info!("SSE stream for session {} dropped", self.id);
        }
    }
}

pub async fn open_session(
    _auth: Authorized,
    State(state): State<ServerState>,
) -> Result<Response, ApiError> {
    let (tx, rx) = mpsc::channel(state.config.sse_buffer);
    let session_id = state.sessions.open(tx)?;

    // Guard first: if the handshake fails the session is closed on drop
    let stream = SessionStream::new(session_id, rx, Arc::clone(&state.sessions));

    let endpoint = format!("{}?sessionId={}", MESSAGE_PATH, session_id);
    state
        .sessions
        .notify(&session_id, SessionEvent::Endpoint(endpoint))
        .await?;

    let mut response = Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response();

    // Keep reverse proxies from buffering the event stream
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(
        header::HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );

    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

pub async fn post_message(
    _auth: Authorized,
    State(sessions): State<Arc<SessionRegistry>>,
    query: Result<Query<MessageQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let raw_id = query
        .session_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing sessionId".to_string()))?;

    // A malformed id can never name a live session
    let session_id: SessionId = raw_id.parse().map_err(|_| ApiError::InvalidSession)?;
    if sessions.lookup(&session_id).is_none() {
        return Err(ApiError::InvalidSession);
    }

    let message: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid message: {}", e)))?;

    debug!("Dispatching message to session {}", session_id);
    sessions.dispatch(&session_id, message).await?;

    Ok((StatusCode::ACCEPTED, "Accepted").into_response())
}
