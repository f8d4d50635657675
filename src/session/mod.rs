//! Session channel registry
//!
//! The SSE transport splits one logical MCP conversation across two
//! independently opened HTTP requests: the long-lived `GET /sse` stream and
//! the short `POST /message` calls. The registry correlates them by session
//! id and owns the output sink of every open stream.

mod reaper;
mod registry;

pub use reaper::spawn_idle_reaper;
pub use registry::{SessionInfo, SessionRegistry};

use std::fmt;
use std::str::FromStr;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque, unguessable session token (UUID v4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub(crate) fn generate() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_hyphenated())
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(SessionId)
    }
}

/// Server-to-client event pushed onto a session's stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Handshake carrying the URL the client must POST messages to
    Endpoint(String),
    /// Serialized JSON-RPC response
    Message(String),
}

impl SessionEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Endpoint(_) => "endpoint",
            SessionEvent::Message(_) => "message",
        }
    }

    pub fn data(&self) -> &str {
        match self {
            SessionEvent::Endpoint(data) | SessionEvent::Message(data) => data,
        }
    }
}

/// Output half of an open session stream
pub type SessionSink = mpsc::Sender<SessionEvent>;
