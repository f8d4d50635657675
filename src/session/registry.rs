//! Registry of open session channels

use super::{SessionEvent, SessionId, SessionSink};
use crate::catalog::Catalog;
use crate::mcp::McpServer;
use crate::types::SessionError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// One open streaming connection
struct SessionChannel {
    /// Output sink of the SSE stream, owned by this entry only
    sink: SessionSink,

    /// Protocol state. The FIFO lock keeps per-session message order.
    state: Mutex<SessionState>,

    opened_at: Instant,
}

struct SessionState {
    server: McpServer,
    last_activity: Instant,
}

/// Read-only snapshot of a live session
#[derive(Debug, Clone, Copy)]
pub struct SessionInfo {
    pub id: SessionId,
    pub opened_at: Instant,
}

pub struct SessionRegistry {
    /// Open sessions (session id -> channel)
    sessions: DashMap<SessionId, Arc<SessionChannel>>,

    catalog: Arc<Catalog>,

    /// Soft bound on concurrently open sessions
    max_sessions: Option<usize>,
}

impl SessionRegistry {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            sessions: DashMap::new(),
            catalog,
            max_sessions: None,
        }
    }

    pub fn with_max_sessions(mut self, max_sessions: Option<usize>) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    /// Register a newly accepted stream and return its session id
    pub fn open(&self, sink: SessionSink) -> Result<SessionId, SessionError> {
        if let Some(max) = self.max_sessions {
            let active = self.sessions.len();
            if active >= max {
                return Err(SessionError::CapacityExceeded(active));
            }
        }

        let now = Instant::now();
        let channel = Arc::new(SessionChannel {
            sink,
            state: Mutex::new(SessionState {
                server: McpServer::new(Arc::clone(&self.catalog)),
                last_activity: now,
            }),
            opened_at: now,
        });

        loop {
            let id = SessionId::generate();
            match self.sessions.entry(id) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    slot.insert(channel);
                    info!("Session created: {}", id);
                    return Ok(id);
                }
            }
        }
    }

    pub fn lookup(&self, id: &SessionId) -> Option<SessionInfo> {
        self.sessions.get(id).map(|entry| SessionInfo {
            id: *entry.key(),
            opened_at: entry.value().opened_at,
        })
    }

    /// Remove a session and release its sink. Closing an unknown or
    /// already closed session is a no-op.
    pub fn close(&self, id: &SessionId) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            info!("Session closed: {}", id);
        }
        removed
    }

    /// Drop every open session, ending all streams
    pub fn close_all(&self) -> usize {
        let count = self.sessions.len();
        self.sessions.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Push a server event onto a session's stream
    pub async fn notify(&self, id: &SessionId, event: SessionEvent) -> Result<(), SessionError> {
        let channel = self.channel(id)?;
        if channel.sink.send(event).await.is_err() {
            self.close(id);
            return Err(SessionError::Transport("stream closed".to_string()));
        }
        Ok(())
    }

    /// Forward one JSON-RPC message into the session's protocol handler and
    /// write the response, if any, to its stream.
    pub async fn dispatch(&self, id: &SessionId, message: Value) -> Result<(), SessionError> {
        let channel = self.channel(id)?;

        let mut state = channel.state.lock().await;
        state.last_activity = Instant::now();

        let Some(response) = state.server.handle_message(message) else {
            return Ok(());
        };

        let payload = serde_json::to_string(&response)
            .map_err(|e| SessionError::Transport(format!("failed to encode response: {}", e)))?;
        debug!("Session {} response: {}", id, payload);

        if channel.sink.send(SessionEvent::Message(payload)).await.is_err() {
            drop(state);
            error!("Session {} stream is gone, closing", id);
            self.close(id);
            return Err(SessionError::Transport("stream closed".to_string()));
        }

        Ok(())
    }

    /// Close sessions with no activity for at least `timeout`.
    ///
    /// Sessions busy handling a message are never considered idle.
    pub fn reap_idle(&self, timeout: Duration) -> Vec<SessionId> {
        let idle: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|entry| match entry.value().state.try_lock() {
                Ok(state) => state.last_activity.elapsed() >= timeout,
                Err(_) => false,
            })
            .map(|entry| *entry.key())
            .collect();

        idle.into_iter().filter(|id| self.close(id)).collect()
    }

    fn channel(&self, id: &SessionId) -> Result<Arc<SessionChannel>, SessionError> {
        self.sessions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(SessionError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;
    use tokio::sync::mpsc;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(Catalog::load().unwrap()))
    }

    fn initialize() -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {"protocolVersion": "2024-11-05", "capabilities": {}}
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_open_yields_distinct_ids() {
        let registry = Arc::new(registry());
        let mut handles = Vec::new();
        let mut receivers = Vec::new();

        for _ in 0..64 {
            let (tx, rx) = mpsc::channel(4);
            receivers.push(rx);
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move { registry.open(tx).unwrap() }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }

        assert_eq!(ids.len(), 64);
        assert_eq!(registry.len(), 64);
    }

    #[tokio::test]
    async fn test_lookup_close_lookup() {
        let registry = registry();
        let (tx, _rx) = mpsc::channel(4);
        let id = registry.open(tx).unwrap();

        assert_eq!(registry.lookup(&id).map(|info| info.id), Some(id));
        assert!(registry.close(&id));
        assert!(registry.lookup(&id).is_none());

        // second close is a no-op
        assert!(!registry.close(&id));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_writes_response_to_stream() {
        let registry = registry();
        let (tx, mut rx) = mpsc::channel(4);
        let id = registry.open(tx).unwrap();

        registry.dispatch(&id, initialize()).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "message");
        let response: Value = serde_json::from_str(event.data()).unwrap();
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["serverInfo"]["name"], "opsera-devops-agent");
    }

    #[tokio::test]
    async fn test_dispatch_notification_writes_nothing() {
        let registry = registry();
        let (tx, mut rx) = mpsc::channel(4);
        let id = registry.open(tx).unwrap();

        let notification = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        registry.dispatch(&id, notification).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_after_close_is_invalid_session() {
        let registry = registry();
        let (tx, _rx) = mpsc::channel(4);
        let id = registry.open(tx).unwrap();
        registry.close(&id);

        let result = registry.dispatch(&id, initialize()).await;
        assert!(matches!(result, Err(SessionError::NotFound)));
        assert!(registry.lookup(&id).is_none());
    }

    #[tokio::test]
    async fn test_dispatch_does_not_touch_other_sessions() {
        let registry = registry();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        let a = registry.open(tx_a).unwrap();
        let b = registry.open(tx_b).unwrap();

        registry.dispatch(&a, initialize()).await.unwrap();
        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.try_recv().is_err());

        registry.close(&a);
        assert!(registry.dispatch(&a, initialize()).await.is_err());
        assert!(registry.lookup(&b).is_some());
        registry.dispatch(&b, initialize()).await.unwrap();
        assert!(rx_b.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_dispatch_to_dropped_stream_closes_session() {
        let registry = registry();
        let (tx, rx) = mpsc::channel(4);
        let id = registry.open(tx).unwrap();
        drop(rx);

        let result = registry.dispatch(&id, initialize()).await;
        assert!(matches!(result, Err(SessionError::Transport(_))));
        assert!(registry.lookup(&id).is_none());
    }

    #[tokio::test]
    async fn test_responses_keep_request_order() {
        let registry = registry();
        let (tx, mut rx) = mpsc::channel(16);
        let id = registry.open(tx).unwrap();

        registry.dispatch(&id, initialize()).await.unwrap();
        for n in 2..10 {
            let ping = json!({"jsonrpc": "2.0", "id": n, "method": "ping"});
            registry.dispatch(&id, ping).await.unwrap();
        }

        for expected in 1..10 {
            let event = rx.recv().await.unwrap();
            let response: Value = serde_json::from_str(event.data()).unwrap();
            assert_eq!(response["id"], expected);
        }
    }

    #[tokio::test]
    async fn test_capacity_limit() {
        let registry = registry().with_max_sessions(Some(2));
        let (tx1, _rx1) = mpsc::channel(1);
        let (tx2, _rx2) = mpsc::channel(1);
        let (tx3, _rx3) = mpsc::channel(1);

        let first = registry.open(tx1).unwrap();
        registry.open(tx2).unwrap();
        assert!(matches!(
            registry.open(tx3.clone()),
            Err(SessionError::CapacityExceeded(2))
        ));

        registry.close(&first);
        assert!(registry.open(tx3).is_ok());
    }

    #[tokio::test]
    async fn test_notify_and_close_all() {
        let registry = registry();
        let (tx, mut rx) = mpsc::channel(4);
        let id = registry.open(tx).unwrap();

        registry
            .notify(&id, SessionEvent::Endpoint("/message?sessionId=x".into()))
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().name(), "endpoint");

        assert_eq!(registry.close_all(), 1);
        // sink dropped with the entry, so the stream ends
        assert!(rx.recv().await.is_none());
        assert!(matches!(
            registry.notify(&id, SessionEvent::Message("{}".into())).await,
            Err(SessionError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_reap_idle() {
        let registry = registry();
        let (tx, _rx) = mpsc::channel(4);
        let id = registry.open(tx).unwrap();

        assert!(registry.reap_idle(Duration::from_secs(3600)).is_empty());
        assert_eq!(registry.reap_idle(Duration::ZERO), vec![id]);
        assert!(registry.is_empty());
    }
}
