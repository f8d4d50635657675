use axum::extract::FromRef;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::config::ServerConfig;
use crate::session::SessionRegistry;

/// State shared by every handler. Built once by the composition root.
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<ServerConfig>,
    pub catalog: Arc<Catalog>,
    pub sessions: Arc<SessionRegistry>,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(config: ServerConfig, catalog: Arc<Catalog>) -> Self {
        let sessions = SessionRegistry::new(Arc::clone(&catalog))
            .with_max_sessions(config.max_sessions);

        Self {
            config: Arc::new(config),
            catalog,
            sessions: Arc::new(sessions),
            started_at: Utc::now(),
        }
    }
}

impl FromRef<ServerState> for Arc<Catalog> {
    fn from_ref(input: &ServerState) -> Self {
        input.catalog.clone()
    }
}

impl FromRef<ServerState> for Arc<SessionRegistry> {
    fn from_ref(input: &ServerState) -> Self {
        input.sessions.clone()
    }
}
