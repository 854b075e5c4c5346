//! Per-session agent registry.
//!
//! Every connected user gets an independent [`Agent`] behind its own mutex;
//! holding the session lock for a whole chat/confirm/cancel call is what
//! keeps a session strictly sequential. Sessions share nothing but read-only
//! configuration.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use super::Agent;

pub type SessionHandle = Arc<Mutex<Agent>>;

/// Registry of live sessions, keyed by UUID.
pub struct SessionManager {
    sessions: Mutex<HashMap<Uuid, SessionHandle>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Register a freshly initialized agent and return its session id.
    pub async fn insert(&self, agent: Agent) -> Uuid {
        let id = Uuid::new_v4();
        let mut sessions = self.sessions.lock().await;
        sessions.insert(id, Arc::new(Mutex::new(agent)));
        tracing::info!(session = %id, total = sessions.len(), "session created");
        id
    }

    pub async fn get(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions.lock().await.get(id).cloned()
    }

    /// Drop a session. Any pending transaction dies with its agent.
    pub async fn remove(&self, id: &Uuid) -> bool {
        let removed = self.sessions.lock().await.remove(id).is_some();
        if removed {
            tracing::info!(session = %id, "session removed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
