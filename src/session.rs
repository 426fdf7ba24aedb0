//! Request-scoped snapshot store.
//!
//! Bridges a retrieval and a later filter request without a process-wide
//! "last snapshot" slot: callers key everything by their own session id.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Result, SnapshotError};
use crate::models::RepositorySnapshot;

#[derive(Debug, Clone)]
pub struct Session {
    pub snapshot: Arc<RepositorySnapshot>,
    pub filtered: Option<Arc<RepositorySnapshot>>,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly retrieved snapshot, replacing the session's previous
    /// snapshot and discarding its filtered result.
    pub fn insert(&self, session_id: &str, snapshot: RepositorySnapshot) -> Arc<RepositorySnapshot> {
        let snapshot = Arc::new(snapshot);
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.insert(
            session_id.to_string(),
            Session {
                snapshot: Arc::clone(&snapshot),
                filtered: None,
            },
        );
        snapshot
    }

    pub fn snapshot(&self, session_id: &str) -> Result<Arc<RepositorySnapshot>> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions
            .get(session_id)
            .map(|s| Arc::clone(&s.snapshot))
            .ok_or_else(|| SnapshotError::SessionNotFound(session_id.to_string()))
    }

    /// Last filtered snapshot of the session, if it has been filtered.
    pub fn filtered(&self, session_id: &str) -> Result<Option<Arc<RepositorySnapshot>>> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions
            .get(session_id)
            .map(|s| s.filtered.clone())
            .ok_or_else(|| SnapshotError::SessionNotFound(session_id.to_string()))
    }

    pub fn record_filtered(
        &self,
        session_id: &str,
        filtered: RepositorySnapshot,
    ) -> Result<Arc<RepositorySnapshot>> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| SnapshotError::SessionNotFound(session_id.to_string()))?;
        let filtered = Arc::new(filtered);
        session.filtered = Some(Arc::clone(&filtered));
        Ok(filtered)
    }

    pub fn remove(&self, session_id: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
