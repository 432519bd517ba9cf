//! Session status registry
//!
//! Shared map of per-session states. Sessions keep their entry current;
//! the orchestrator reads it to report the last known state of sessions
//! it had to force-stop after the grace period.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::session::TerminalReason;

/// Last known state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Created, not yet browsing (waiting out the staggered start)
    Starting,
    /// In the traversal loop at the given depth
    Running { depth: u32 },
    /// Reached a terminal state
    Terminated { reason: TerminalReason },
}

/// Registry entry: which user owns the session and where it got to.
#[derive(Debug, Clone, Copy)]
pub struct SessionEntry {
    pub user: usize,
    pub status: SessionStatus,
}

/// Cheaply cloneable handle to the shared status map.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session in `Starting` state.
    pub async fn insert(&self, id: &str, user: usize) {
        self.inner.write().await.insert(
            id.to_string(),
            SessionEntry {
                user,
                status: SessionStatus::Starting,
            },
        );
    }

    /// Update a session's status, keeping its user index.
    pub async fn set_status(&self, id: &str, status: SessionStatus) {
        let mut map = self.inner.write().await;
        map.entry(id.to_string())
            .and_modify(|entry| entry.status = status)
            .or_insert(SessionEntry { user: 0, status });
    }

    /// Get a session's entry
    pub async fn get(&self, id: &str) -> Option<SessionEntry> {
        self.inner.read().await.get(id).copied()
    }

    /// Snapshot of all entries
    pub async fn snapshot(&self) -> HashMap<String, SessionEntry> {
        self.inner.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_status_transitions_keep_user() {
        let registry = SessionRegistry::new();
        registry.insert("abc-0", 0).await;
        registry
            .set_status("abc-0", SessionStatus::Running { depth: 2 })
            .await;

        let entry = registry.get("abc-0").await.unwrap();
        assert_eq!(entry.user, 0);
        assert_eq!(entry.status, SessionStatus::Running { depth: 2 });
    }

    #[tokio::test]
    async fn test_snapshot_is_a_copy() {
        let registry = SessionRegistry::new();
        registry.insert("a-1", 1).await;
        let snap = registry.snapshot().await;
        registry
            .set_status("a-1", SessionStatus::Terminated { reason: TerminalReason::Cancelled })
            .await;
        assert_eq!(snap.get("a-1").unwrap().status, SessionStatus::Starting);
    }
}
