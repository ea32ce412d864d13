//! Process-wide live-session map.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;
use tracing::debug;

/// Metadata kept per live session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub connected_at: Instant,
}

/// Concurrent map of live sessions, keyed by session id.
///
/// Inserted at transport accept, removed at transport termination. The
/// admin surface only reads the size.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    next_id: AtomicU64,
    sessions: RwLock<HashMap<u64, SessionInfo>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh session id and record the session as live.
    pub fn register(&self) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.sessions.write().insert(
            id,
            SessionInfo {
                connected_at: Instant::now(),
            },
        );
        debug!(session_id = id, "session registered");
        id
    }

    /// Remove a session; removing an unknown id is a no-op.
    pub fn deregister(&self, id: u64) {
        if self.sessions.write().remove(&id).is_some() {
            debug!(session_id = id, "session deregistered");
        }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.sessions.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
