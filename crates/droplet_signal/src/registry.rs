//! Client registry — the authoritative table of initialized sessions.
//!
//! Insertion-ordered, in-memory only, and the sole owner of membership
//! mutation: every add and remove goes through here, and callers trigger
//! the resulting broadcasts themselves. Queries always reflect the
//! current state at call time; nothing is snapshotted or versioned.

use uuid::Uuid;

use crate::session::ClientSession;

/// Registry of all initialized sessions.
#[derive(Default)]
pub struct ClientRegistry {
    sessions: Vec<ClientSession>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: Vec::new(),
        }
    }

    /// Append a session. Preconditions (caller-guaranteed): the session is
    /// initialized and not already present.
    pub fn register(&mut self, session: ClientSession) {
        self.sessions.push(session);
    }

    /// Remove a session by its connection handle, returning it so the
    /// caller can decide whether to force-close the transport. Removing an
    /// absent session is a no-op returning `None`.
    pub fn unregister(&mut self, conn_id: Uuid) -> Option<ClientSession> {
        let pos = self.sessions.iter().position(|s| s.conn_id == conn_id)?;
        Some(self.sessions.remove(pos))
    }

    /// Whether a session with this connection handle is registered.
    pub fn contains(&self, conn_id: Uuid) -> bool {
        self.sessions.iter().any(|s| s.conn_id == conn_id)
    }

    /// Get a session by connection handle.
    pub fn get(&self, conn_id: Uuid) -> Option<&ClientSession> {
        self.sessions.iter().find(|s| s.conn_id == conn_id)
    }

    /// Get a mutable session by connection handle.
    pub fn get_mut(&mut self, conn_id: Uuid) -> Option<&mut ClientSession> {
        self.sessions.iter_mut().find(|s| s.conn_id == conn_id)
    }

    /// First session matching the predicate, in insertion order.
    pub fn find(&self, predicate: impl Fn(&ClientSession) -> bool) -> Option<&ClientSession> {
        self.sessions.iter().find(|s| predicate(s))
    }

    /// All sessions matching the predicate, in insertion order.
    pub fn filter(&self, predicate: impl Fn(&ClientSession) -> bool) -> Vec<&ClientSession> {
        self.sessions.iter().filter(|s| predicate(s)).collect()
    }

    /// Full session list, for supervisory sweeps.
    pub fn all(&self) -> &[ClientSession] {
        &self.sessions
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
