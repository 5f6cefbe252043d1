//! Session identifiers and the server-side session table (spec.md §3, §4.C).

use std::collections::HashMap;

use serde_derive::{Deserialize, Serialize};

/// Integer identifier assigned by the coordinator from a monotonic counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub i64);

/// Microsecond timestamp stamped by the leader at submission time and
/// reused, verbatim, by every replica's apply — never local wall-clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn plus_micros(self, micros: i64) -> Timestamp {
        Timestamp(self.0 + micros)
    }
}

/// Server-side record of a live client session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    /// Apply-time timestamp past which the session is considered expired.
    pub expiry: Timestamp,
}

/// The session table plus the next-session-id counter, held by the
/// coordinator under its single exclusive lock.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<SessionId, Session>,
    next_id: i64,
}

impl SessionTable {
    pub fn new() -> SessionTable {
        SessionTable {
            sessions: HashMap::new(),
            next_id: 0,
        }
    }

    /// Allocates a new session id and records its initial expiry.
    pub fn start(&mut self, expiry: Timestamp) -> SessionId {
        let id = SessionId(self.next_id);
        self.next_id += 1;
        self.sessions.insert(id, Session { id, expiry });
        id
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Refreshes a live session's deadline. No-op if the session is absent.
    pub fn refresh(&mut self, id: SessionId, expiry: Timestamp) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.expiry = expiry;
        }
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Removes a session unconditionally, returning whether it was present.
    pub fn remove(&mut self, id: SessionId) -> bool {
        self.sessions.remove(&id).is_some()
    }

    /// Returns the ids of every session whose expiry is strictly before
    /// `now`, i.e. the sessions the reaper must clean up on this apply.
    pub fn expired_as_of(&self, now: Timestamp) -> Vec<SessionId> {
        self.sessions
            .values()
            .filter(|s| s.expiry < now)
            .map(|s| s.id)
            .collect()
    }
}
