//! Session registry: connection identity → username + current room.
//!
//! Single source of truth for presence. Room membership and call records
//! reference usernames but never own session lifetime; `unregister` returns
//! the vacated session so the coordinator can cascade cleanup.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::coordinator::rooms::LOBBY;
use crate::error::CoordinatorError;

/// State for a single connected client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque connection identifier, stable for the connection lifetime.
    pub connection_id: String,
    /// Unique while connected, immutable for the session lifetime.
    pub username: String,
    /// Always a valid room name.
    pub room: String,
}

/// Shared registry of all connected sessions.
///
/// Uses `DashMap` for shard-level concurrency and `parking_lot::Mutex` per
/// entry for non-poisoning, fast locking.
pub struct SessionRegistry {
    by_connection: Arc<DashMap<String, Mutex<Session>>>,
    /// username → connection_id index; insertion into this map is the
    /// uniqueness check for usernames.
    by_username: Arc<DashMap<String, String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            by_connection: Arc::new(DashMap::new()),
            by_username: Arc::new(DashMap::new()),
        }
    }

    /// Register a new session. New sessions start in the lobby.
    ///
    /// Fails with `DuplicateUsername` if the username is already active.
    pub fn register(
        &self,
        connection_id: &str,
        username: &str,
    ) -> Result<Session, CoordinatorError> {
        match self.by_username.entry(username.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(CoordinatorError::DuplicateUsername(username.to_string()));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(connection_id.to_string());
            }
        }

        let session = Session {
            connection_id: connection_id.to_string(),
            username: username.to_string(),
            room: LOBBY.to_string(),
        };
        self.by_connection
            .insert(connection_id.to_string(), Mutex::new(session.clone()));
        Ok(session)
    }

    /// Look up a session by connection id. Returns a snapshot.
    pub fn lookup(&self, connection_id: &str) -> Option<Session> {
        self.by_connection
            .get(connection_id)
            .map(|entry| entry.lock().clone())
    }

    /// Look up a session by username. Returns a snapshot.
    pub fn lookup_username(&self, username: &str) -> Option<Session> {
        let connection_id = self.by_username.get(username)?.clone();
        self.lookup(&connection_id)
    }

    /// Whether a username currently has a live session.
    pub fn is_connected(&self, username: &str) -> bool {
        self.by_username.contains_key(username)
    }

    /// Record a room move for the session.
    pub fn set_room(&self, connection_id: &str, room: &str) {
        if let Some(entry) = self.by_connection.get(connection_id) {
            entry.lock().room = room.to_string();
        }
    }

    /// Remove a session, returning the vacated state for cascading cleanup
    /// (room leave, call teardown). Idempotent: a second call returns `None`.
    pub fn unregister(&self, connection_id: &str) -> Option<Session> {
        let (_, entry) = self.by_connection.remove(connection_id)?;
        let session = entry.into_inner();
        self.by_username.remove(&session.username);
        Some(session)
    }

}
