//! Room directory: room name → ordered member list.
//!
//! A single mutex serializes every membership mutation, so a join is an
//! atomic move: the user leaves their prior room and enters the new one under
//! one lock acquisition.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::CoordinatorError;

/// The lobby always exists and is never deleted, even when empty.
pub const LOBBY: &str = "lobby";

struct Directory {
    /// Room names in creation order; `LOBBY` is always index 0.
    order: Vec<String>,
    /// Members per room, in join order.
    members: HashMap<String, Vec<String>>,
}

/// Outcome of a join, carrying the membership snapshots the caller needs to
/// notify both affected rooms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Members of the joined room, after the join.
    pub members: Vec<String>,
    /// The room the user left, if any, with its remaining members.
    /// `None` when the join was an idempotent rejoin of the current room.
    pub left: Option<(String, Vec<String>)>,
}

pub struct RoomDirectory {
    inner: Mutex<Directory>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        let mut members = HashMap::new();
        members.insert(LOBBY.to_string(), Vec::new());
        Self {
            inner: Mutex::new(Directory {
                order: vec![LOBBY.to_string()],
                members,
            }),
        }
    }

    /// Move a user into `room`, creating it if absent and removing the user
    /// from their prior room. Rejoining the current room is a no-op that
    /// still returns the current membership.
    pub fn join(&self, username: &str, room: &str) -> JoinOutcome {
        let mut dir = self.inner.lock();

        if let Some(members) = dir.members.get(room) {
            if members.iter().any(|m| m == username) {
                return JoinOutcome {
                    members: members.clone(),
                    left: None,
                };
            }
        }

        let left = Self::remove_member(&mut dir, username);

        if !dir.members.contains_key(room) {
            dir.order.push(room.to_string());
            dir.members.insert(room.to_string(), Vec::new());
        }
        let members = dir
            .members
            .get_mut(room)
            .expect("room inserted above");
        members.push(username.to_string());
        let members = members.clone();

        JoinOutcome { members, left }
    }

    /// Remove a user from `room`. Deletes a non-lobby room that becomes
    /// empty. Returns the remaining members.
    pub fn leave(&self, username: &str, room: &str) -> Result<Vec<String>, CoordinatorError> {
        let mut dir = self.inner.lock();
        if !dir.members.contains_key(room) {
            return Err(CoordinatorError::RoomNotFound(room.to_string()));
        }
        match Self::remove_member(&mut dir, username) {
            Some((left_room, remaining)) if left_room == room => Ok(remaining),
            // The user wasn't in this room; membership is unchanged.
            _ => Ok(dir.members.get(room).cloned().unwrap_or_default()),
        }
    }

    /// Every room with its members, first-created-first; the lobby is always
    /// listed first.
    pub fn list_rooms(&self) -> Vec<(String, Vec<String>)> {
        let dir = self.inner.lock();
        dir.order
            .iter()
            .map(|name| (name.clone(), dir.members[name].clone()))
            .collect()
    }

    /// Members of a single room, in join order.
    pub fn members_of(&self, room: &str) -> Result<Vec<String>, CoordinatorError> {
        let dir = self.inner.lock();
        dir.members
            .get(room)
            .cloned()
            .ok_or_else(|| CoordinatorError::RoomNotFound(room.to_string()))
    }

    /// Remove `username` from whichever room holds them, deleting a non-lobby
    /// room that becomes empty. Returns the room and its remaining members.
    fn remove_member(dir: &mut Directory, username: &str) -> Option<(String, Vec<String>)> {
        let room = dir
            .members
            .iter()
            .find(|(_, members)| members.iter().any(|m| m == username))
            .map(|(name, _)| name.clone())?;

        let members = dir.members.get_mut(&room).expect("room found above");
        members.retain(|m| m != username);
        let remaining = members.clone();

        if remaining.is_empty() && room != LOBBY {
            dir.members.remove(&room);
            dir.order.retain(|name| name != &room);
        }

        Some((room, remaining))
    }
}
