//! The coordinator: single authoritative state for sessions, rooms, and
//! calls, with event fan-out to connected clients.
//!
//! Every inbound operation mutates state through one of the serialized
//! components and pushes the resulting events through the dispatcher.
//! Structural errors go back to the offending session only; nothing here
//! panics across the transport boundary.

pub mod calls;
pub mod commands;
pub mod events;
pub mod fanout;
pub mod files;
pub mod registry;
pub mod rooms;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::error::CoordinatorError;
use crate::storage::FileStore;
use parley_common::id::{prefix, prefixed_ulid};

use calls::CallRegistry;
use commands::Command;
use events::{Event, FileReceivedPayload, MessagePayload};
use fanout::EventDispatcher;
use files::FileTransferCoordinator;
use registry::{Session, SessionRegistry};
use rooms::{RoomDirectory, LOBBY};

const HELP_TEXT: &str = "Commands: /pm <user> <message> | /join <room> | /rooms | /help";

/// Result value returned by file and call operations. These never raise to
/// the transport layer; every failure is converted to `success = false`.
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl ToString) -> Self {
        Self {
            success: false,
            message: message.to_string(),
        }
    }
}

pub struct Coordinator {
    sessions: SessionRegistry,
    rooms: RoomDirectory,
    calls: CallRegistry,
    files: FileTransferCoordinator,
    dispatcher: EventDispatcher,
}

impl Coordinator {
    pub fn new(store: Arc<dyn FileStore>, max_file_bytes: u64, persist_timeout: Duration) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            rooms: RoomDirectory::new(),
            calls: CallRegistry::new(),
            files: FileTransferCoordinator::new(store, max_file_bytes, persist_timeout),
            dispatcher: EventDispatcher::new(),
        }
    }

    /// The fan-out hub; each transport session subscribes once.
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    /// Register a new connection under `username` and place it in the lobby.
    pub fn connect(&self, username: &str) -> Result<Session, CoordinatorError> {
        let connection_id = prefixed_ulid(prefix::CONNECTION);
        let session = self.sessions.register(&connection_id, username)?;
        let outcome = self.rooms.join(username, LOBBY);

        tracing::info!(%connection_id, %username, "session connected");

        self.dispatcher.to_room_except(
            LOBBY,
            username,
            Event::Message(MessagePayload::notification(format!("{username} joined."))),
        );
        self.broadcast_room_state(LOBBY, &outcome.members);
        self.broadcast_rooms_list();
        Ok(session)
    }

    /// Current username and room for a connection.
    pub fn get_user_info(&self, connection_id: &str) -> Option<Session> {
        self.sessions.lookup(connection_id)
    }

    /// Tear down a connection: registry removal, call teardown, and room
    /// leave run synchronously as one unit. Safe to call twice.
    pub fn disconnect(&self, connection_id: &str) {
        let Some(session) = self.sessions.unregister(connection_id) else {
            return;
        };
        let username = &session.username;

        if let Some(record) = self.calls.teardown(username) {
            let partner = record.partner_of(username);
            self.dispatcher.to_user(
                partner,
                Event::CallEnded {
                    message: format!("{username} disconnected"),
                },
            );
        }

        if let Ok(remaining) = self.rooms.leave(username, &session.room) {
            self.dispatcher.to_room(
                &session.room,
                Event::Message(MessagePayload::notification(format!("{username} left."))),
            );
            self.broadcast_room_state(&session.room, &remaining);
        }
        self.broadcast_rooms_list();

        tracing::info!(%connection_id, %username, "session disconnected");
    }

    // -----------------------------------------------------------------------
    // Messaging
    // -----------------------------------------------------------------------

    /// Route one raw text line from a client.
    pub fn send_message(&self, connection_id: &str, line: &str) {
        let Some(session) = self.sessions.lookup(connection_id) else {
            return;
        };
        if line.trim().is_empty() {
            return;
        }

        match commands::parse(line) {
            Ok(Command::Broadcast(text)) => {
                // The sender is included in the fan-out so every room copy,
                // their own included, is authoritative.
                self.dispatcher.to_room(
                    &session.room,
                    Event::Message(MessagePayload::chat(&session.username, text)),
                );
            }
            Ok(Command::Private { to, text }) => self.send_private(&session, to, text),
            Ok(Command::Rooms) => {
                self.dispatcher
                    .to_user(&session.username, Event::RoomsList(self.rooms.list_rooms()));
            }
            Ok(Command::Join(room)) => {
                self.join_room(connection_id, room);
            }
            Ok(Command::Help) => {
                self.dispatcher.to_user(
                    &session.username,
                    Event::Message(MessagePayload::notification(HELP_TEXT)),
                );
            }
            Err(err) => self.error_to(&session.username, &err),
        }
    }

    /// Private messages go to the target only, plus an echo to the sender so
    /// their UI shows the sent copy. Never broadcast to the room.
    fn send_private(&self, session: &Session, to: &str, text: &str) {
        if !self.sessions.is_connected(to) {
            self.error_to(
                &session.username,
                &CoordinatorError::UserNotFound(to.to_string()),
            );
            return;
        }
        let payload = MessagePayload::private(&session.username, text);
        self.dispatcher
            .to_user(to, Event::Message(payload.clone()));
        if to != session.username {
            self.dispatcher
                .to_user(&session.username, Event::Message(payload));
        }
    }

    // -----------------------------------------------------------------------
    // Rooms
    // -----------------------------------------------------------------------

    /// Move the connection into `room`, creating it if needed. Returns the
    /// membership of the joined room.
    pub fn join_room(&self, connection_id: &str, room: &str) -> Option<Vec<String>> {
        let session = self.sessions.lookup(connection_id)?;
        let room = room.trim();
        if room.is_empty() {
            self.error_to(
                &session.username,
                &CoordinatorError::InvalidPayload("room name must not be empty".to_string()),
            );
            return None;
        }

        let outcome = self.rooms.join(&session.username, room);
        // Update presence before dispatching so the mover's session filters
        // incoming events against the new room.
        self.sessions.set_room(connection_id, room);

        match &outcome.left {
            Some((old_room, old_members)) => {
                tracing::debug!(username = %session.username, from = %old_room, to = %room, "room move");
                self.dispatcher.to_room(
                    old_room,
                    Event::Message(MessagePayload::notification(format!(
                        "{} left the room.",
                        session.username
                    ))),
                );
                self.broadcast_room_state(old_room, old_members);

                self.dispatcher.to_room_except(
                    room,
                    &session.username,
                    Event::Message(MessagePayload::notification(format!(
                        "{} joined the room.",
                        session.username
                    ))),
                );
                self.broadcast_room_state(room, &outcome.members);
                self.broadcast_rooms_list();
            }
            // Rejoining the current room: no membership change, but the
            // requester still gets the current state back.
            None => {
                self.dispatcher.to_user(
                    &session.username,
                    Event::RoomInfo {
                        room: room.to_string(),
                        members: outcome.members.clone(),
                    },
                );
            }
        }
        Some(outcome.members)
    }

    /// Directory snapshot, to the requester only.
    pub fn request_rooms_list(&self, connection_id: &str) {
        if let Some(session) = self.sessions.lookup(connection_id) {
            self.dispatcher
                .to_user(&session.username, Event::RoomsList(self.rooms.list_rooms()));
        }
    }

    // -----------------------------------------------------------------------
    // File transfer
    // -----------------------------------------------------------------------

    /// Hand off a base64-encoded file to one user or the sender's room.
    pub async fn send_file_data(
        &self,
        connection_id: &str,
        filename: &str,
        payload_b64: &str,
        target: Option<&str>,
    ) -> ActionResult {
        let Some(session) = self.sessions.lookup(connection_id) else {
            return ActionResult::fail("Not connected");
        };

        if let Some(target) = target {
            if !self.sessions.is_connected(target) {
                return ActionResult::fail(CoordinatorError::UserNotFound(target.to_string()));
            }
        }

        let transfer = match self.files.initiate(filename, payload_b64).await {
            Ok(transfer) => transfer,
            Err(err) => {
                tracing::warn!(username = %session.username, %filename, %err, "file transfer rejected");
                return ActionResult::fail(err);
            }
        };

        let payload = FileReceivedPayload {
            sender: session.username.clone(),
            filename: transfer.filename.clone(),
            filesize: transfer.size,
            filepath: transfer.stored.path.clone(),
            file_url: transfer.stored.url.clone(),
            is_image: transfer.is_image,
        };

        match target {
            Some(target) => {
                self.dispatcher
                    .to_user(target, Event::FileReceived(payload));
            }
            None => {
                self.dispatcher.to_room_except(
                    &session.room,
                    &session.username,
                    Event::FileReceived(payload),
                );
            }
        }

        tracing::info!(
            username = %session.username,
            %filename,
            size = transfer.size,
            target = target.unwrap_or("<room>"),
            "file forwarded"
        );
        ActionResult::ok(format!("File '{filename}' sent successfully"))
    }

    // -----------------------------------------------------------------------
    // Call signaling
    // -----------------------------------------------------------------------

    pub fn start_call(&self, connection_id: &str, callee: &str) -> ActionResult {
        let Some(session) = self.sessions.lookup(connection_id) else {
            return ActionResult::fail("Not connected");
        };
        if !self.sessions.is_connected(callee) {
            return ActionResult::fail(CoordinatorError::UserNotFound(callee.to_string()));
        }
        match self.calls.start(&session.username, callee) {
            Ok(()) => {
                self.dispatcher.to_user(
                    callee,
                    Event::CallIncoming {
                        caller: session.username.clone(),
                    },
                );
                tracing::debug!(caller = %session.username, %callee, "call ringing");
                ActionResult::ok(format!("Calling {callee}..."))
            }
            Err(err) => ActionResult::fail(err),
        }
    }

    pub fn accept_call(&self, connection_id: &str, caller: &str) -> ActionResult {
        let Some(session) = self.sessions.lookup(connection_id) else {
            return ActionResult::fail("Not connected");
        };
        match self.calls.accept(&session.username, caller) {
            Ok(()) => {
                self.dispatcher.to_user(
                    caller,
                    Event::CallStarted {
                        partner: session.username.clone(),
                    },
                );
                self.dispatcher.to_user(
                    &session.username,
                    Event::CallStarted {
                        partner: caller.to_string(),
                    },
                );
                tracing::debug!(%caller, callee = %session.username, "call active");
                ActionResult::ok(format!("Call accepted with {caller}"))
            }
            Err(err) => ActionResult::fail(err),
        }
    }

    /// Reject a ringing call. The caller is notified; the callee already
    /// knows, so no event is sent back to them.
    pub fn reject_call(&self, connection_id: &str, caller: &str) -> ActionResult {
        let Some(session) = self.sessions.lookup(connection_id) else {
            return ActionResult::fail("Not connected");
        };
        match self.calls.reject(&session.username, caller) {
            Ok(()) => {
                self.dispatcher.to_user(
                    caller,
                    Event::CallEnded {
                        message: format!("{} rejected the call", session.username),
                    },
                );
                ActionResult::ok("Call rejected")
            }
            Err(err) => ActionResult::fail(err),
        }
    }

    pub fn end_call(&self, connection_id: &str) -> ActionResult {
        let Some(session) = self.sessions.lookup(connection_id) else {
            return ActionResult::fail("Not connected");
        };
        match self.calls.end(&session.username) {
            Ok(partner) => {
                let message = format!("Call ended by {}", session.username);
                self.dispatcher.to_user(
                    &partner,
                    Event::CallEnded {
                        message: message.clone(),
                    },
                );
                self.dispatcher
                    .to_user(&session.username, Event::CallEnded { message });
                ActionResult::ok("Call ended")
            }
            Err(err) => ActionResult::fail(err),
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn broadcast_room_state(&self, room: &str, members: &[String]) {
        self.dispatcher.to_room(
            room,
            Event::RoomInfo {
                room: room.to_string(),
                members: members.to_vec(),
            },
        );
        self.dispatcher
            .to_room(room, Event::UsersList(members.to_vec()));
    }

    fn broadcast_rooms_list(&self) {
        self.dispatcher.to_all(Event::RoomsList(self.rooms.list_rooms()));
    }

    fn error_to(&self, username: &str, err: &CoordinatorError) {
        tracing::debug!(%username, code = err.code(), %err, "operation rejected");
        self.dispatcher.to_user(username, Event::error(err));
    }
}
