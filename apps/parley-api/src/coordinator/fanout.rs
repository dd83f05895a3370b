//! Broadcast hub for dispatching coordinator events to connected sessions.
//!
//! Uses a single `tokio::sync::broadcast` channel. Each connected session
//! subscribes and filters events locally by recipient. Because every event of
//! one incoming action is queued on the same channel in generation order, a
//! given recipient observes them in that order; there is no cross-recipient
//! guarantee.

use std::sync::Arc;

use tokio::sync::broadcast;

use super::events::Event;

/// Capacity of the broadcast channel. Slow receivers that fall behind will
/// skip events (RecvError::Lagged).
const BROADCAST_CAPACITY: usize = 4096;

/// Who an event is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// A single user.
    User(String),
    /// Every current member of a room.
    Room(String),
    /// Every current member of a room except one user.
    RoomExcept { room: String, except: String },
    /// Every connected session.
    All,
}

impl Recipient {
    /// Whether a session identified by `username` in `room` should receive
    /// an event with this address.
    pub fn matches(&self, username: &str, room: &str) -> bool {
        match self {
            Self::User(target) => target == username,
            Self::Room(target) => target == room,
            Self::RoomExcept { room: target, except } => {
                target == room && except != username
            }
            Self::All => true,
        }
    }
}

/// An addressed event on the hub.
#[derive(Debug, Clone)]
pub struct OutboundEvent {
    pub recipient: Recipient,
    pub event: Event,
}

/// The global fanout hub. Cloneable — store in AppState.
#[derive(Clone)]
pub struct EventDispatcher {
    sender: broadcast::Sender<Arc<OutboundEvent>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { sender }
    }

    /// Subscribe to the hub. Each session should call this once to get its
    /// own receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<OutboundEvent>> {
        self.sender.subscribe()
    }

    /// Queue an event for delivery. Delivery to a recipient with no live
    /// session is a silent no-op.
    pub fn dispatch(&self, recipient: Recipient, event: Event) {
        // send() returns Err if there are no receivers — that's fine.
        let _ = self.sender.send(Arc::new(OutboundEvent { recipient, event }));
    }

    pub fn to_user(&self, username: &str, event: Event) {
        self.dispatch(Recipient::User(username.to_string()), event);
    }

    pub fn to_room(&self, room: &str, event: Event) {
        self.dispatch(Recipient::Room(room.to_string()), event);
    }

    pub fn to_room_except(&self, room: &str, except: &str, event: Event) {
        self.dispatch(
            Recipient::RoomExcept {
                room: room.to_string(),
                except: except.to_string(),
            },
            event,
        );
    }

    pub fn to_all(&self, event: Event) {
        self.dispatch(Recipient::All, event);
    }
}
