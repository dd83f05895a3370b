use std::fmt;

/// Typed failure produced by the coordinator.
///
/// Structural errors (registry, rooms, calls) are surfaced to the offending
/// session only, as an `ERROR` event or a `{success, message}` result. They
/// never cross the transport boundary as a panic and never affect other
/// sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// The username is already taken by a connected session.
    DuplicateUsername(String),
    /// The named room does not exist.
    RoomNotFound(String),
    /// The named user is not connected.
    UserNotFound(String),
    /// A leading-`/` line that matches no known command.
    UnknownCommand(String),
    /// The file payload exceeds the configured maximum.
    FileTooLarge { size: u64, max: u64 },
    /// The payload could not be decoded (malformed base64, bad command args).
    InvalidPayload(String),
    /// A user tried to call themselves.
    SelfCall,
    /// The caller already has a ringing or active call.
    CallerBusy,
    /// The callee already has a ringing or active call.
    CalleeBusy(String),
    /// The requested call transition is not valid from the current state.
    InvalidCallTransition(String),
    /// A bounded I/O or delivery operation timed out.
    DeliveryTimeout(String),
    /// The file store failed for a non-timeout reason.
    StorageFailed(String),
}

impl CoordinatorError {
    /// Stable machine-readable code, included in ERROR events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateUsername(_) => "DUPLICATE_USERNAME",
            Self::RoomNotFound(_) => "ROOM_NOT_FOUND",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::UnknownCommand(_) => "UNKNOWN_COMMAND",
            Self::FileTooLarge { .. } => "FILE_TOO_LARGE",
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::SelfCall => "SELF_CALL",
            Self::CallerBusy => "CALLER_BUSY",
            Self::CalleeBusy(_) => "CALLEE_BUSY",
            Self::InvalidCallTransition(_) => "INVALID_CALL_TRANSITION",
            Self::DeliveryTimeout(_) => "DELIVERY_TIMEOUT",
            Self::StorageFailed(_) => "STORAGE_FAILED",
        }
    }
}

impl fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateUsername(name) => {
                write!(f, "Username '{name}' is already taken")
            }
            Self::RoomNotFound(room) => write!(f, "Room '{room}' not found"),
            Self::UserNotFound(name) => write!(f, "User '{name}' not found or offline"),
            Self::UnknownCommand(cmd) => {
                write!(f, "Unknown command '{cmd}'. Type /help for commands")
            }
            Self::FileTooLarge { size, max } => {
                write!(f, "File is {size} bytes; the limit is {max} bytes")
            }
            Self::InvalidPayload(reason) => write!(f, "Invalid payload: {reason}"),
            Self::SelfCall => write!(f, "You can't call yourself"),
            Self::CallerBusy => write!(f, "You are already in a call"),
            Self::CalleeBusy(name) => write!(f, "{name} is already in a call"),
            Self::InvalidCallTransition(reason) => write!(f, "Invalid call state: {reason}"),
            Self::DeliveryTimeout(what) => write!(f, "Timed out while {what}"),
            Self::StorageFailed(reason) => write!(f, "File storage failed: {reason}"),
        }
    }
}

impl std::error::Error for CoordinatorError {}
