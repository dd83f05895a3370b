//! Gateway opcodes and wire-format messages.

use serde::Deserialize;
use serde_json::Value;

use crate::coordinator::ActionResult;

// ---------------------------------------------------------------------------
// Opcodes
// ---------------------------------------------------------------------------

pub const OP_DISPATCH: u8 = 0;
pub const OP_HEARTBEAT: u8 = 1;
pub const OP_IDENTIFY: u8 = 2;
pub const OP_REQUEST: u8 = 4;
pub const OP_RESULT: u8 = 5;
pub const OP_HEARTBEAT_ACK: u8 = 6;

// ---------------------------------------------------------------------------
// Server → Client message
// ---------------------------------------------------------------------------

/// A message sent from the server to the client over WebSocket.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GatewayMessage {
    pub op: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    pub d: Value,
}

impl GatewayMessage {
    /// Build a DISPATCH message (op=0) carrying a coordinator event.
    pub fn dispatch(event_name: &str, seq: u64, data: Value) -> Self {
        Self {
            op: OP_DISPATCH,
            t: Some(event_name.to_string()),
            s: Some(seq),
            d: data,
        }
    }

    /// Build a RESULT message (op=5) answering a REQUEST.
    pub fn result(request_name: &str, result: &ActionResult, data: Option<Value>) -> Self {
        let mut d = serde_json::json!({
            "success": result.success,
            "message": result.message,
        });
        if let Some(data) = data {
            d["data"] = data;
        }
        Self {
            op: OP_RESULT,
            t: Some(request_name.to_string()),
            s: None,
            d,
        }
    }

    /// Build a HEARTBEAT_ACK message (op=6).
    pub fn heartbeat_ack(seq: u64) -> Self {
        Self {
            op: OP_HEARTBEAT_ACK,
            t: None,
            s: None,
            d: serde_json::json!({ "ack": seq }),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → Server message
// ---------------------------------------------------------------------------

/// A message received from the client over WebSocket.
#[derive(Debug, Deserialize)]
pub struct ClientMessage {
    pub op: u8,
    #[serde(default)]
    pub t: Option<String>,
    #[serde(default)]
    pub d: Value,
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct IdentifyPayload {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatPayload {
    #[serde(default)]
    pub seq: u64,
}

#[derive(Debug, Deserialize)]
pub struct SendMessagePayload {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinRoomPayload {
    pub room: String,
}

#[derive(Debug, Deserialize)]
pub struct SendFilePayload {
    pub filename: String,
    /// base64-encoded file content.
    pub data: String,
    /// `None` broadcasts to the sender's room.
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StartCallPayload {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct AnswerCallPayload {
    pub caller: String,
}

// ---------------------------------------------------------------------------
// Request names
// ---------------------------------------------------------------------------

/// `t` values accepted on a REQUEST frame.
pub struct RequestName;

impl RequestName {
    pub const SEND_MESSAGE: &'static str = "SEND_MESSAGE";
    pub const JOIN_ROOM: &'static str = "JOIN_ROOM";
    pub const REQUEST_ROOMS: &'static str = "REQUEST_ROOMS";
    pub const GET_USER_INFO: &'static str = "GET_USER_INFO";
    pub const SEND_FILE: &'static str = "SEND_FILE";
    pub const START_CALL: &'static str = "START_CALL";
    pub const ACCEPT_CALL: &'static str = "ACCEPT_CALL";
    pub const REJECT_CALL: &'static str = "REJECT_CALL";
    pub const END_CALL: &'static str = "END_CALL";
}
