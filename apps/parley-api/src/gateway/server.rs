//! WebSocket upgrade handler and per-connection event loop.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio::time;

use crate::coordinator::fanout::OutboundEvent;
use crate::coordinator::ActionResult;
use crate::AppState;

use super::events::{
    AnswerCallPayload, ClientMessage, GatewayMessage, HeartbeatPayload, IdentifyPayload,
    JoinRoomPayload, RequestName, SendFilePayload, SendMessagePayload, StartCallPayload,
    OP_HEARTBEAT, OP_IDENTIFY, OP_REQUEST,
};
use super::session::GatewaySession;

/// Close codes (4000-range for application-level).
const CLOSE_UNKNOWN_ERROR: u16 = 4000;
const CLOSE_UNKNOWN_OPCODE: u16 = 4001;
const CLOSE_NOT_AUTHENTICATED: u16 = 4003;
const CLOSE_AUTH_FAILED: u16 = 4004;
const CLOSE_SESSION_TIMEOUT: u16 = 4009;

/// Timeout for receiving IDENTIFY after connection (seconds).
const IDENTIFY_TIMEOUT_SECS: u64 = 10;

/// Heartbeat interval sent to clients in the READY payload (ms).
pub const HEARTBEAT_INTERVAL_MS: u64 = 41250;

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Step 1: Wait for IDENTIFY within the timeout.
    let identify_result = time::timeout(Duration::from_secs(IDENTIFY_TIMEOUT_SECS), async {
        while let Some(msg) = ws_rx.next().await {
            let msg = match msg {
                Ok(m) => m,
                Err(e) => {
                    tracing::debug!(?e, "ws read error during identify");
                    return Err("read error");
                }
            };

            let text = match msg {
                Message::Text(t) => t,
                Message::Close(_) => return Err("client closed"),
                Message::Ping(_) | Message::Pong(_) => continue,
                _ => continue,
            };

            let client_msg: ClientMessage = match serde_json::from_str(&text) {
                Ok(m) => m,
                Err(_) => return Err("invalid json"),
            };

            if client_msg.op != OP_IDENTIFY {
                return Err("expected identify");
            }
            let payload: IdentifyPayload =
                serde_json::from_value(client_msg.d).map_err(|_| "invalid identify payload")?;
            return Ok(payload);
        }
        Err("connection closed before identify")
    })
    .await;

    let payload = match identify_result {
        Ok(Ok(payload)) => payload,
        Ok(Err(reason)) => {
            tracing::debug!(%reason, "identify handshake failed");
            let _ = send_close(&mut ws_tx, CLOSE_NOT_AUTHENTICATED, reason).await;
            return;
        }
        Err(_timeout) => {
            let _ = send_close(&mut ws_tx, CLOSE_SESSION_TIMEOUT, "Handshake timeout").await;
            return;
        }
    };

    let username = payload.username.trim().to_string();
    if username.is_empty() {
        let _ = send_close(&mut ws_tx, CLOSE_AUTH_FAILED, "Username must not be empty").await;
        return;
    }

    // Subscribe before registering so the session sees its own join events.
    let broadcast_rx = state.coordinator.dispatcher().subscribe();

    let coordinator_session = match state.coordinator.connect(&username) {
        Ok(session) => session,
        Err(err) => {
            tracing::debug!(%username, %err, "identify rejected");
            let _ = send_close(&mut ws_tx, CLOSE_AUTH_FAILED, &err.to_string()).await;
            return;
        }
    };

    let session = Arc::new(GatewaySession::new(
        coordinator_session.connection_id.clone(),
        coordinator_session.username.clone(),
    ));

    tracing::info!(
        connection_id = %session.connection_id,
        username = %session.username,
        "gateway session established"
    );

    // Send READY.
    let ready = GatewayMessage::dispatch(
        "READY",
        session.next_seq(),
        serde_json::json!({
            "connection_id": session.connection_id,
            "username": session.username,
            "room": coordinator_session.room,
            "heartbeat_interval": HEARTBEAT_INTERVAL_MS,
        }),
    );
    if send_message(&mut ws_tx, &ready).await.is_err() {
        state.coordinator.disconnect(&session.connection_id);
        return;
    }

    run_session(&state, session.clone(), ws_tx, ws_rx, broadcast_rx).await;

    // Socket teardown, whatever the cause, cascades cleanup synchronously.
    state.coordinator.disconnect(&session.connection_id);

    tracing::info!(
        connection_id = %session.connection_id,
        username = %session.username,
        "gateway session ended"
    );
}

/// Main session event loop: read client frames, forward coordinator events,
/// enforce the heartbeat.
async fn run_session(
    state: &AppState,
    session: Arc<GatewaySession>,
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut ws_rx: SplitStream<WebSocket>,
    mut broadcast_rx: broadcast::Receiver<Arc<OutboundEvent>>,
) {
    // Client must heartbeat within 1.5× the advertised interval.
    let heartbeat_deadline = Duration::from_millis(HEARTBEAT_INTERVAL_MS * 3 / 2);
    let mut heartbeat_timer = time::interval(heartbeat_deadline);
    heartbeat_timer.tick().await; // First tick fires immediately; skip it.
    let mut got_heartbeat = true;

    loop {
        tokio::select! {
            // Client sends us a frame.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let client_msg: ClientMessage = match serde_json::from_str(&text) {
                            Ok(m) => m,
                            Err(_) => {
                                let _ = send_close(&mut ws_tx, CLOSE_UNKNOWN_ERROR, "Invalid JSON").await;
                                break;
                            }
                        };

                        match client_msg.op {
                            OP_HEARTBEAT => {
                                got_heartbeat = true;
                                let payload: HeartbeatPayload =
                                    serde_json::from_value(client_msg.d).unwrap_or(HeartbeatPayload { seq: 0 });
                                if send_message(&mut ws_tx, &GatewayMessage::heartbeat_ack(payload.seq)).await.is_err() {
                                    break;
                                }
                            }
                            OP_REQUEST => {
                                let name = client_msg.t.unwrap_or_default();
                                let reply = handle_request(state, &session, &name, client_msg.d).await;
                                if send_message(&mut ws_tx, &reply).await.is_err() {
                                    break;
                                }
                            }
                            OP_IDENTIFY => {
                                let _ = send_close(&mut ws_tx, CLOSE_UNKNOWN_ERROR, "Already identified").await;
                                break;
                            }
                            _ => {
                                let _ = send_close(&mut ws_tx, CLOSE_UNKNOWN_OPCODE, "Unknown opcode").await;
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, connection_id = %session.connection_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            // Coordinator event from the fanout hub.
            result = broadcast_rx.recv() => {
                match result {
                    Ok(outbound) => {
                        // Filter against live presence so a room move takes
                        // effect for events still in flight.
                        let Some(current) = state.coordinator.get_user_info(&session.connection_id) else {
                            break;
                        };
                        if !outbound.recipient.matches(&current.username, &current.room) {
                            continue;
                        }

                        let msg = GatewayMessage::dispatch(
                            outbound.event.name(),
                            session.next_seq(),
                            outbound.event.data(),
                        );
                        if send_message(&mut ws_tx, &msg).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(
                            connection_id = %session.connection_id,
                            skipped = n,
                            "gateway session lagged behind broadcast"
                        );
                        // Continue — we just drop the missed events.
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }

            // Heartbeat timeout check.
            _ = heartbeat_timer.tick() => {
                if !got_heartbeat {
                    tracing::debug!(
                        connection_id = %session.connection_id,
                        "heartbeat timeout, closing connection"
                    );
                    let _ = send_close(&mut ws_tx, CLOSE_SESSION_TIMEOUT, "Heartbeat timeout").await;
                    break;
                }
                got_heartbeat = false;
            }
        }
    }
}

/// Dispatch one REQUEST frame to the coordinator and build the RESULT.
async fn handle_request(
    state: &AppState,
    session: &GatewaySession,
    name: &str,
    data: serde_json::Value,
) -> GatewayMessage {
    let coordinator = &state.coordinator;
    let connection_id = &session.connection_id;

    match name {
        RequestName::SEND_MESSAGE => match serde_json::from_value::<SendMessagePayload>(data) {
            Ok(payload) => {
                coordinator.send_message(connection_id, &payload.text);
                GatewayMessage::result(name, &ActionResult::ok("routed"), None)
            }
            Err(_) => bad_payload(name),
        },
        RequestName::JOIN_ROOM => match serde_json::from_value::<JoinRoomPayload>(data) {
            Ok(payload) => match coordinator.join_room(connection_id, &payload.room) {
                Some(_) => GatewayMessage::result(
                    name,
                    &ActionResult::ok(format!("Joined {}", payload.room.trim())),
                    None,
                ),
                None => GatewayMessage::result(name, &ActionResult::fail("Invalid room name"), None),
            },
            Err(_) => bad_payload(name),
        },
        RequestName::REQUEST_ROOMS => {
            coordinator.request_rooms_list(connection_id);
            GatewayMessage::result(name, &ActionResult::ok("requested"), None)
        }
        RequestName::GET_USER_INFO => match coordinator.get_user_info(connection_id) {
            Some(info) => GatewayMessage::result(
                name,
                &ActionResult::ok(""),
                Some(serde_json::json!({
                    "username": info.username,
                    "room": info.room,
                })),
            ),
            None => GatewayMessage::result(name, &ActionResult::fail("Not connected"), None),
        },
        RequestName::SEND_FILE => match serde_json::from_value::<SendFilePayload>(data) {
            Ok(payload) => {
                let result = coordinator
                    .send_file_data(
                        connection_id,
                        &payload.filename,
                        &payload.data,
                        payload.target.as_deref(),
                    )
                    .await;
                GatewayMessage::result(name, &result, None)
            }
            Err(_) => bad_payload(name),
        },
        RequestName::START_CALL => match serde_json::from_value::<StartCallPayload>(data) {
            Ok(payload) => {
                let result = coordinator.start_call(connection_id, &payload.username);
                GatewayMessage::result(name, &result, None)
            }
            Err(_) => bad_payload(name),
        },
        RequestName::ACCEPT_CALL => match serde_json::from_value::<AnswerCallPayload>(data) {
            Ok(payload) => {
                let result = coordinator.accept_call(connection_id, &payload.caller);
                GatewayMessage::result(name, &result, None)
            }
            Err(_) => bad_payload(name),
        },
        RequestName::REJECT_CALL => match serde_json::from_value::<AnswerCallPayload>(data) {
            Ok(payload) => {
                let result = coordinator.reject_call(connection_id, &payload.caller);
                GatewayMessage::result(name, &result, None)
            }
            Err(_) => bad_payload(name),
        },
        RequestName::END_CALL => {
            let result = coordinator.end_call(connection_id);
            GatewayMessage::result(name, &result, None)
        }
        other => {
            tracing::debug!(request = %other, "unknown request type");
            GatewayMessage::result(other, &ActionResult::fail("Unknown request type"), None)
        }
    }
}

fn bad_payload(name: &str) -> GatewayMessage {
    GatewayMessage::result(name, &ActionResult::fail("Invalid request payload"), None)
}

/// Serialize and send one gateway message.
async fn send_message(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    msg: &GatewayMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).unwrap_or_default();
    ws_tx.send(Message::Text(json.into())).await
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    code: u16,
    reason: &str,
) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(axum::extract::ws::CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
