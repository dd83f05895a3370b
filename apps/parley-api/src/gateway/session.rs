//! Per-connection gateway session state.

use std::sync::atomic::{AtomicU64, Ordering};

/// State for a single WebSocket connection.
pub struct GatewaySession {
    /// Coordinator connection id (`conn_` prefixed ULID).
    pub connection_id: String,
    /// Authenticated username (fixed at IDENTIFY time).
    pub username: String,
    /// Monotonically increasing sequence number for dispatch events.
    seq: AtomicU64,
}

impl GatewaySession {
    pub fn new(connection_id: String, username: String) -> Self {
        Self {
            connection_id,
            username,
            seq: AtomicU64::new(0),
        }
    }

    /// Get the next sequence number for a dispatch event.
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }
}
