pub mod config;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod routes;
pub mod storage;

use std::sync::Arc;

use config::Config;
use coordinator::Coordinator;

/// Shared application state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub config: Arc<Config>,
}
