pub mod health;

use std::path::Path;

use axum::Router;
use tower_http::services::ServeDir;

use crate::AppState;

pub fn router(upload_dir: &Path) -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        // Persisted transfers are retrievable at the file_url sent with
        // FILE_RECEIVED events.
        .nest_service("/files", ServeDir::new(upload_dir))
}
