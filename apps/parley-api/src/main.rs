use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parley_api::config::Config;
use parley_api::coordinator::Coordinator;
use parley_api::storage::{DiskStore, FileStore};
use parley_api::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing — env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    std::fs::create_dir_all(&config.upload_dir).expect("failed to create upload dir");
    let store: Arc<dyn FileStore> = Arc::new(DiskStore::new(&config.upload_dir));

    let coordinator = Arc::new(Coordinator::new(
        store,
        config.max_file_bytes,
        Duration::from_secs(config.persist_timeout_secs),
    ));

    tracing::info!(
        upload_dir = %config.upload_dir.display(),
        max_file_bytes = config.max_file_bytes,
        "parley-api configured"
    );

    let state = AppState {
        coordinator,
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = parley_api::routes::router(&state.config.upload_dir)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "parley-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
