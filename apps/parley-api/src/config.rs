use std::path::PathBuf;

/// Hard cap on decoded file payloads: 50 MiB.
pub const MAX_FILE_BYTES: u64 = 52_428_800;

/// Parley API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Directory incoming file transfers are persisted to.
    pub upload_dir: PathBuf,
    /// Maximum decoded file payload size in bytes.
    pub max_file_bytes: u64,
    /// Bound on a single file-store write, in seconds.
    pub persist_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults suitable for local development.
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4010),
            upload_dir: std::env::var("UPLOAD_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("uploads")),
            max_file_bytes: std::env::var("MAX_FILE_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_FILE_BYTES),
            persist_timeout_secs: std::env::var("PERSIST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        }
    }
}
