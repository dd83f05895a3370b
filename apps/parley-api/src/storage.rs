use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::CoordinatorError;
use parley_common::id::{prefix, prefixed_ulid};

/// Where a persisted file can be retrieved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Local path (or pseudo-path) of the stored file.
    pub path: String,
    /// URL the file is served under.
    pub url: String,
}

/// Abstraction over file persistence for transfers.
///
/// Backed by the upload directory in production and an in-memory map in
/// tests.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<StoredFile, CoordinatorError>;
}

// ---------------------------------------------------------------------------
// Disk-backed implementation
// ---------------------------------------------------------------------------

pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl FileStore for DiskStore {
    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<StoredFile, CoordinatorError> {
        let stored_name = format!("{}_{}", prefixed_ulid(prefix::FILE), sanitize(filename));
        let path = self.root.join(&stored_name);

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| CoordinatorError::StorageFailed(e.to_string()))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| CoordinatorError::StorageFailed(e.to_string()))?;

        Ok(StoredFile {
            path: path.to_string_lossy().into_owned(),
            url: format!("/files/{stored_name}"),
        })
    }
}

/// Keep the stored name to a safe subset; the original name still reaches
/// recipients verbatim in the event payload.
fn sanitize(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// In-memory implementation (for tests)
// ---------------------------------------------------------------------------

pub struct MemoryStore {
    files: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(Vec::new()),
        }
    }

    pub fn stored(&self) -> Vec<String> {
        self.files.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }
}

#[async_trait]
impl FileStore for MemoryStore {
    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<StoredFile, CoordinatorError> {
        let stored_name = format!("{}_{}", prefixed_ulid(prefix::FILE), sanitize(filename));
        self.files
            .lock()
            .unwrap()
            .push((stored_name.clone(), bytes.to_vec()));
        Ok(StoredFile {
            path: format!("mem://{stored_name}"),
            url: format!("/files/{stored_name}"),
        })
    }
}
