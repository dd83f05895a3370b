//! File transfer coordinator: validate, decode, persist, classify.
//!
//! Event delivery for a completed transfer is the facade's job; this module
//! only produces a `StoredTransfer` or a typed failure. Payloads cross the
//! transport boundary base64-encoded.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::CoordinatorError;
use crate::storage::{FileStore, StoredFile};

/// Extensions treated as inline-previewable images. Advisory only.
const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// A validated, persisted transfer ready for fan-out.
#[derive(Debug, Clone)]
pub struct StoredTransfer {
    pub filename: String,
    pub size: u64,
    pub stored: StoredFile,
    pub is_image: bool,
}

pub struct FileTransferCoordinator {
    store: Arc<dyn FileStore>,
    max_bytes: u64,
    persist_timeout: Duration,
}

impl FileTransferCoordinator {
    pub fn new(store: Arc<dyn FileStore>, max_bytes: u64, persist_timeout: Duration) -> Self {
        Self {
            store,
            max_bytes,
            persist_timeout,
        }
    }

    /// Validate and persist one transfer.
    ///
    /// The size cap is enforced twice: against the encoded length before
    /// decoding (so an oversized payload is never buffered decoded), and
    /// against the exact decoded length. Persistence is bounded by the
    /// configured timeout; expiry is a failure result, never a hang.
    pub async fn initiate(
        &self,
        filename: &str,
        payload_b64: &str,
    ) -> Result<StoredTransfer, CoordinatorError> {
        // base64 expands 3 bytes to 4 characters; padding characters do not
        // carry data, so subtract them for an exact size estimate.
        let trimmed = payload_b64.trim();
        let padding = trimmed.bytes().rev().take_while(|&b| b == b'=').count() as u64;
        let estimated = ((trimmed.len() as u64 / 4) * 3).saturating_sub(padding.min(2));
        if estimated > self.max_bytes {
            return Err(CoordinatorError::FileTooLarge {
                size: estimated,
                max: self.max_bytes,
            });
        }

        let bytes = BASE64
            .decode(trimmed)
            .map_err(|e| CoordinatorError::InvalidPayload(format!("bad base64: {e}")))?;

        let size = bytes.len() as u64;
        if size > self.max_bytes {
            return Err(CoordinatorError::FileTooLarge {
                size,
                max: self.max_bytes,
            });
        }

        let stored = tokio::time::timeout(self.persist_timeout, self.store.save(filename, &bytes))
            .await
            .map_err(|_| CoordinatorError::DeliveryTimeout("persisting file".to_string()))??;

        Ok(StoredTransfer {
            filename: filename.to_string(),
            size,
            stored,
            is_image: is_image(filename),
        })
    }
}

/// Classify by file extension for inline-preview hinting.
pub fn is_image(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn coordinator(max_bytes: u64) -> FileTransferCoordinator {
        FileTransferCoordinator::new(
            Arc::new(MemoryStore::new()),
            max_bytes,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn transfer_is_decoded_and_persisted() {
        let files = coordinator(1024);
        let payload = BASE64.encode(b"hello file");

        let transfer = files.initiate("notes.txt", &payload).await.unwrap();
        assert_eq!(transfer.size, 10);
        assert!(!transfer.is_image);
        assert!(transfer.stored.url.starts_with("/files/"));
    }

    #[tokio::test]
    async fn oversized_payload_is_rejected_before_decoding() {
        let files = coordinator(16);
        let payload = BASE64.encode(vec![0u8; 64]);

        let err = files.initiate("big.bin", &payload).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::FileTooLarge { max: 16, .. }));
    }

    #[tokio::test]
    async fn exact_size_cap_is_inclusive() {
        let files = coordinator(8);
        // 8 bytes encode to 12 chars with one padding byte; estimate and
        // exact check must both pass at the boundary.
        let payload = BASE64.encode(vec![0u8; 8]);
        assert!(files.initiate("ok.bin", &payload).await.is_ok());
    }

    #[tokio::test]
    async fn malformed_base64_is_rejected() {
        let files = coordinator(1024);
        let err = files.initiate("x.txt", "not//valid@@base64!").await.unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn slow_store_times_out() {
        struct SlowStore;

        #[async_trait::async_trait]
        impl FileStore for SlowStore {
            async fn save(
                &self,
                _filename: &str,
                _bytes: &[u8],
            ) -> Result<StoredFile, CoordinatorError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                unreachable!()
            }
        }

        let files =
            FileTransferCoordinator::new(Arc::new(SlowStore), 1024, Duration::from_millis(20));
        let payload = BASE64.encode(b"x");
        let err = files.initiate("x.txt", &payload).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::DeliveryTimeout(_)));
    }

    #[test]
    fn image_classification_by_extension() {
        assert!(is_image("photo.PNG"));
        assert!(is_image("pic.jpeg"));
        assert!(is_image("anim.gif"));
        assert!(!is_image("archive.tar.gz"));
        assert!(!is_image("README"));
    }
}
