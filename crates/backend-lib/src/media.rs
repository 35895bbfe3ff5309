// ============================
// identity-backend-lib/src/media.rs
// ============================
//! Blob store boundary for avatar and cover images.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs as tokio_fs;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("upload failed: {0}")]
    Upload(String),

    #[error("media {0} not found")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reference to an uploaded blob
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub url: String,
    /// Handle used to remove the blob later
    pub public_id: String,
}

/// A file received from the client and staged on local disk
#[derive(Debug, Clone)]
pub struct LocalUpload {
    pub path: PathBuf,
    pub file_name: Option<String>,
}

impl LocalUpload {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file_name: None,
        }
    }
}

/// Trait for blob store backends
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload a staged file. The staged file is removed whether or not the upload succeeds.
    async fn upload(&self, upload: &LocalUpload) -> Result<StoredMedia, MediaError>;

    async fn destroy(&self, public_id: &str) -> Result<(), MediaError>;
}

/// Blob store backed by a local directory
#[derive(Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    pub fn new<P: AsRef<Path>>(root: P, base_url: impl Into<String>) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn public_id_for(upload: &LocalUpload) -> String {
        let ext = upload
            .file_name
            .as_deref()
            .map(Path::new)
            .unwrap_or(upload.path.as_path())
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()));
        match ext {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext.to_lowercase()),
            None => Uuid::new_v4().to_string(),
        }
    }

    /// Only plain file names produced by `public_id_for` are accepted
    fn blob_path(&self, public_id: &str) -> Option<PathBuf> {
        let valid = !public_id.is_empty()
            && public_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
            && !public_id.starts_with('.');
        valid.then(|| self.root.join(public_id))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, upload: &LocalUpload) -> Result<StoredMedia, MediaError> {
        let public_id = Self::public_id_for(upload);
        let dest = self.root.join(&public_id);

        let copied = tokio_fs::copy(&upload.path, &dest).await;
        if let Err(err) = tokio_fs::remove_file(&upload.path).await {
            warn!(path = %upload.path.display(), error = %err, "failed to remove staged upload");
        }
        copied.map_err(|e| MediaError::Upload(e.to_string()))?;

        debug!(public_id, "media stored");
        Ok(StoredMedia {
            url: format!("{}/{}", self.base_url, public_id),
            public_id,
        })
    }

    async fn destroy(&self, public_id: &str) -> Result<(), MediaError> {
        let path = self
            .blob_path(public_id)
            .ok_or_else(|| MediaError::NotFound(public_id.to_string()))?;
        match tokio_fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(MediaError::NotFound(public_id.to_string()))
            },
            Err(err) => Err(err.into()),
        }
    }
}
