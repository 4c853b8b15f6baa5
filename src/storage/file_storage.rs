use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut};
use futures_util::{Stream, TryStreamExt};
use log::{debug, error, info};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error_handling::types::FileStoreError;

/// Largest accepted upload (200 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 200 * 1024 * 1024;

/// Extension used when the client did not send a usable one.
pub const DEFAULT_EXTENSION: &str = ".webm";

const MAX_EXTENSION_LEN: usize = 10;

/// Result of a successful [`FileStorage::persist`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// `<uuid><ext>`, unique inside the uploads directory
    pub filename: String,
    pub path: PathBuf,
    /// Number of bytes written
    pub size: u64,
}

/// The uploads directory. Every file is written once and never modified.
pub struct FileStorage {
    base_path: PathBuf,
    max_bytes: u64,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(base_path: P, max_bytes: u64) -> Result<Self, FileStoreError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).map_err(|e| {
            error!("Failed to create uploads dir {}: {}", base_path.display(), e);
            FileStoreError::Io(e)
        })?;
        info!(
            "FileStorage initialized at {} (limit {} bytes)",
            base_path.display(),
            max_bytes
        );
        Ok(Self {
            base_path,
            max_bytes,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.base_path.join(filename)
    }

    /// Build a fresh `<uuid><ext>` name, keeping the extension of `original`
    /// when it looks sane.
    pub fn storage_name(original: Option<&str>) -> String {
        let ext = original
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| {
                !ext.is_empty()
                    && ext.len() <= MAX_EXTENSION_LEN
                    && ext.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
        format!("{}{}", Uuid::new_v4(), ext)
    }

    /// Drain `stream` into memory, then write it under a newly generated name.
    ///
    /// The size limit is checked while reading, so an oversized payload is
    /// rejected before anything touches the disk.
    pub async fn persist<S, B, E>(
        &self,
        original_name: Option<&str>,
        stream: S,
    ) -> Result<StoredFile, FileStoreError>
    where
        S: Stream<Item = Result<B, E>>,
        B: Buf,
        E: Display,
    {
        futures_util::pin_mut!(stream);
        let mut data: Vec<u8> = Vec::new();
        while let Some(chunk) = stream
            .try_next()
            .await
            .map_err(|e| FileStoreError::Stream(e.to_string()))?
        {
            if (data.len() + chunk.remaining()) as u64 > self.max_bytes {
                debug!("Rejecting upload above {} bytes", self.max_bytes);
                return Err(FileStoreError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            data.put(chunk);
        }

        let filename = Self::storage_name(original_name);
        let path = self.path_for(&filename);
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                error!("Create failed {}: {}", path.display(), e);
                FileStoreError::Io(e)
            })?;
        file.write_all(&data).await?;
        file.sync_all().await?;

        info!("Stored {} byte(s) at {}", data.len(), path.display());
        Ok(StoredFile {
            filename,
            path,
            size: data.len() as u64,
        })
    }

    /// Best-effort removal of a stored file.
    pub async fn remove(&self, filename: &str) -> Result<(), FileStoreError> {
        let path = self.path_for(filename);
        tokio::fs::remove_file(&path).await.map_err(|e| {
            error!("Remove failed {}: {}", path.display(), e);
            FileStoreError::Io(e)
        })
    }
}
