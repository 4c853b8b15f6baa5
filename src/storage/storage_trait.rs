//! Storage Trait
//!
//! This module defines the `RecordingStore` trait, the interface of the
//! metadata store backing the recordings API.
//!
//! Records are append-only: the trait has no update or delete operation.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error_handling::types::StorageError;
use crate::storage::types::{NewRecording, Recording};

/// The `RecordingStore` trait defines the interface for recording metadata backends.
///
/// Implementors assign `id` and `created_at` on insertion and must return
/// listings ordered by creation time, most recent first.
#[async_trait]
pub trait RecordingStore: Send + Sync {
    /// Inserts a new row and returns the stored record.
    async fn insert_recording(&self, new: NewRecording) -> Result<Recording, StorageError>;

    /// Lists every record, newest first.
    async fn list_recordings(&self) -> Result<Vec<Recording>, StorageError>;

    /// Fetches one record, `Ok(None)` when the id is unknown.
    async fn get_recording(&self, id: Uuid) -> Result<Option<Recording>, StorageError>;
}
