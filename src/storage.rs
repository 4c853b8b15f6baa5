//! Storage subsystem
//!
//! This module provides the persistence side of the recordings backend.
//!
//! Components:
//! - `storage_trait`: the `RecordingStore` trait defining the metadata API.
//! - `types`: `Recording` and the helpers shared by backends.
//! - `database_storage`: SeaORM implementation for SQLite and Postgres.
//! - `db_entities`: SeaORM entity model for the `recordings` table.
//! - `migration`: versioned schema migrations.
//! - `file_storage`: the uploads directory holding the binary files.

pub mod database_storage;
pub mod db_entities;
pub mod file_storage;
pub mod migration;
pub mod storage_trait;
pub mod types;

pub use database_storage::DatabaseStorage;
pub use file_storage::{FileStorage, StoredFile};
pub use storage_trait::RecordingStore;
pub use types::{NewRecording, Recording};
