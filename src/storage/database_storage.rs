use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info};
use sea_orm::sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sea_orm::sqlx::ConnectOptions as _;
use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    QueryOrder, Set, SqlxSqliteConnector,
};
use uuid::Uuid;

use crate::error_handling::types::StorageError;
use crate::storage::db_entities::{self, Column, Entity};
use crate::storage::migration;
use crate::storage::storage_trait::RecordingStore;
use crate::storage::types::{decode_timestamp, encode_timestamp, NewRecording, Recording};

const MAX_CONNECTIONS: u32 = 8;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

impl db_entities::Model {
    fn into_recording(self) -> Result<Recording, StorageError> {
        Ok(Recording {
            id: Uuid::parse_str(&self.id)
                .map_err(|_| StorageError::Corrupt(format!("bad id {:?}", self.id)))?,
            title: self.title,
            size: u64::try_from(self.size)
                .map_err(|_| StorageError::Corrupt(format!("negative size for {}", self.id)))?,
            created_at: decode_timestamp(&self.created_at).ok_or_else(|| {
                StorageError::Corrupt(format!("bad created_at for {}", self.id))
            })?,
            filename: self.filename,
            url: self.url,
        })
    }
}

/// SeaORM-backed metadata store. Works with SQLite and Postgres URLs.
pub struct DatabaseStorage {
    db: DatabaseConnection,
}

impl DatabaseStorage {
    /// Connect to any URL SeaORM understands (`sqlite://`, `postgres://`).
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let mut opts = ConnectOptions::new(url.to_owned());
        opts.max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .sqlx_logging(false);
        let db = Database::connect(opts).await.map_err(|e| {
            error!("Unable to connect to the metadata store: {}", e);
            StorageError::ConnectionFailed
        })?;
        info!("Connected to the {:?} metadata store", db.get_database_backend());
        Ok(Self { db })
    }

    /// Open (and create if missing) an SQLite file. The path is passed as-is,
    /// never through a URL, so `?` and `#` in file names are fine.
    pub async fn open_sqlite<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                error!("Failed to create {}: {}", parent.display(), e);
                StorageError::ConnectionFailed
            })?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .disable_statement_logging();
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| {
                error!("Unable to open {}: {}", path.display(), e);
                StorageError::ConnectionFailed
            })?;
        let db = SqlxSqliteConnector::from_sqlx_sqlite_pool(pool);
        info!("Connected to the {:?} metadata store", db.get_database_backend());
        Ok(Self { db })
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> Result<usize, StorageError> {
        migration::run_pending(&self.db).await
    }

    /// Fail unless every migration has been applied.
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        migration::ensure_current(&self.db).await
    }
}

#[async_trait]
impl RecordingStore for DatabaseStorage {
    async fn insert_recording(&self, new: NewRecording) -> Result<Recording, StorageError> {
        let size = i64::try_from(new.size).map_err(|_| StorageError::WriteFailed)?;
        let row = db_entities::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            title: Set(Some(new.title)),
            filename: Set(new.filename),
            size: Set(size),
            url: Set(new.url),
            created_at: Set(encode_timestamp(Utc::now())),
        };
        let stored = row.insert(&self.db).await.map_err(|e| {
            error!("Insert into recordings failed: {}", e);
            StorageError::WriteFailed
        })?;
        debug!("Inserted recording {} ({})", stored.id, stored.filename);
        stored.into_recording()
    }

    async fn list_recordings(&self) -> Result<Vec<Recording>, StorageError> {
        let rows = Entity::find()
            .order_by_desc(Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| {
                error!("Listing recordings failed: {}", e);
                StorageError::ReadFailed
            })?;
        debug!("Loaded {} recording(s)", rows.len());
        rows.into_iter().map(db_entities::Model::into_recording).collect()
    }

    async fn get_recording(&self, id: Uuid) -> Result<Option<Recording>, StorageError> {
        let row = Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(|e| {
                error!("Fetching recording {} failed: {}", id, e);
                StorageError::ReadFailed
            })?;
        row.map(db_entities::Model::into_recording).transpose()
    }
}
