//! Versioned schema migrations for the metadata store.
//!
//! Migrations run only through `screenrec-server migrate`; the server checks
//! for pending migrations at startup and refuses to serve an outdated schema.

use log::{error, info};
use sea_orm::DatabaseConnection;
pub use sea_orm_migration::MigratorTrait;
use sea_orm_migration::MigrationTrait;

use crate::error_handling::types::StorageError;

mod m20251019_000001_create_recordings;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20251019_000001_create_recordings::Migration)]
    }
}

/// Apply every pending migration. Returns how many were applied.
pub async fn run_pending(db: &DatabaseConnection) -> Result<usize, StorageError> {
    let pending = pending_count(db).await?;
    if pending == 0 {
        info!("Schema is up to date");
        return Ok(0);
    }
    Migrator::up(db, None).await.map_err(|e| {
        error!("Migration failed: {}", e);
        StorageError::MigrationFailed
    })?;
    info!("Applied {} migration(s)", pending);
    Ok(pending)
}

pub async fn pending_count(db: &DatabaseConnection) -> Result<usize, StorageError> {
    Migrator::get_pending_migrations(db)
        .await
        .map(|m| m.len())
        .map_err(|e| {
            error!("Unable to read migration status: {}", e);
            StorageError::ReadFailed
        })
}

/// Fail with [`StorageError::PendingMigrations`] unless the schema is current.
pub async fn ensure_current(db: &DatabaseConnection) -> Result<(), StorageError> {
    match pending_count(db).await? {
        0 => Ok(()),
        n => Err(StorageError::PendingMigrations(n)),
    }
}
