//! SeaORM entity model used by the database storage backend.
//!
//! Maps to the `recordings` table created by `storage::migration`.

use sea_orm::entity::prelude::*;

/// Recordings table entity model.
///
/// Identifiers and timestamps are stored as strings for portability between
/// SQLite and Postgres.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "recordings")]
pub struct Model {
    /// UUID as string primary key
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Display title, `NULL` for legacy rows
    pub title: Option<String>,
    /// `<uuid><ext>` name inside the uploads directory
    #[sea_orm(unique)]
    pub filename: String,
    /// Byte length of the stored file
    pub size: i64,
    /// Absolute URL computed at upload time
    pub url: String,
    /// Fixed-width RFC3339 creation timestamp
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
