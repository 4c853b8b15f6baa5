use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Recordings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Recordings::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Recordings::Title).string_len(255).null())
                    .col(
                        ColumnDef::new(Recordings::Filename)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Recordings::Size).big_integer().not_null())
                    .col(ColumnDef::new(Recordings::Url).string_len(500).not_null())
                    .col(ColumnDef::new(Recordings::CreatedAt).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_recordings_created_at")
                    .table(Recordings::Table)
                    .col(Recordings::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Recordings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Recordings {
    Table,
    Id,
    Title,
    Filename,
    Size,
    Url,
    CreatedAt,
}
