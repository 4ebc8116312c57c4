//! Create updoot (vote ledger) table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Updoot::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Updoot::UserId).integer().not_null())
                    .col(ColumnDef::new(Updoot::PostId).integer().not_null())
                    .col(
                        ColumnDef::new(Updoot::Value)
                            .integer()
                            .not_null()
                            .check(Expr::col(Updoot::Value).is_in([-1, 1])),
                    )
                    // One vote per user per post
                    .primary_key(
                        Index::create()
                            .name("pk_updoot")
                            .col(Updoot::UserId)
                            .col(Updoot::PostId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_updoot_user")
                            .from(Updoot::Table, Updoot::UserId)
                            .to(User::Table, User::Id)
                            // Ledger rows only leave with their post
                            .on_delete(ForeignKeyAction::NoAction),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_updoot_post")
                            .from(Updoot::Table, Updoot::PostId)
                            .to(Post::Table, Post::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: post_id (ledger sums and per-post lookups)
        manager
            .create_index(
                Index::create()
                    .name("idx_updoot_post_id")
                    .table(Updoot::Table)
                    .col(Updoot::PostId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Updoot::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Updoot {
    Table,
    UserId,
    PostId,
    Value,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}

#[derive(Iden)]
enum Post {
    Table,
    Id,
}
