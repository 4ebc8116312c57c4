//! Updoot (vote ledger) repository.
//!
//! The write primitives take the connection as an argument instead of using
//! the repository's own pool handle, so the vote coordinator can run them
//! inside its transaction together with the score update.

use std::sync::Arc;

use crate::entities::{Updoot, updoot};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QuerySelect, Set, sea_query::Expr,
};
use updoot_common::{AppError, AppResult};

/// Updoot repository for database operations.
#[derive(Clone)]
pub struct UpdootRepository {
    db: Arc<DatabaseConnection>,
}

impl UpdootRepository {
    /// Create a new updoot repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the ledger entry for (user, post), locking the row until the
    /// surrounding transaction ends.
    pub async fn find<C>(
        &self,
        conn: &C,
        user_id: i32,
        post_id: i32,
    ) -> Result<Option<updoot::Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Updoot::find()
            .filter(updoot::Column::UserId.eq(user_id))
            .filter(updoot::Column::PostId.eq(post_id))
            .lock_exclusive()
            .one(conn)
            .await
    }

    /// Insert a new ledger entry.
    pub async fn insert<C>(&self, conn: &C, user_id: i32, post_id: i32, value: i32) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let model = updoot::ActiveModel {
            user_id: Set(user_id),
            post_id: Set(post_id),
            value: Set(value),
        };

        Updoot::insert(model).exec_without_returning(conn).await?;
        Ok(())
    }

    /// Overwrite the value of an existing ledger entry.
    pub async fn update_value<C>(
        &self,
        conn: &C,
        user_id: i32,
        post_id: i32,
        value: i32,
    ) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        Updoot::update_many()
            .col_expr(updoot::Column::Value, Expr::value(value))
            .filter(updoot::Column::UserId.eq(user_id))
            .filter(updoot::Column::PostId.eq(post_id))
            .exec(conn)
            .await?;
        Ok(())
    }

    /// Get a user's votes for a set of posts in one query.
    pub async fn find_by_user_and_posts(
        &self,
        user_id: i32,
        post_ids: &[i32],
    ) -> AppResult<Vec<updoot::Model>> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }

        Updoot::find()
            .filter(updoot::Column::UserId.eq(user_id))
            .filter(updoot::Column::PostId.is_in(post_ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Sum of all vote values recorded for a post.
    pub async fn sum_for_post(&self, post_id: i32) -> AppResult<i64> {
        let total: Option<Option<i64>> = Updoot::find()
            .select_only()
            .column_as(Expr::col(updoot::Column::Value).sum(), "total")
            .filter(updoot::Column::PostId.eq(post_id))
            .into_tuple()
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(total.flatten().unwrap_or(0))
    }
}
