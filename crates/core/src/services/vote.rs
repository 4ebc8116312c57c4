//! Vote service.
//!
//! Records a user's up/down vote on a post and keeps the post's `points`
//! in step with the updoot ledger. Every vote runs in one database
//! transaction that locks the post row first, so concurrent votes on the
//! same post are applied one after another and `points` only ever moves by
//! relative deltas.

use std::sync::Arc;

use sea_orm::{DatabaseConnection, DbErr, SqlErr, TransactionTrait};
use thiserror::Error;
use tracing::{debug, info, warn};
use updoot_common::AppError;
use updoot_db::repositories::{PostRepository, UpdootRepository};

/// Direction of a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    /// Interpret a raw vote value from a client: `-1` is a downvote, anything
    /// else counts as an upvote.
    #[must_use]
    pub const fn from_value(value: i32) -> Self {
        if value == -1 { Self::Down } else { Self::Up }
    }

    /// Signed magnitude stored in the ledger.
    #[must_use]
    pub const fn value(self) -> i32 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }
}

/// What a vote does to the ledger and the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VotePlan {
    /// First vote by this user on this post.
    Insert { value: i32 },
    /// The user switches direction; the old vote is undone and the new one applied.
    Flip { value: i32 },
    /// Same direction as the recorded vote.
    NoOp,
}

impl VotePlan {
    /// Decide the ledger mutation given the currently recorded value (if any).
    #[must_use]
    pub const fn decide(existing: Option<i32>, value: i32) -> Self {
        match existing {
            None => Self::Insert { value },
            Some(current) if current != value => Self::Flip { value },
            Some(_) => Self::NoOp,
        }
    }

    /// Change to apply to the post's points.
    #[must_use]
    pub const fn score_delta(self) -> i32 {
        match self {
            Self::Insert { value } => value,
            Self::Flip { value } => 2 * value,
            Self::NoOp => 0,
        }
    }

    /// Outcome reported once the plan is committed.
    #[must_use]
    pub const fn outcome(self) -> VoteOutcome {
        match self {
            Self::Insert { .. } => VoteOutcome::Created,
            Self::Flip { .. } => VoteOutcome::Flipped,
            Self::NoOp => VoteOutcome::Unchanged,
        }
    }
}

/// Result of a committed vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Created,
    Flipped,
    Unchanged,
}

/// Name of the ledger's foreign key onto `post`.
const POST_FK: &str = "fk_updoot_post";

/// Row a vote pointed at that does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Post(i32),
    User(i32),
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Post(id) => write!(f, "Post {id}"),
            Self::User(id) => write!(f, "User {id}"),
        }
    }
}

/// Vote failures.
#[derive(Debug, Error)]
pub enum VoteError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("{0} does not exist")]
    InvalidReference(Reference),

    #[error("Storage failure: {0}")]
    StorageFailure(String),
}

impl VoteError {
    fn from_db(err: &DbErr, post_id: i32, user_id: i32) -> Self {
        match err.sql_err() {
            Some(SqlErr::ForeignKeyConstraintViolation(msg)) => {
                Self::from_fk_violation(&msg, post_id, user_id)
            }
            _ => Self::StorageFailure(err.to_string()),
        }
    }

    /// The post row is locked before any ledger write, so a violation not
    /// naming the post key is the voter.
    fn from_fk_violation(msg: &str, post_id: i32, user_id: i32) -> Self {
        if msg.contains(POST_FK) {
            Self::InvalidReference(Reference::Post(post_id))
        } else {
            Self::InvalidReference(Reference::User(user_id))
        }
    }
}

impl From<VoteError> for AppError {
    fn from(err: VoteError) -> Self {
        match err {
            VoteError::Unauthenticated => Self::Unauthorized,
            VoteError::InvalidReference(Reference::Post(id)) => Self::PostNotFound(id.to_string()),
            VoteError::InvalidReference(Reference::User(id)) => Self::UserNotFound(id.to_string()),
            VoteError::StorageFailure(msg) => Self::Database(msg),
        }
    }
}

/// Vote service. The only writer of `post.points`.
#[derive(Clone)]
pub struct VoteService {
    db: Arc<DatabaseConnection>,
    post_repo: PostRepository,
    updoot_repo: UpdootRepository,
}

impl VoteService {
    /// Create a new vote service.
    #[must_use]
    pub const fn new(
        db: Arc<DatabaseConnection>,
        post_repo: PostRepository,
        updoot_repo: UpdootRepository,
    ) -> Self {
        Self {
            db,
            post_repo,
            updoot_repo,
        }
    }

    /// Record `user_id`'s vote on `post_id`.
    ///
    /// Either both the ledger entry and the score change are committed, or
    /// neither is. Repeating the same vote is a no-op, so callers may retry.
    pub async fn cast_vote(
        &self,
        post_id: i32,
        user_id: Option<i32>,
        direction: VoteDirection,
    ) -> Result<VoteOutcome, VoteError> {
        let user_id = user_id.ok_or(VoteError::Unauthenticated)?;
        let value = direction.value();
        let db_err = |e: DbErr| {
            warn!(post_id, user_id, error = %e, "Vote aborted");
            VoteError::from_db(&e, post_id, user_id)
        };

        let txn = self.db.begin().await.map_err(db_err)?;

        // Lock order: post row, then ledger row.
        if self
            .post_repo
            .lock_by_id(&txn, post_id)
            .await
            .map_err(db_err)?
            .is_none()
        {
            debug!(post_id, user_id, "Vote on missing post");
            return Err(VoteError::InvalidReference(Reference::Post(post_id)));
        }

        let existing = self
            .updoot_repo
            .find(&txn, user_id, post_id)
            .await
            .map_err(db_err)?;

        let plan = VotePlan::decide(existing.map(|u| u.value), value);

        match plan {
            VotePlan::Insert { value } => {
                self.updoot_repo
                    .insert(&txn, user_id, post_id, value)
                    .await
                    .map_err(db_err)?;
            }
            VotePlan::Flip { value } => {
                self.updoot_repo
                    .update_value(&txn, user_id, post_id, value)
                    .await
                    .map_err(db_err)?;
            }
            VotePlan::NoOp => {}
        }

        let delta = plan.score_delta();
        if delta != 0 {
            self.post_repo
                .add_points(&txn, post_id, delta)
                .await
                .map_err(db_err)?;
        }

        txn.commit().await.map_err(db_err)?;

        let outcome = plan.outcome();
        info!(post_id, user_id, value, delta, outcome = ?outcome, "Vote recorded");

        Ok(outcome)
    }
}
