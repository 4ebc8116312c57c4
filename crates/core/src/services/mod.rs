//! Business logic services.

#![allow(missing_docs)]

pub mod loader;
pub mod password_reset;
pub mod post;
pub mod user;
pub mod vote;

pub use loader::{BatchFetch, Loader, LoaderFactory, UserLoader, VoteStatusLoader};
pub use password_reset::{
    InMemoryResetTokenStore, LogResetLinkSender, PasswordResetService, RedisResetTokenStore,
    ResetLinkSender, ResetTokenStore,
};
pub use post::{CreatePostInput, PostPage, PostService, UpdatePostInput, text_snippet};
pub use user::{FieldError, RegisterInput, UserResponse, UserService};
pub use vote::{Reference, VoteDirection, VoteError, VoteOutcome, VotePlan, VoteService};
