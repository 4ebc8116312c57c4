//! Per-request batch loaders.
//!
//! A loader collects the keys a response needs, fetches the ones it has not
//! seen yet with a single query, and hands back results in the order the
//! keys were given. Results are memoized for the loader's lifetime, which
//! is one request.

use std::{collections::HashMap, hash::Hash};

use async_trait::async_trait;
use tokio::sync::Mutex;
use updoot_common::AppResult;
use updoot_db::{
    entities::user,
    repositories::{UpdootRepository, UserRepository},
};

/// A source that can resolve many keys in one round trip.
#[async_trait]
pub trait BatchFetch: Send + Sync {
    type Key: Copy + Eq + Hash + Send + Sync;
    type Value: Clone + Send + Sync;

    /// Fetch values for `keys`. Keys with no value are simply absent.
    async fn fetch(&self, keys: &[Self::Key]) -> AppResult<HashMap<Self::Key, Self::Value>>;
}

/// Deduplicating, memoizing loader over a [`BatchFetch`].
pub struct Loader<F: BatchFetch> {
    fetcher: F,
    cache: Mutex<HashMap<F::Key, Option<F::Value>>>,
}

impl<F: BatchFetch> Loader<F> {
    /// Create a loader with an empty cache.
    #[must_use]
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Load many keys; the output lines up with `keys`.
    pub async fn load_many(&self, keys: &[F::Key]) -> AppResult<Vec<Option<F::Value>>> {
        let mut cache = self.cache.lock().await;

        let mut missing: Vec<F::Key> = Vec::new();
        for key in keys {
            if !cache.contains_key(key) && !missing.contains(key) {
                missing.push(*key);
            }
        }

        if !missing.is_empty() {
            let mut fetched = self.fetcher.fetch(&missing).await?;
            for key in missing {
                let value = fetched.remove(&key);
                cache.insert(key, value);
            }
        }

        Ok(keys
            .iter()
            .map(|key| cache.get(key).cloned().flatten())
            .collect())
    }

    /// Load a single key.
    pub async fn load(&self, key: F::Key) -> AppResult<Option<F::Value>> {
        Ok(self.load_many(&[key]).await?.into_iter().next().flatten())
    }
}

/// Fetches users by ID.
pub struct UserFetch {
    user_repo: UserRepository,
}

#[async_trait]
impl BatchFetch for UserFetch {
    type Key = i32;
    type Value = user::Model;

    async fn fetch(&self, keys: &[i32]) -> AppResult<HashMap<i32, user::Model>> {
        let users = self.user_repo.find_by_ids(keys).await?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }
}

/// Fetches one viewer's vote values by post ID.
pub struct VoteStatusFetch {
    updoot_repo: UpdootRepository,
    viewer_id: Option<i32>,
}

#[async_trait]
impl BatchFetch for VoteStatusFetch {
    type Key = i32;
    type Value = i32;

    async fn fetch(&self, keys: &[i32]) -> AppResult<HashMap<i32, i32>> {
        let Some(viewer_id) = self.viewer_id else {
            return Ok(HashMap::new());
        };

        let votes = self
            .updoot_repo
            .find_by_user_and_posts(viewer_id, keys)
            .await?;
        Ok(votes.into_iter().map(|v| (v.post_id, v.value)).collect())
    }
}

/// Loader resolving post creators.
pub type UserLoader = Loader<UserFetch>;

/// Loader resolving the viewer's vote on each post.
pub type VoteStatusLoader = Loader<VoteStatusFetch>;

impl UserLoader {
    /// Create a user loader for one request.
    #[must_use]
    pub fn for_users(user_repo: UserRepository) -> Self {
        Self::new(UserFetch { user_repo })
    }
}

impl VoteStatusLoader {
    /// Create a vote status loader for one request. Anonymous viewers get
    /// `None` for every post without touching the database.
    #[must_use]
    pub fn for_viewer(updoot_repo: UpdootRepository, viewer_id: Option<i32>) -> Self {
        Self::new(VoteStatusFetch {
            updoot_repo,
            viewer_id,
        })
    }
}

/// Builds fresh per-request loaders from shared repositories.
#[derive(Clone)]
pub struct LoaderFactory {
    user_repo: UserRepository,
    updoot_repo: UpdootRepository,
}

impl LoaderFactory {
    #[must_use]
    pub const fn new(user_repo: UserRepository, updoot_repo: UpdootRepository) -> Self {
        Self {
            user_repo,
            updoot_repo,
        }
    }

    /// A user loader for one request.
    #[must_use]
    pub fn users(&self) -> UserLoader {
        UserLoader::for_users(self.user_repo.clone())
    }

    /// A vote status loader for one request.
    #[must_use]
    pub fn vote_status(&self, viewer_id: Option<i32>) -> VoteStatusLoader {
        VoteStatusLoader::for_viewer(self.updoot_repo.clone(), viewer_id)
    }
}
