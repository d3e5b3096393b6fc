//! # Likes
//!
//! Membership in `blog:liked:{post_id}` decides whether a user likes a post.
//! The `liked` column on the post is a cache of the set size.
//!
//! ## Toggle
//! 1. Probe the user's score in the like-set
//! 2. Absent: bump the counter, then add the user scored by the current time
//! 3. Present: drop the counter, then remove the user
//!
//! The set is only touched after the counter write succeeds. Probe and mutate
//! are two calls, so two concurrent toggles by the same user on the same post
//! can race and leave the counter off by one. [`Ledger::reconcile`] repairs it.
use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    directory::PostStore,
    error::{AppError, StoreError},
    keys::like_set_key,
    models::{PostId, UserId},
    store::RankedStore,
};

#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn RankedStore>,
    posts: Arc<dyn PostStore>,
}

impl Ledger {
    pub fn new(store: Arc<dyn RankedStore>, posts: Arc<dyn PostStore>) -> Self {
        Self { store, posts }
    }

    /// Returns true when the post is liked after the call.
    pub async fn toggle_like(
        &self,
        post_id: PostId,
        user_id: UserId,
        now_millis: i64,
    ) -> Result<bool, AppError> {
        let key = like_set_key(post_id);
        let member = user_id.to_string();

        let liked = self.store.score(&key, &member).await?.is_some();
        let delta = if liked { -1 } else { 1 };

        if !self.posts.increment_like_count(post_id, delta).await? {
            return Err(AppError::NotFound(format!("Post {post_id}")));
        }

        if liked {
            self.store.remove(&key, &member).await?;
        } else {
            self.store
                .add_or_update(&key, &member, now_millis as f64)
                .await?;
        }

        debug!(post_id, user_id, liked = !liked, "Toggled like");

        Ok(!liked)
    }

    /// Earliest likers first, at most `limit`.
    pub async fn top_likers(&self, post_id: PostId, limit: usize) -> Result<Vec<UserId>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let members = self
            .store
            .range_ascending(&like_set_key(post_id), 0, limit as isize - 1)
            .await?;

        members
            .iter()
            .map(|member| {
                member
                    .parse()
                    .map_err(|_| StoreError::Decode(format!("user id {member:?}")))
            })
            .collect()
    }

    pub async fn is_liked_by(&self, post_id: PostId, user_id: UserId) -> Result<bool, StoreError> {
        Ok(self
            .store
            .score(&like_set_key(post_id), &user_id.to_string())
            .await?
            .is_some())
    }

    /// Overwrites the post's counter with the like-set size.
    pub async fn reconcile(&self, post_id: PostId) -> Result<i64, AppError> {
        let count = self.store.cardinality(&like_set_key(post_id)).await? as i64;

        if !self.posts.set_like_count(post_id, count).await? {
            return Err(AppError::NotFound(format!("Post {post_id}")));
        }

        info!(post_id, count, "Reconciled like count");

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{directory::MemoryPosts, store::MemoryStore};

    async fn ledger() -> (Ledger, Arc<MemoryPosts>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let posts = Arc::new(MemoryPosts::new());
        posts
            .insert(1, "title".into(), "body".into(), Utc::now())
            .await
            .unwrap();

        (Ledger::new(store.clone(), posts.clone()), posts, store)
    }

    async fn liked_count(posts: &MemoryPosts, id: PostId) -> i64 {
        posts.get(id).await.unwrap().unwrap().liked
    }

    #[tokio::test]
    async fn test_like_then_unlike_round_trip() {
        let (ledger, posts, _) = ledger().await;

        assert!(ledger.toggle_like(1, 42, 1_000).await.unwrap());
        assert!(ledger.is_liked_by(1, 42).await.unwrap());
        assert_eq!(liked_count(&posts, 1).await, 1);

        assert!(!ledger.toggle_like(1, 42, 2_000).await.unwrap());
        assert!(!ledger.is_liked_by(1, 42).await.unwrap());
        assert_eq!(liked_count(&posts, 1).await, 0);
    }

    #[tokio::test]
    async fn test_odd_toggles_mean_liked() {
        let (ledger, posts, _) = ledger().await;

        for (user, toggles) in [(1u64, 1), (2, 2), (3, 3), (4, 4)] {
            for i in 0..toggles {
                ledger.toggle_like(1, user, i).await.unwrap();
            }
        }

        for (user, expected) in [(1u64, true), (2, false), (3, true), (4, false)] {
            assert_eq!(ledger.is_liked_by(1, user).await.unwrap(), expected);
        }
        assert_eq!(liked_count(&posts, 1).await, 2);
    }

    #[tokio::test]
    async fn test_missing_post_leaves_set_untouched() {
        let (ledger, _, store) = ledger().await;

        let result = ledger.toggle_like(99, 42, 1_000).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(store.cardinality(&like_set_key(99)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_top_likers_order_and_limit() {
        let (ledger, _, _) = ledger().await;

        for (user, at) in [(30u64, 300), (10, 100), (20, 200), (40, 400)] {
            ledger.toggle_like(1, user, at).await.unwrap();
        }

        assert_eq!(ledger.top_likers(1, 3).await.unwrap(), vec![10, 20, 30]);
        assert_eq!(ledger.top_likers(1, 10).await.unwrap(), vec![10, 20, 30, 40]);
        assert!(ledger.top_likers(1, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_top_likers_empty() {
        let (ledger, _, _) = ledger().await;
        assert!(ledger.top_likers(1, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_repairs_drift() {
        let (ledger, posts, store) = ledger().await;

        ledger.toggle_like(1, 7, 10).await.unwrap();
        store.add_or_update(&like_set_key(1), "8", 20.0).await.unwrap();
        assert_eq!(liked_count(&posts, 1).await, 1);

        assert_eq!(ledger.reconcile(1).await.unwrap(), 2);
        assert_eq!(liked_count(&posts, 1).await, 2);

        assert!(matches!(ledger.reconcile(5).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rebuilt_post_store_starts_clean() {
        let store = Arc::new(MemoryStore::new());

        let posts = Arc::new(MemoryPosts::with_ids(store.clone()));
        let old = posts.insert(1, "old".into(), String::new(), Utc::now()).await.unwrap();
        let ledger = Ledger::new(store.clone(), posts);
        assert!(ledger.toggle_like(old.id, 42, 1_000).await.unwrap());

        // post records gone, Redis indexes kept
        let posts = Arc::new(MemoryPosts::with_ids(store.clone()));
        let new = posts.insert(1, "new".into(), String::new(), Utc::now()).await.unwrap();
        let ledger = Ledger::new(store, posts.clone());

        assert_ne!(new.id, old.id);
        assert!(!ledger.is_liked_by(new.id, 42).await.unwrap());
        assert!(ledger.toggle_like(new.id, 42, 2_000).await.unwrap());
        assert_eq!(liked_count(&posts, new.id).await, 1);
    }
}
