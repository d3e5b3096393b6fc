//! # Authoritative Records
//!
//! Posts and follow edges live in the relational store. The engagement
//! features only reach them through the traits below; the in-memory
//! implementations back local runs and tests.
//!
//! Post ids come from an [`IdGenerator`] so that a restarted in-memory post
//! store never hands out an id whose `blog:liked:` set or `feed:` entries
//! still sit in Redis.
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    error::StoreError,
    keys::BLOG_ID_KEY,
    models::{Post, PostId, UserId},
    store::{IdGenerator, MemoryStore},
};

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn insert(
        &self,
        user_id: UserId,
        title: String,
        content: String,
        create_time: DateTime<Utc>,
    ) -> Result<Post, StoreError>;

    async fn get(&self, id: PostId) -> Result<Option<Post>, StoreError>;

    /// Adds `delta` to the like counter. Returns false when the post does not exist.
    async fn increment_like_count(&self, id: PostId, delta: i64) -> Result<bool, StoreError>;

    /// Returns false when the post does not exist.
    async fn set_like_count(&self, id: PostId, liked: i64) -> Result<bool, StoreError>;

    /// Most liked first. `page` starts at 1.
    async fn hot(&self, page: usize, size: usize) -> Result<Vec<Post>, StoreError>;

    /// Newest first. `page` starts at 1.
    async fn by_author(
        &self,
        user_id: UserId,
        page: usize,
        size: usize,
    ) -> Result<Vec<Post>, StoreError>;
}

#[async_trait]
pub trait ContentResolver: Send + Sync {
    /// Posts in the order of `ids`. Ids that no longer resolve are skipped.
    async fn resolve(&self, ids: &[PostId]) -> Result<Vec<Post>, StoreError>;
}

#[async_trait]
pub trait FollowerDirectory: Send + Sync {
    async fn followers_of(&self, author_id: UserId) -> Result<BTreeSet<UserId>, StoreError>;

    async fn follow(&self, follower_id: UserId, author_id: UserId) -> Result<(), StoreError>;

    async fn unfollow(&self, follower_id: UserId, author_id: UserId) -> Result<(), StoreError>;

    async fn is_following(&self, follower_id: UserId, author_id: UserId)
    -> Result<bool, StoreError>;
}

fn page_bounds(page: usize, size: usize) -> (usize, usize) {
    (page.saturating_sub(1).saturating_mul(size), size)
}

pub struct MemoryPosts {
    ids: Arc<dyn IdGenerator>,
    posts: RwLock<BTreeMap<PostId, Post>>,
}

impl Default for MemoryPosts {
    fn default() -> Self {
        Self::with_ids(Arc::new(MemoryStore::new()))
    }
}

impl MemoryPosts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            ids,
            posts: RwLock::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl PostStore for MemoryPosts {
    async fn insert(
        &self,
        user_id: UserId,
        title: String,
        content: String,
        create_time: DateTime<Utc>,
    ) -> Result<Post, StoreError> {
        let id = self.ids.next_id(BLOG_ID_KEY).await?;
        let post = Post {
            id,
            user_id,
            title,
            content,
            liked: 0,
            create_time,
        };

        self.posts.write().await.insert(id, post.clone());

        Ok(post)
    }

    async fn get(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        Ok(self.posts.read().await.get(&id).cloned())
    }

    async fn increment_like_count(&self, id: PostId, delta: i64) -> Result<bool, StoreError> {
        let mut posts = self.posts.write().await;

        Ok(posts
            .get_mut(&id)
            .map(|post| post.liked += delta)
            .is_some())
    }

    async fn set_like_count(&self, id: PostId, liked: i64) -> Result<bool, StoreError> {
        let mut posts = self.posts.write().await;

        Ok(posts.get_mut(&id).map(|post| post.liked = liked).is_some())
    }

    async fn hot(&self, page: usize, size: usize) -> Result<Vec<Post>, StoreError> {
        let (skip, take) = page_bounds(page, size);

        let mut posts: Vec<Post> = self.posts.read().await.values().cloned().collect();
        posts.sort_by(|a, b| b.liked.cmp(&a.liked).then(a.id.cmp(&b.id)));

        Ok(posts.into_iter().skip(skip).take(take).collect())
    }

    async fn by_author(
        &self,
        user_id: UserId,
        page: usize,
        size: usize,
    ) -> Result<Vec<Post>, StoreError> {
        let (skip, take) = page_bounds(page, size);

        Ok(self
            .posts
            .read()
            .await
            .values()
            .rev()
            .filter(|post| post.user_id == user_id)
            .skip(skip)
            .take(take)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ContentResolver for MemoryPosts {
    async fn resolve(&self, ids: &[PostId]) -> Result<Vec<Post>, StoreError> {
        let posts = self.posts.read().await;

        Ok(ids.iter().filter_map(|id| posts.get(id).cloned()).collect())
    }
}

#[derive(Default)]
pub struct MemoryFollows {
    // author -> followers
    followers: RwLock<HashMap<UserId, BTreeSet<UserId>>>,
}

impl MemoryFollows {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FollowerDirectory for MemoryFollows {
    async fn followers_of(&self, author_id: UserId) -> Result<BTreeSet<UserId>, StoreError> {
        Ok(self
            .followers
            .read()
            .await
            .get(&author_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn follow(&self, follower_id: UserId, author_id: UserId) -> Result<(), StoreError> {
        self.followers
            .write()
            .await
            .entry(author_id)
            .or_default()
            .insert(follower_id);

        Ok(())
    }

    async fn unfollow(&self, follower_id: UserId, author_id: UserId) -> Result<(), StoreError> {
        if let Some(followers) = self.followers.write().await.get_mut(&author_id) {
            followers.remove(&follower_id);
        }

        Ok(())
    }

    async fn is_following(
        &self,
        follower_id: UserId,
        author_id: UserId,
    ) -> Result<bool, StoreError> {
        Ok(self
            .followers
            .read()
            .await
            .get(&author_id)
            .is_some_and(|followers| followers.contains(&follower_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> MemoryPosts {
        let posts = MemoryPosts::new();
        for (author, title) in [(1, "a"), (2, "b"), (1, "c")] {
            posts
                .insert(author, title.into(), String::new(), Utc::now())
                .await
                .unwrap();
        }
        posts
    }

    #[tokio::test]
    async fn test_increment_missing_post() {
        let posts = seeded().await;
        assert!(!posts.increment_like_count(99, 1).await.unwrap());
        assert!(posts.increment_like_count(2, 1).await.unwrap());
        assert_eq!(posts.get(2).await.unwrap().unwrap().liked, 1);
    }

    #[tokio::test]
    async fn test_resolve_preserves_order() {
        let posts = seeded().await;
        let resolved = posts.resolve(&[3, 99, 1]).await.unwrap();
        let ids: Vec<PostId> = resolved.iter().map(|post| post.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[tokio::test]
    async fn test_hot_and_by_author() {
        let posts = seeded().await;
        posts.set_like_count(3, 7).await.unwrap();
        posts.set_like_count(2, 4).await.unwrap();

        let hot: Vec<PostId> = posts.hot(1, 2).await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(hot, vec![3, 2]);
        let second: Vec<PostId> = posts.hot(2, 2).await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(second, vec![1]);

        let mine: Vec<PostId> = posts
            .by_author(1, 1, 10)
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(mine, vec![3, 1]);
    }

    #[test]
    fn test_page_bounds_saturate() {
        assert_eq!(page_bounds(0, 10), (0, 10));
        assert_eq!(page_bounds(3, 10), (20, 10));
        assert_eq!(page_bounds(usize::MAX, 10), (usize::MAX, 10));
    }

    #[tokio::test]
    async fn test_huge_page_is_empty() {
        let posts = seeded().await;
        assert!(posts.hot(usize::MAX, 10).await.unwrap().is_empty());
        assert!(posts.by_author(1, usize::MAX, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ids_survive_rebuild() {
        let ids = Arc::new(MemoryStore::new());

        let before = MemoryPosts::with_ids(ids.clone());
        let old = before.insert(1, "old".into(), String::new(), Utc::now()).await.unwrap();

        let after = MemoryPosts::with_ids(ids);
        let new = after.insert(1, "new".into(), String::new(), Utc::now()).await.unwrap();

        assert_ne!(old.id, new.id);
    }

    #[tokio::test]
    async fn test_follow_edges() {
        let follows = MemoryFollows::new();
        follows.follow(10, 1).await.unwrap();
        follows.follow(11, 1).await.unwrap();
        follows.follow(10, 1).await.unwrap();
        assert_eq!(follows.followers_of(1).await.unwrap().len(), 2);

        follows.unfollow(10, 1).await.unwrap();
        assert!(!follows.is_following(10, 1).await.unwrap());
        assert!(follows.is_following(11, 1).await.unwrap());
        assert!(follows.followers_of(2).await.unwrap().is_empty());
    }
}
