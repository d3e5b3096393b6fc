//! # Blogs
//!
//! Request-level flows over the authoritative records and the Redis indexes.
//! The viewer is always passed in explicitly.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::{
    directory::{ContentResolver, FollowerDirectory, PostStore},
    error::AppError,
    feed::Timeline,
    likes::Ledger,
    models::{NewPost, Post, PostId, PostView, ScrollResult, UserId},
};

#[derive(Clone)]
pub struct Blogs {
    pub ledger: Ledger,
    pub timeline: Timeline,
    posts: Arc<dyn PostStore>,
    resolver: Arc<dyn ContentResolver>,
    follows: Arc<dyn FollowerDirectory>,
}

impl Blogs {
    pub fn new(
        ledger: Ledger,
        timeline: Timeline,
        posts: Arc<dyn PostStore>,
        resolver: Arc<dyn ContentResolver>,
        follows: Arc<dyn FollowerDirectory>,
    ) -> Self {
        Self {
            ledger,
            timeline,
            posts,
            resolver,
            follows,
        }
    }

    /// Saves the post, then pushes it to every current follower.
    pub async fn publish(
        &self,
        author_id: UserId,
        new_post: NewPost,
        now: DateTime<Utc>,
    ) -> Result<PostId, AppError> {
        let post = self
            .posts
            .insert(author_id, new_post.title, new_post.content, now)
            .await?;

        let followers = self.follows.followers_of(author_id).await?;
        let delivered = self
            .timeline
            .publish(author_id, post.id, &followers, post.publish_millis())
            .await?;

        info!(post_id = post.id, author_id, delivered, "Published post");

        Ok(post.id)
    }

    async fn view(&self, post: Post, viewer: Option<UserId>) -> Result<PostView, AppError> {
        let is_like = match viewer {
            Some(user_id) => self.ledger.is_liked_by(post.id, user_id).await?,
            None => false,
        };

        Ok(PostView { post, is_like })
    }

    async fn views(&self, posts: Vec<Post>, viewer: Option<UserId>) -> Result<Vec<PostView>, AppError> {
        let mut views = Vec::with_capacity(posts.len());
        for post in posts {
            views.push(self.view(post, viewer).await?);
        }

        Ok(views)
    }

    pub async fn detail(&self, post_id: PostId, viewer: Option<UserId>) -> Result<PostView, AppError> {
        let post = self
            .posts
            .get(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {post_id}")))?;

        self.view(post, viewer).await
    }

    pub async fn hot(
        &self,
        page: usize,
        size: usize,
        viewer: Option<UserId>,
    ) -> Result<Vec<PostView>, AppError> {
        let posts = self.posts.hot(page, size).await?;

        self.views(posts, viewer).await
    }

    pub async fn by_author(
        &self,
        author_id: UserId,
        page: usize,
        size: usize,
    ) -> Result<Vec<Post>, AppError> {
        Ok(self.posts.by_author(author_id, page, size).await?)
    }

    /// `None` when there is nothing (more) in the viewer's inbox.
    pub async fn follow_feed(
        &self,
        viewer: UserId,
        max_score: Option<i64>,
        offset: usize,
        page_size: usize,
    ) -> Result<Option<ScrollResult>, AppError> {
        let Some(page) = self
            .timeline
            .read_page(viewer, max_score, offset, page_size)
            .await?
        else {
            return Ok(None);
        };

        let posts = self.resolver.resolve(&page.ids).await?;

        Ok(Some(ScrollResult {
            list: self.views(posts, Some(viewer)).await?,
            min_time: page.cursor.min_time,
            offset: page.cursor.offset,
        }))
    }

    pub async fn set_following(
        &self,
        follower_id: UserId,
        author_id: UserId,
        is_follow: bool,
    ) -> Result<(), AppError> {
        if follower_id == author_id {
            return Err(AppError::MalformedPayload);
        }

        if is_follow {
            self.follows.follow(follower_id, author_id).await?;
        } else {
            self.follows.unfollow(follower_id, author_id).await?;
        }

        info!(follower_id, author_id, is_follow, "Updated follow edge");

        Ok(())
    }

    pub async fn is_following(&self, follower_id: UserId, author_id: UserId) -> Result<bool, AppError> {
        Ok(self.follows.is_following(follower_id, author_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{
        directory::{MemoryFollows, MemoryPosts},
        store::MemoryStore,
    };

    fn blogs() -> Blogs {
        let store = Arc::new(MemoryStore::new());
        let posts = Arc::new(MemoryPosts::new());

        Blogs::new(
            Ledger::new(store.clone(), posts.clone()),
            Timeline::new(store),
            posts.clone(),
            posts,
            Arc::new(MemoryFollows::new()),
        )
    }

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    fn new_post(title: &str) -> NewPost {
        NewPost {
            title: title.into(),
            content: String::new(),
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_followers_only() {
        let blogs = blogs();
        blogs.set_following(10, 1, true).await.unwrap();

        let id = blogs.publish(1, new_post("hello"), at(1_000)).await.unwrap();

        let feed = blogs.follow_feed(10, None, 0, 2).await.unwrap().unwrap();
        assert_eq!(feed.list.len(), 1);
        assert_eq!(feed.list[0].post.id, id);
        assert_eq!(feed.min_time, 1_000);
        assert_eq!(feed.offset, 1);

        assert!(blogs.follow_feed(11, None, 0, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unfollow_keeps_delivered_posts() {
        let blogs = blogs();
        blogs.set_following(10, 1, true).await.unwrap();
        blogs.publish(1, new_post("before"), at(1_000)).await.unwrap();

        blogs.set_following(10, 1, false).await.unwrap();
        blogs.publish(1, new_post("after"), at(2_000)).await.unwrap();

        let feed = blogs.follow_feed(10, None, 0, 10).await.unwrap().unwrap();
        let titles: Vec<&str> = feed.list.iter().map(|v| v.post.title.as_str()).collect();
        assert_eq!(titles, vec!["before"]);
    }

    #[tokio::test]
    async fn test_feed_marks_liked_posts() {
        let blogs = blogs();
        blogs.set_following(10, 1, true).await.unwrap();
        let first = blogs.publish(1, new_post("one"), at(1_000)).await.unwrap();
        blogs.publish(1, new_post("two"), at(2_000)).await.unwrap();

        blogs.ledger.toggle_like(first, 10, 3_000).await.unwrap();

        let feed = blogs.follow_feed(10, None, 0, 10).await.unwrap().unwrap();
        let flags: Vec<(&str, bool)> = feed
            .list
            .iter()
            .map(|v| (v.post.title.as_str(), v.is_like))
            .collect();
        assert_eq!(flags, vec![("two", false), ("one", true)]);
    }

    #[tokio::test]
    async fn test_detail_and_hot() {
        let blogs = blogs();
        let quiet = blogs.publish(1, new_post("quiet"), at(1_000)).await.unwrap();
        let loud = blogs.publish(2, new_post("loud"), at(2_000)).await.unwrap();
        blogs.ledger.toggle_like(loud, 5, 10).await.unwrap();

        let detail = blogs.detail(loud, Some(5)).await.unwrap();
        assert!(detail.is_like);
        assert_eq!(detail.post.liked, 1);
        assert!(!blogs.detail(quiet, None).await.unwrap().is_like);
        assert!(matches!(blogs.detail(99, None).await, Err(AppError::NotFound(_))));

        let hot: Vec<PostId> = blogs
            .hot(1, 10, Some(5))
            .await
            .unwrap()
            .iter()
            .map(|v| v.post.id)
            .collect();
        assert_eq!(hot, vec![loud, quiet]);
    }

    #[tokio::test]
    async fn test_cannot_follow_self() {
        let blogs = blogs();
        assert!(matches!(
            blogs.set_following(1, 1, true).await,
            Err(AppError::MalformedPayload)
        ));
    }
}
