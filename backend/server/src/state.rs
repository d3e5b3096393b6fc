use std::sync::Arc;

use anyhow::Result;

use crate::{
    blog::Blogs,
    config::Config,
    database::{RedisStore, init_redis},
    directory::{ContentResolver, FollowerDirectory, MemoryFollows, MemoryPosts, PostStore},
    feed::Timeline,
    likes::Ledger,
    sign::Attendance,
    store::{BitStore, RankedStore},
};

pub struct AppState {
    pub config: Config,
    pub blogs: Blogs,
    pub attendance: Attendance,
}

impl AppState {
    pub async fn new() -> Result<Arc<Self>> {
        let config = Config::load()?;

        let connection = init_redis(&config.redis_url, config.store_timeout).await?;
        let redis = Arc::new(RedisStore::new(connection, config.store_timeout));

        Ok(Self::assemble(
            config,
            redis.clone(),
            redis.clone(),
            Arc::new(MemoryPosts::with_ids(redis)),
            Arc::new(MemoryFollows::new()),
        ))
    }

    pub fn assemble<P>(
        config: Config,
        ranked: Arc<dyn RankedStore>,
        bits: Arc<dyn BitStore>,
        posts: Arc<P>,
        follows: Arc<dyn FollowerDirectory>,
    ) -> Arc<Self>
    where
        P: PostStore + ContentResolver + 'static,
    {
        let ledger = Ledger::new(ranked.clone(), posts.clone());
        let timeline = Timeline::new(ranked);
        let blogs = Blogs::new(ledger, timeline, posts.clone(), posts, follows);

        Arc::new(Self {
            config,
            blogs,
            attendance: Attendance::new(bits),
        })
    }
}
