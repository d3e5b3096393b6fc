//! # Redis
//!
//! RAM database.
//!
//! Holds the derived engagement indexes. The relational record of posts and
//! follow edges stays authoritative; everything here can be rebuilt from it.
//!
//! ## Requirements
//!
//! - O(log N) membership and rank for likes
//! - O(page size) timeline reads no matter how many authors a user follows
//! - One bit per user per day for sign-ins
//!
//! ## Implementation
//!
//! - Likes: sorted set per post, member = user id, score = like time in ms
//! - Timeline: sorted set per follower, member = post id, score = publish time in ms
//! - Sign-ins: string bitmap per user per month, read back with `BITFIELD GET u{day} 0`
//! - Post ids: `INCR blog:id`, so ids never repeat across restarts
//! - Estimated memory usage for sign-ins:
//!   (4 bytes (31 bits) + ~20 bytes (key overhead)) × 50,000 users = roughly 1.2 MB / month
//!
//! Every call is bounded by the configured store timeout and is never retried
//! here. A timed out or failed call surfaces as [`StoreError`].
use std::{future::Future, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use redis::{
    AsyncCommands, Client, RedisResult,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use tokio::time::timeout;
use tracing::info;

use crate::{
    error::StoreError,
    store::{BitStore, IdGenerator, RankedStore},
};

pub async fn init_redis(redis_url: &str, response_timeout: Duration) -> Result<ConnectionManager> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100))
        .set_response_timeout(response_timeout);

    let client = Client::open(redis_url)?;
    let connection_manager = client.get_connection_manager_with_config(config).await?;

    info!("Connected to Redis at {redis_url}");

    Ok(connection_manager)
}

#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    timeout: Duration,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager, timeout: Duration) -> Self {
        Self {
            connection,
            timeout,
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        bounded(self.timeout, call).await
    }
}

/// Polls `call` once, giving up after `limit`.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = RedisResult<T>>,
{
    match timeout(limit, call).await {
        Ok(result) => result.map_err(StoreError::from),
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

/// `LIMIT offset count` arguments, or `None` when either does not fit.
fn limit_args(offset: usize, count: usize) -> Option<(isize, isize)> {
    Some((isize::try_from(offset).ok()?, isize::try_from(count).ok()?))
}

fn score_bound(score: f64) -> String {
    if score == f64::INFINITY {
        "+inf".to_string()
    } else if score == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        score.to_string()
    }
}

#[async_trait]
impl RankedStore for RedisStore {
    async fn add_or_update(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();

        self.bounded(connection.zadd::<_, _, _, ()>(key, member, score))
            .await
    }

    async fn remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();

        self.bounded(connection.zrem::<_, _, ()>(key, member)).await
    }

    async fn score(&self, key: &str, member: &str) -> Result<Option<f64>, StoreError> {
        let mut connection = self.connection.clone();

        self.bounded(connection.zscore(key, member)).await
    }

    async fn range_ascending(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        let mut connection = self.connection.clone();

        self.bounded(connection.zrange(key, start, stop)).await
    }

    async fn range_descending_by_score_with_scores(
        &self,
        key: &str,
        max: f64,
        min: f64,
        offset: usize,
        count: usize,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        // past isize::MAX there is nothing left to page through
        let Some((offset, count)) = limit_args(offset, count) else {
            return Ok(Vec::new());
        };

        let mut connection = self.connection.clone();

        self.bounded(connection.zrevrangebyscore_limit_withscores(
            key,
            score_bound(max),
            score_bound(min),
            offset,
            count,
        ))
        .await
    }

    async fn cardinality(&self, key: &str) -> Result<u64, StoreError> {
        let mut connection = self.connection.clone();

        self.bounded(connection.zcard(key)).await
    }
}

#[async_trait]
impl BitStore for RedisStore {
    async fn set_bit(&self, key: &str, offset: usize, value: bool) -> Result<bool, StoreError> {
        let mut connection = self.connection.clone();

        self.bounded(connection.setbit(key, offset, value)).await
    }

    async fn get_bit(&self, key: &str, offset: usize) -> Result<bool, StoreError> {
        let mut connection = self.connection.clone();

        self.bounded(connection.getbit(key, offset)).await
    }

    async fn get_unsigned(&self, key: &str, width: u8) -> Result<Option<u64>, StoreError> {
        let mut connection = self.connection.clone();

        let mut command = redis::cmd("BITFIELD");
        command.arg(key).arg("GET").arg(format!("u{width}")).arg(0);

        let fields: Vec<Option<u64>> = self.bounded(command.query_async(&mut connection)).await?;

        Ok(fields.into_iter().next().flatten())
    }
}

#[async_trait]
impl IdGenerator for RedisStore {
    async fn next_id(&self, key: &str) -> Result<u64, StoreError> {
        let mut connection = self.connection.clone();

        self.bounded(connection.incr(key, 1)).await
    }
}
