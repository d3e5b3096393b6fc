use std::{env, fmt::Display, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub store_timeout: Duration,
    pub feed_page_size: usize,
    pub likers_limit: usize,
    pub max_page_size: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(Self {
            port: try_load("RUST_PORT", "1111")?,
            redis_url: try_load("REDIS_URL", "redis://redis:6379")?,
            store_timeout: Duration::from_millis(try_load("STORE_TIMEOUT_MS", "250")?),
            feed_page_size: try_load("FEED_PAGE_SIZE", "2")?,
            likers_limit: try_load("LIKERS_LIMIT", "5")?,
            max_page_size: try_load("MAX_PAGE_SIZE", "10")?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 1111,
            redis_url: "redis://redis:6379".to_string(),
            store_timeout: Duration::from_millis(250),
            feed_page_size: 2,
            likers_limit: 5,
            max_page_size: 10,
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            anyhow::anyhow!("{e}")
        })
        .with_context(|| format!("Environment misconfigured: {key}={raw}"))
}
