//! Redis key naming.
//!
//! ```text
//! blog:id                      → counter handing out post ids
//! blog:liked:{post_id}         → sorted set of user ids, scored by like time (ms)
//! feed:{user_id}               → sorted set of post ids, scored by publish time (ms)
//! sign:{user_id}:{yyyyMM}      → bitmap, bit (day - 1) set when signed in that day
//! ```
use chrono::{Datelike, NaiveDate};

use crate::models::{PostId, UserId};

pub const BLOG_ID_KEY: &str = "blog:id";
pub const BLOG_LIKED_KEY: &str = "blog:liked:";
pub const FEED_KEY: &str = "feed:";
pub const USER_SIGN_KEY: &str = "sign:";

pub fn like_set_key(post_id: PostId) -> String {
    format!("{BLOG_LIKED_KEY}{post_id}")
}

pub fn inbox_key(user_id: UserId) -> String {
    format!("{FEED_KEY}{user_id}")
}

pub fn bitmap_key(user_id: UserId, date: NaiveDate) -> String {
    format!(
        "{USER_SIGN_KEY}{user_id}:{:04}{:02}",
        date.year(),
        date.month()
    )
}
