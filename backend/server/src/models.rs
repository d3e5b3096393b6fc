use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = u64;
pub type PostId = u64;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub user_id: UserId,
    pub title: String,
    pub content: String,
    pub liked: i64,
    pub create_time: DateTime<Utc>,
}

impl Post {
    pub fn publish_millis(&self) -> i64 {
        self.create_time.timestamp_millis()
    }
}

/// A post as seen by one viewer.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub is_like: bool,
}

#[derive(Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
}

/// Cursor for the next feed page: pass `min_time` back as `lastId` and `offset` as `offset`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub min_time: i64,
    pub offset: usize,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ScrollResult {
    pub list: Vec<PostView>,
    pub min_time: i64,
    pub offset: usize,
}

#[derive(Serialize)]
pub struct Liked {
    pub liked: bool,
}
