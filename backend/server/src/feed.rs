//! # Timeline
//!
//! Push model. Publishing writes the post id into `feed:{follower}` for every
//! follower, scored by publish time, so a read costs one range query of page
//! size no matter how many authors the reader follows.
//!
//! ## Scrolling
//!
//! Pages are read newest first with `ZREVRANGEBYSCORE feed max 0 LIMIT offset count`.
//! The cursor handed back is the smallest score on the page (`min_time`) and
//! how many items on the page share it (`offset`). The next read uses
//! `min_time` as its inclusive max and skips `offset` items, which are exactly
//! the ones already returned at that timestamp.
//!
//! When a run of equal timestamps is longer than a page, every item on the
//! page sits at the incoming max, so the incoming offset is carried forward.
//!
//! Entries are never removed here. Unfollowing does not retract old
//! deliveries and a crash mid fan-out leaves a partial delivery.
use std::{collections::BTreeSet, sync::Arc};

use tracing::debug;

use crate::{
    error::StoreError,
    keys::inbox_key,
    models::{Cursor, PostId, UserId},
    store::RankedStore,
};

/// One page of post ids plus the cursor for the next page.
#[derive(Debug, PartialEq)]
pub struct FeedPage {
    pub ids: Vec<PostId>,
    pub cursor: Cursor,
}

/// Cursor for the page following `entries`, which must be in the order the
/// store returned them (score descending). `None` for an empty page.
pub fn next_cursor<T>(entries: &[(T, i64)], max_score: Option<i64>, offset: usize) -> Option<Cursor> {
    let ((_, first), rest) = entries.split_first()?;

    let mut min_time = *first;
    let mut next_offset: usize = 1;

    for (_, score) in rest {
        if *score == min_time {
            next_offset += 1;
        } else if *score < min_time {
            min_time = *score;
            next_offset = 1;
        }
    }

    if max_score == Some(min_time) {
        next_offset = next_offset.saturating_add(offset);
    }

    Some(Cursor {
        min_time,
        offset: next_offset,
    })
}

#[derive(Clone)]
pub struct Timeline {
    store: Arc<dyn RankedStore>,
}

impl Timeline {
    pub fn new(store: Arc<dyn RankedStore>) -> Self {
        Self { store }
    }

    /// Writes `post_id` into every follower's inbox. Returns how many were written.
    pub async fn publish(
        &self,
        author_id: UserId,
        post_id: PostId,
        followers: &BTreeSet<UserId>,
        publish_millis: i64,
    ) -> Result<usize, StoreError> {
        let member = post_id.to_string();

        for follower in followers {
            self.store
                .add_or_update(&inbox_key(*follower), &member, publish_millis as f64)
                .await?;
        }

        debug!(author_id, post_id, followers = followers.len(), "Fanned out post");

        Ok(followers.len())
    }

    /// `max_score` of `None` starts from the newest entry.
    pub async fn read_page(
        &self,
        viewer_id: UserId,
        max_score: Option<i64>,
        offset: usize,
        page_size: usize,
    ) -> Result<Option<FeedPage>, StoreError> {
        let max = max_score.map_or(f64::INFINITY, |max| max as f64);

        let entries = self
            .store
            .range_descending_by_score_with_scores(&inbox_key(viewer_id), max, 0.0, offset, page_size)
            .await?
            .into_iter()
            .map(|(member, score)| {
                member
                    .parse::<PostId>()
                    .map(|id| (id, score as i64))
                    .map_err(|_| StoreError::Decode(format!("post id {member:?}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let Some(cursor) = next_cursor(&entries, max_score, offset) else {
            return Ok(None);
        };

        Ok(Some(FeedPage {
            ids: entries.into_iter().map(|(id, _)| id).collect(),
            cursor,
        }))
    }
}
