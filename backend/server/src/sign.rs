//! # Sign-ins
//!
//! One bitmap per user per month under `sign:{user_id}:{yyyyMM}`. Day `d` is
//! bit `d - 1`, counted from the most significant bit of the first byte.
//!
//! The streak reads the first `d` bits as one unsigned integer, which puts
//! today in the least significant bit, and counts trailing ones. A streak does
//! not carry over from the previous month's bitmap.
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::{error::StoreError, keys::bitmap_key, models::UserId, store::BitStore};

/// Consecutive set bits ending at the least significant bit.
pub fn trailing_streak(signs: u64) -> u32 {
    signs.trailing_ones()
}

#[derive(Clone)]
pub struct Attendance {
    store: Arc<dyn BitStore>,
}

impl Attendance {
    pub fn new(store: Arc<dyn BitStore>) -> Self {
        Self { store }
    }

    /// Returns true the first time the user signs in on `date`.
    pub async fn mark_present(&self, user_id: UserId, date: NaiveDate) -> Result<bool, StoreError> {
        let offset = date.day0() as usize;
        let already = self
            .store
            .set_bit(&bitmap_key(user_id, date), offset, true)
            .await?;

        debug!(user_id, %date, already, "Signed in");

        Ok(!already)
    }

    pub async fn signed_on(&self, user_id: UserId, date: NaiveDate) -> Result<bool, StoreError> {
        self.store
            .get_bit(&bitmap_key(user_id, date), date.day0() as usize)
            .await
    }

    /// Consecutive signed-in days ending on `date`, zero if `date` itself is missing.
    pub async fn current_streak(&self, user_id: UserId, date: NaiveDate) -> Result<u32, StoreError> {
        let signs = self
            .store
            .get_unsigned(&bitmap_key(user_id, date), date.day() as u8)
            .await?;

        Ok(match signs {
            None | Some(0) => 0,
            Some(signs) => trailing_streak(signs),
        })
    }
}
