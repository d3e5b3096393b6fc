//! # Store Contracts
//!
//! Narrow surface the engagement features need from the remote store. Redis
//! implements it in [`crate::database::RedisStore`]; [`MemoryStore`] mirrors the
//! Redis reply semantics in-process for tests and local runs.
//!
//! ## Sorted sets
//! - Members are unique per key, each with an `f64` score
//! - Equal scores order members lexicographically, as Redis does
//! - Rank ranges are inclusive on both ends and accept negative indices
//!
//! ## Bitmaps
//! - Offset 0 is the most significant bit of the first byte
//! - Reading `u{width}` at offset 0 yields the first `width` bits as an
//!   unsigned integer, first bit most significant
use std::{cmp::Ordering, collections::HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StoreError;

#[async_trait]
pub trait RankedStore: Send + Sync {
    /// Upsert `member` with `score`.
    async fn add_or_update(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError>;

    /// No-op if `member` is absent.
    async fn remove(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn score(&self, key: &str, member: &str) -> Result<Option<f64>, StoreError>;

    /// Members ranked `start..=stop` by ascending score.
    async fn range_ascending(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError>;

    /// Members with `min <= score <= max`, highest first, skipping `offset` and
    /// returning at most `count`.
    async fn range_descending_by_score_with_scores(
        &self,
        key: &str,
        max: f64,
        min: f64,
        offset: usize,
        count: usize,
    ) -> Result<Vec<(String, f64)>, StoreError>;

    async fn cardinality(&self, key: &str) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait BitStore: Send + Sync {
    /// Sets the bit and returns its previous value.
    async fn set_bit(&self, key: &str, offset: usize, value: bool) -> Result<bool, StoreError>;

    async fn get_bit(&self, key: &str, offset: usize) -> Result<bool, StoreError>;

    /// `BITFIELD key GET u{width} 0`. `width` must be in `1..=63`, the widest
    /// unsigned field Redis reads.
    async fn get_unsigned(&self, key: &str, width: u8) -> Result<Option<u64>, StoreError>;
}

/// Monotonic id source that outlives the process, `INCR` on Redis.
#[async_trait]
pub trait IdGenerator: Send + Sync {
    async fn next_id(&self, key: &str) -> Result<u64, StoreError>;
}

#[derive(Default)]
pub struct MemoryStore {
    sorted_sets: Mutex<HashMap<String, HashMap<String, f64>>>,
    bitmaps: Mutex<HashMap<String, Vec<u8>>>,
    counters: Mutex<HashMap<String, u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn by_score(a: &(String, f64), b: &(String, f64)) -> Ordering {
    a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0))
}

fn sorted(set: &HashMap<String, f64>) -> Vec<(String, f64)> {
    let mut entries: Vec<(String, f64)> = set.iter().map(|(m, s)| (m.clone(), *s)).collect();
    entries.sort_by(by_score);
    entries
}

/// Resolves a Redis-style inclusive rank window against `len` members.
fn rank_window(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if len == 0 || start > stop || start >= len {
        return None;
    }

    Some((start as usize, stop as usize))
}

#[async_trait]
impl RankedStore for MemoryStore {
    async fn add_or_update(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        let mut sets = self.sorted_sets.lock().await;
        sets.entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);

        Ok(())
    }

    async fn remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut sets = self.sorted_sets.lock().await;
        if let Some(set) = sets.get_mut(key) {
            set.remove(member);

            if set.is_empty() {
                sets.remove(key);
            }
        }

        Ok(())
    }

    async fn score(&self, key: &str, member: &str) -> Result<Option<f64>, StoreError> {
        let sets = self.sorted_sets.lock().await;

        Ok(sets.get(key).and_then(|set| set.get(member)).copied())
    }

    async fn range_ascending(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        let sets = self.sorted_sets.lock().await;
        let Some(set) = sets.get(key) else {
            return Ok(Vec::new());
        };

        let entries = sorted(set);
        let Some((start, stop)) = rank_window(entries.len(), start, stop) else {
            return Ok(Vec::new());
        };

        Ok(entries[start..=stop]
            .iter()
            .map(|(member, _)| member.clone())
            .collect())
    }

    async fn range_descending_by_score_with_scores(
        &self,
        key: &str,
        max: f64,
        min: f64,
        offset: usize,
        count: usize,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let sets = self.sorted_sets.lock().await;
        let Some(set) = sets.get(key) else {
            return Ok(Vec::new());
        };

        let mut entries = sorted(set);
        entries.reverse();

        Ok(entries
            .into_iter()
            .filter(|(_, score)| *score <= max && *score >= min)
            .skip(offset)
            .take(count)
            .collect())
    }

    async fn cardinality(&self, key: &str) -> Result<u64, StoreError> {
        let sets = self.sorted_sets.lock().await;

        Ok(sets.get(key).map_or(0, |set| set.len() as u64))
    }
}

#[async_trait]
impl BitStore for MemoryStore {
    async fn set_bit(&self, key: &str, offset: usize, value: bool) -> Result<bool, StoreError> {
        let mut bitmaps = self.bitmaps.lock().await;
        let bytes = bitmaps.entry(key.to_string()).or_default();

        let index = offset / 8;
        let mask = 0x80u8 >> (offset % 8);
        if bytes.len() <= index {
            bytes.resize(index + 1, 0);
        }

        let previous = bytes[index] & mask != 0;
        if value {
            bytes[index] |= mask;
        } else {
            bytes[index] &= !mask;
        }

        Ok(previous)
    }

    async fn get_bit(&self, key: &str, offset: usize) -> Result<bool, StoreError> {
        let bitmaps = self.bitmaps.lock().await;

        Ok(bitmaps
            .get(key)
            .and_then(|bytes| bytes.get(offset / 8))
            .is_some_and(|byte| byte & (0x80u8 >> (offset % 8)) != 0))
    }

    async fn get_unsigned(&self, key: &str, width: u8) -> Result<Option<u64>, StoreError> {
        let bitmaps = self.bitmaps.lock().await;
        let Some(bytes) = bitmaps.get(key) else {
            return Ok(None);
        };

        let mut value = 0u64;
        for offset in 0..usize::from(width.min(63)) {
            let bit = bytes
                .get(offset / 8)
                .is_some_and(|byte| byte & (0x80u8 >> (offset % 8)) != 0);
            value = (value << 1) | u64::from(bit);
        }

        Ok(Some(value))
    }
}

#[async_trait]
impl IdGenerator for MemoryStore {
    async fn next_id(&self, key: &str) -> Result<u64, StoreError> {
        let mut counters = self.counters.lock().await;
        let counter = counters.entry(key.to_string()).or_default();
        *counter += 1;

        Ok(*counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_window() {
        assert_eq!(rank_window(5, 0, 4), Some((0, 4)));
        assert_eq!(rank_window(3, 0, 4), Some((0, 2)));
        assert_eq!(rank_window(3, -2, -1), Some((1, 2)));
        assert_eq!(rank_window(0, 0, 4), None);
        assert_eq!(rank_window(3, 3, 5), None);
        assert_eq!(rank_window(3, 2, 1), None);
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_member() {
        let store = MemoryStore::new();
        store.add_or_update("k", "a", 1.0).await.unwrap();
        store.add_or_update("k", "a", 5.0).await.unwrap();

        assert_eq!(store.cardinality("k").await.unwrap(), 1);
        assert_eq!(store.score("k", "a").await.unwrap(), Some(5.0));
    }

    #[tokio::test]
    async fn test_remove_absent_is_noop() {
        let store = MemoryStore::new();
        store.remove("k", "ghost").await.unwrap();
        store.add_or_update("k", "a", 1.0).await.unwrap();
        store.remove("k", "ghost").await.unwrap();

        assert_eq!(store.cardinality("k").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_descending_ties_are_reverse_lexicographic() {
        let store = MemoryStore::new();
        store.add_or_update("k", "a", 100.0).await.unwrap();
        store.add_or_update("k", "b", 100.0).await.unwrap();
        store.add_or_update("k", "c", 90.0).await.unwrap();

        let page = store
            .range_descending_by_score_with_scores("k", f64::INFINITY, 0.0, 0, 10)
            .await
            .unwrap();
        let members: Vec<&str> = page.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(members, vec!["b", "a", "c"]);

        let bounded = store
            .range_descending_by_score_with_scores("k", 95.0, 0.0, 0, 10)
            .await
            .unwrap();
        assert_eq!(bounded, vec![("c".to_string(), 90.0)]);
    }

    #[tokio::test]
    async fn test_bits_are_msb_first() {
        let store = MemoryStore::new();
        assert!(!store.set_bit("b", 0, true).await.unwrap());
        assert!(store.set_bit("b", 0, true).await.unwrap());
        store.set_bit("b", 2, true).await.unwrap();

        assert!(store.get_bit("b", 2).await.unwrap());
        assert!(!store.get_bit("b", 1).await.unwrap());
        assert!(!store.get_bit("b", 40).await.unwrap());

        // bits 0..3 are 1,0,1
        assert_eq!(store.get_unsigned("b", 3).await.unwrap(), Some(0b101));
        // reading past the stored bytes pads with zeros
        assert_eq!(store.get_unsigned("b", 10).await.unwrap(), Some(0b1010000000));
        assert_eq!(store.get_unsigned("missing", 3).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_widest_unsigned_read() {
        let store = MemoryStore::new();
        for offset in 0..63 {
            store.set_bit("b", offset, true).await.unwrap();
        }
        store.set_bit("b", 63, true).await.unwrap();

        assert_eq!(store.get_unsigned("b", 63).await.unwrap(), Some(u64::MAX >> 1));
    }

    #[tokio::test]
    async fn test_ids_count_up_per_key() {
        let store = MemoryStore::new();
        assert_eq!(store.next_id("blog:id").await.unwrap(), 1);
        assert_eq!(store.next_id("blog:id").await.unwrap(), 2);
        assert_eq!(store.next_id("other").await.unwrap(), 1);
    }
}
