//! Day Buckets
//!
//! Open (not yet flushed) trades grouped by UTC day, deduplicated by trade id
//! within each day.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::warn;

use crate::models::{DayKey, Trade};

/// Result of inserting one trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    New,
    /// Same id already present in the day; the stored record was replaced
    Duplicate,
}

/// Trades of one UTC day in first-seen order, indexed by id.
#[derive(Debug, Default)]
pub struct DayBucket {
    trades: Vec<Trade>,
    index: HashMap<u64, usize>,
}

impl DayBucket {
    fn upsert(&mut self, trade: Trade) -> InsertOutcome {
        match self.index.get(&trade.id()) {
            Some(&pos) => {
                self.trades[pos] = trade;
                InsertOutcome::Duplicate
            }
            None => {
                self.index.insert(trade.id(), self.trades.len());
                self.trades.push(trade);
                InsertOutcome::New
            }
        }
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Reorder the trades in place; the id index follows.
    pub fn reorder(&mut self, order: impl FnOnce(&mut [Trade])) {
        order(&mut self.trades);
        self.index = self
            .trades
            .iter()
            .enumerate()
            .map(|(pos, t)| (t.id(), pos))
            .collect();
    }
}

/// Open day buckets plus the set of days already flushed in this run.
#[derive(Debug, Default)]
pub struct BucketStore {
    buckets: BTreeMap<DayKey, DayBucket>,
    flushed: BTreeSet<DayKey>,
}

impl BucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a trade into its day bucket. A repeated id replaces the stored
    /// record (last write wins) and is reported as `Duplicate`.
    pub fn insert(&mut self, trade: Trade) -> InsertOutcome {
        let key = trade.day_key();
        let id = trade.id();
        let outcome = self.buckets.entry(key).or_default().upsert(trade);
        if outcome == InsertOutcome::Duplicate {
            warn!(trade_id = id, day = %key, "Duplicated trade ID");
        }
        outcome
    }

    /// Buckets with key strictly greater than `cutoff`, newest day first.
    pub fn buckets_strictly_after(&self, cutoff: DayKey) -> Vec<(DayKey, &[Trade])> {
        self.buckets
            .range((std::ops::Bound::Excluded(cutoff), std::ops::Bound::Unbounded))
            .rev()
            .map(|(k, b)| (*k, b.trades()))
            .collect()
    }

    /// Mutable access to the listed buckets that are open.
    pub fn buckets_mut(&mut self, keys: &[DayKey]) -> Vec<(DayKey, &mut DayBucket)> {
        self.buckets
            .iter_mut()
            .filter(|(key, _)| keys.contains(key))
            .map(|(key, bucket)| (*key, bucket))
            .collect()
    }

    /// Drop a bucket after it was written out and mark its day flushed.
    /// Returns how many trades it held.
    pub fn remove(&mut self, key: DayKey) -> Option<usize> {
        let bucket = self.buckets.remove(&key)?;
        self.flushed.insert(key);
        Some(bucket.len())
    }

    /// Whether `key` was already flushed in this run.
    pub fn is_flushed(&self, key: DayKey) -> bool {
        self.flushed.contains(&key)
    }

    pub fn get(&self, key: DayKey) -> Option<&DayBucket> {
        self.buckets.get(&key)
    }

    /// Keys of open buckets, oldest first.
    pub fn open_buckets(&self) -> Vec<DayKey> {
        self.buckets.keys().copied().collect()
    }

    /// Number of open buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Ids present in more than one open bucket. Not enforced on insert.
    pub fn ids_in_multiple_buckets(&self) -> Vec<u64> {
        let mut seen: HashMap<u64, usize> = HashMap::new();
        for bucket in self.buckets.values() {
            for t in bucket.trades() {
                *seen.entry(t.id()).or_insert(0) += 1;
            }
        }
        let mut ids: Vec<u64> = seen
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(id, _)| id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Forget all buckets and flush history.
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.flushed.clear();
    }
}
