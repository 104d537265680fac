//! Flush Policy
//!
//! Pages are requested newest-first with an inclusive upper bound (the
//! watermark), so once the watermark has moved into day D no later page can
//! touch any day after D. Those buckets are closed and written out.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

use super::bucket_store::BucketStore;
use super::sink::{DaySink, SinkError};
use crate::models::{DayKey, Trade};

/// One day written by the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlushedDay {
    pub day: DayKey,
    pub date: String,
    pub path: PathBuf,
    pub trades: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct FlushPolicy {
    sort_ascending: bool,
}

impl FlushPolicy {
    pub fn new(sort_ascending: bool) -> Self {
        Self { sort_ascending }
    }

    /// Open buckets whose day is strictly after the watermark's day.
    pub fn closed_buckets(&self, store: &BucketStore, watermark: DateTime<Utc>) -> Vec<DayKey> {
        store
            .buckets_strictly_after(DayKey::of(&watermark))
            .into_iter()
            .map(|(key, _)| key)
            .collect()
    }

    /// Output order of one bucket: by `(time, id)` when ascending, else as inserted.
    pub fn order(&self, trades: &mut [Trade]) {
        if self.sort_ascending {
            trades.sort_unstable_by(|a, b| a.time().cmp(&b.time()).then(a.id().cmp(&b.id())));
        }
    }

    /// Write the given buckets, newest day first. A bucket leaves the store
    /// once the sink accepted it; a sink error stops the batch.
    pub fn flush(
        &self,
        store: &mut BucketStore,
        keys: &[DayKey],
        sink: &mut dyn DaySink,
    ) -> Result<Vec<FlushedDay>, SinkError> {
        // Buckets are independent; sort them in parallel, in place.
        store
            .buckets_mut(keys)
            .par_iter_mut()
            .for_each(|(_, bucket)| bucket.reorder(|trades| self.order(trades)));

        let mut written = Vec::with_capacity(keys.len());
        for &day in keys {
            let Some(bucket) = store.get(day) else {
                continue;
            };
            let path = sink.write_day(day, bucket.trades())?;
            let trades = store.remove(day).unwrap_or_default();
            debug!(day = %day, trades, "Flushed bucket");
            written.push(FlushedDay {
                day,
                date: day.to_string(),
                path,
                trades,
            });
        }
        Ok(written)
    }

    /// Flush every bucket the watermark has closed.
    pub fn flush_closed(
        &self,
        store: &mut BucketStore,
        watermark: DateTime<Utc>,
        sink: &mut dyn DaySink,
    ) -> Result<Vec<FlushedDay>, SinkError> {
        let keys = self.closed_buckets(store, watermark);
        self.flush(store, &keys, sink)
    }

    /// Flush everything still open (range exhausted).
    pub fn flush_all(
        &self,
        store: &mut BucketStore,
        sink: &mut dyn DaySink,
    ) -> Result<Vec<FlushedDay>, SinkError> {
        let mut keys = store.open_buckets();
        keys.reverse();
        self.flush(store, &keys, sink)
    }
}
