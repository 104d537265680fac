//! Pagination Driver
//!
//! Walks the trade feed backward in time. Each page is requested for
//! `[range start, watermark]`; afterwards the watermark moves to just before
//! the oldest trade of the page and every bucket that can no longer receive
//! trades is flushed. An empty page ends the run.
//!
//! ```text
//!   Running ──(empty page)──▶ Draining ──(flush all)──▶ Done
//!      │                          │
//!      └──(fetch / sink error)────┴──────────────────▶ Failed
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::bucket_store::{BucketStore, InsertOutcome};
use super::fetch::{FetchError, TradeSource};
use super::flush::{FlushPolicy, FlushedDay};
use super::sink::{DaySink, SinkError};
use crate::config::BackfillConfig;
use crate::models::TimeWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverState {
    Running,
    /// Range exhausted; writing the remaining buckets
    Draining,
    Failed,
    Done,
}

/// Errors that end a run. None of them are retried.
#[derive(Debug, Clone)]
pub enum BackfillError {
    Fetch {
        window: TimeWindow,
        source: FetchError,
    },
    /// Upstream answered with `success: false`
    Upstream { window: TimeWindow },
    Sink(SinkError),
}

impl std::fmt::Display for BackfillError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch { window, source } => write!(
                f,
                "cannot get trades for [{}, {}]: {}",
                window.start, window.end, source
            ),
            Self::Upstream { window } => write!(
                f,
                "upstream reported failure for [{}, {}]",
                window.start, window.end
            ),
            Self::Sink(e) => write!(f, "cannot save trades: {}", e),
        }
    }
}

impl std::error::Error for BackfillError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Fetch { source, .. } => Some(source),
            Self::Upstream { .. } => None,
            Self::Sink(e) => Some(e),
        }
    }
}

impl From<SinkError> for BackfillError {
    fn from(e: SinkError) -> Self {
        Self::Sink(e)
    }
}

/// Receipt of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub market: String,
    pub range_start: DateTime<Utc>,
    pub range_end: DateTime<Utc>,
    pub pages: u64,
    /// Records received across all pages, repeats included
    pub trades_received: u64,
    pub duplicates: u64,
    /// Records for a day that had already been written
    pub late_trades_dropped: u64,
    /// Pages that did not move the request bound back by a full second
    pub boundary_skips: u64,
    pub peak_open_buckets: usize,
    pub final_watermark: DateTime<Utc>,
    pub files: Vec<FlushedDay>,
}

impl RunSummary {
    fn new(market: &str, range: TimeWindow) -> Self {
        Self {
            market: market.to_string(),
            range_start: range.start,
            range_end: range.end,
            pages: 0,
            trades_received: 0,
            duplicates: 0,
            late_trades_dropped: 0,
            boundary_skips: 0,
            peak_open_buckets: 0,
            final_watermark: range.end,
            files: Vec::new(),
        }
    }

    pub fn trades_written(&self) -> usize {
        self.files.iter().map(|f| f.trades).sum()
    }
}

pub struct BackfillDriver<S: TradeSource, K: DaySink> {
    config: BackfillConfig,
    source: S,
    sink: K,
    store: BucketStore,
    policy: FlushPolicy,
    state: DriverState,
    watermark: DateTime<Utc>,
}

impl<S: TradeSource, K: DaySink> BackfillDriver<S, K> {
    pub fn new(config: BackfillConfig, source: S, sink: K) -> Self {
        let policy = FlushPolicy::new(config.sort_ascending);
        let watermark = config.window().end;
        Self {
            config,
            source,
            sink,
            store: BucketStore::new(),
            policy,
            state: DriverState::Running,
            watermark,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Inclusive upper bound of the next request.
    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Download the configured range. On error only buckets already closed
    /// by the watermark have been written.
    pub async fn run(&mut self) -> Result<RunSummary, BackfillError> {
        let range = self.config.window();
        self.store.clear();
        self.watermark = range.end;
        self.state = DriverState::Running;

        let mut summary = RunSummary::new(&self.config.market, range);
        info!(
            market = %self.config.market,
            source = self.source.name(),
            start = %range.start,
            end = %range.end,
            "Starting trade backfill"
        );

        while self.state != DriverState::Done {
            if let Err(e) = self.step(range.start, &mut summary).await {
                self.state = DriverState::Failed;
                error!(
                    error = %e,
                    watermark = %self.watermark,
                    open_buckets = self.store.len(),
                    "Backfill aborted; open buckets discarded"
                );
                return Err(e);
            }
        }

        summary.final_watermark = self.watermark;
        info!(
            pages = summary.pages,
            files = summary.files.len(),
            trades = summary.trades_written(),
            duplicates = summary.duplicates,
            "Received all trades"
        );
        Ok(summary)
    }

    async fn step(
        &mut self,
        range_start: DateTime<Utc>,
        summary: &mut RunSummary,
    ) -> Result<(), BackfillError> {
        match self.state {
            DriverState::Running => self.fetch_page(range_start, summary).await,
            DriverState::Draining => {
                let written = self.policy.flush_all(&mut self.store, &mut self.sink)?;
                summary.files.extend(written);
                self.state = DriverState::Done;
                Ok(())
            }
            DriverState::Done | DriverState::Failed => Ok(()),
        }
    }

    async fn fetch_page(
        &mut self,
        range_start: DateTime<Utc>,
        summary: &mut RunSummary,
    ) -> Result<(), BackfillError> {
        if self.watermark < range_start {
            debug!(watermark = %self.watermark, "Watermark passed range start");
            self.state = DriverState::Draining;
            return Ok(());
        }

        let window = TimeWindow::new(range_start, self.watermark);
        let page = self
            .source
            .fetch(&self.config.market, &window)
            .await
            .map_err(|source| BackfillError::Fetch { window, source })?;
        summary.pages += 1;

        if !page.success {
            return Err(BackfillError::Upstream { window });
        }
        if page.is_exhausted() {
            self.state = DriverState::Draining;
            return Ok(());
        }

        let mut oldest: Option<DateTime<Utc>> = None;
        for trade in page.trades {
            summary.trades_received += 1;
            let time = trade.time_utc();
            oldest = Some(oldest.map_or(time, |o| o.min(time)));

            let day = trade.day_key();
            if self.store.is_flushed(day) {
                error!(
                    trade_id = trade.id(),
                    %day,
                    "Trade arrived for a day that was already written; dropping"
                );
                summary.late_trades_dropped += 1;
                continue;
            }
            if self.store.insert(trade) == InsertOutcome::Duplicate {
                summary.duplicates += 1;
            }
        }
        summary.peak_open_buckets = summary.peak_open_buckets.max(self.store.len());

        if let Some(oldest) = oldest {
            self.advance_watermark(oldest, summary);
        }
        debug!(
            page = summary.pages,
            watermark = %self.watermark,
            open_buckets = self.store.len(),
            "Page processed"
        );

        let written = self
            .policy
            .flush_closed(&mut self.store, self.watermark, &mut self.sink)?;
        summary.files.extend(written);

        if !self.config.page_delay.is_zero() {
            tokio::time::sleep(self.config.page_delay).await;
        }
        Ok(())
    }

    /// Move the watermark strictly before `oldest`. Requests carry whole
    /// seconds, so the bound must drop by at least one second per page or the
    /// same page could come back forever; if it would not, the boundary second
    /// is skipped.
    fn advance_watermark(&mut self, oldest: DateTime<Utc>, summary: &mut RunSummary) {
        let prev_end_s = self.watermark.timestamp();
        let candidate = (oldest - Duration::nanoseconds(1)).min(self.watermark);

        self.watermark = if candidate.timestamp() < prev_end_s {
            candidate
        } else {
            summary.boundary_skips += 1;
            let second_start =
                self.watermark - Duration::nanoseconds(self.watermark.timestamp_subsec_nanos() as i64);
            warn!(
                oldest = %oldest,
                second = prev_end_s,
                "Page did not move past its boundary second; excluding it"
            );
            second_start - Duration::nanoseconds(1)
        };
    }
}
