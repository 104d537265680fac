//! Shared fixtures for backfill integration tests: trade builders, a scripted
//! page source, a simulated upstream honoring request bounds, and an
//! in-memory day sink.

#![allow(dead_code)]

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

use ftxu_backfill::backfill::{DaySink, FetchError, SinkError, TradePage, TradeSource};
use ftxu_backfill::models::{DayKey, TimeWindow, Trade};

pub fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("valid RFC3339")
        .with_timezone(&Utc)
}

/// Build a trade the way the API delivers it.
pub fn trade_at(id: u64, price: f64, side: &str, size: f64, time: DateTime<Utc>) -> Trade {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "liquidation": false,
        "price": price,
        "side": side,
        "size": size,
        "time": time.to_rfc3339_opts(SecondsFormat::Nanos, false),
    }))
    .expect("valid trade json")
}

pub fn trade(id: u64, time: &str) -> Trade {
    trade_at(id, 38000.0 + id as f64, "buy", 0.5, utc(time))
}

// =============================================================================
// SOURCES
// =============================================================================

/// Replays canned pages in order, then empty pages.
pub struct ScriptedSource {
    pages: Mutex<VecDeque<Result<TradePage, FetchError>>>,
    windows: Mutex<Vec<TimeWindow>>,
}

impl ScriptedSource {
    pub fn new(pages: Vec<Result<TradePage, FetchError>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            windows: Mutex::new(Vec::new()),
        }
    }

    pub fn windows(&self) -> Vec<TimeWindow> {
        self.windows.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TradeSource for ScriptedSource {
    async fn fetch(&self, _market: &str, window: &TimeWindow) -> Result<TradePage, FetchError> {
        self.windows.lock().unwrap().push(*window);
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(TradePage::ok(Vec::new())))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Upstream model: returns the newest `limit` trades whose whole second lies
/// in `[start_s, end_s]`, in a scrambled order.
pub struct SimulatedFeed {
    trades: Vec<Trade>,
    limit: usize,
    scramble: u64,
    windows: Mutex<Vec<TimeWindow>>,
}

impl SimulatedFeed {
    pub fn new(trades: Vec<Trade>, limit: usize, scramble: u64) -> Self {
        Self {
            trades,
            limit,
            scramble,
            windows: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> usize {
        self.windows.lock().unwrap().len()
    }

    pub fn windows(&self) -> Vec<TimeWindow> {
        self.windows.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TradeSource for SimulatedFeed {
    async fn fetch(&self, _market: &str, window: &TimeWindow) -> Result<TradePage, FetchError> {
        self.windows.lock().unwrap().push(*window);
        let (start_s, end_s) = window.unix_bounds();

        let mut hits: Vec<Trade> = self
            .trades
            .iter()
            .filter(|t| {
                let s = t.time().timestamp();
                s >= start_s && s <= end_s
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.time().cmp(&a.time()).then(b.id().cmp(&a.id())));
        hits.truncate(self.limit);

        if !hits.is_empty() {
            let len = hits.len();
            hits.rotate_left((self.scramble as usize) % len);
            if self.scramble & 1 == 1 {
                hits.reverse();
            }
        }
        Ok(TradePage::ok(hits))
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

// =============================================================================
// SINK
// =============================================================================

#[derive(Default)]
pub struct MemorySink {
    pub days: Vec<(DayKey, Vec<Trade>)>,
}

impl MemorySink {
    pub fn ids(&self, index: usize) -> Vec<u64> {
        self.days[index].1.iter().map(|t| t.id()).collect()
    }
}

impl DaySink for MemorySink {
    fn write_day(&mut self, day: DayKey, trades: &[Trade]) -> Result<PathBuf, SinkError> {
        self.days.push((day, trades.to_vec()));
        Ok(PathBuf::from(day.compact()))
    }
}
