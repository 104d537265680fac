//! Property-based tests for the backfill driver
//!
//! Runs the driver against a simulated upstream that honors whole-second
//! request bounds, returns at most `limit` newest trades and shuffles each
//! page.
//!
//! Invariants checked:
//! 1. Completeness: every input trade lands in exactly one file
//! 2. Partitioning: each file holds exactly its UTC day's trades
//! 3. Ordering: ascending files are sorted by (time, id)
//! 4. Progress: request end seconds strictly decrease
//! 5. Termination: pages stay within 2 per distinct trade second (+2)

mod common;

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{Duration, NaiveDate};
use common::{trade_at, utc, MemorySink, SimulatedFeed};
use ftxu_backfill::backfill::BackfillDriver;
use ftxu_backfill::models::{DayKey, Trade};
use ftxu_backfill::BackfillConfig;
use proptest::prelude::*;

// ============================================================================
// Fixtures
// ============================================================================

/// Turn (second offset, nanos) pairs into trades over 2022-02-01..03, with
/// duplicates removed and at most 3 trades per second.
fn build_trades(offsets: &[(i64, u32)]) -> Vec<Trade> {
    let base = utc("2022-02-01T00:00:00Z");
    let unique: BTreeSet<(i64, u32)> = offsets.iter().copied().collect();

    let mut per_second: BTreeMap<i64, usize> = BTreeMap::new();
    let mut trades = Vec::new();
    for (sec, nanos) in unique {
        let count = per_second.entry(sec).or_insert(0);
        if *count == 3 {
            continue;
        }
        *count += 1;

        let id = trades.len() as u64 + 1;
        let time = base + Duration::seconds(sec) + Duration::nanoseconds(nanos as i64);
        let side = if id % 2 == 0 { "buy" } else { "sell" };
        trades.push(trade_at(id, 100.0 + id as f64 * 0.25, side, 0.01 * id as f64, time));
    }
    trades
}

fn run_backfill(trades: Vec<Trade>, limit: usize, scramble: u64) -> (MemorySink, Vec<i64>, u64, u64) {
    let config = BackfillConfig::new(
        "BTC/USD",
        NaiveDate::from_ymd_opt(2022, 2, 1).unwrap(),
        NaiveDate::from_ymd_opt(2022, 2, 3).unwrap(),
        "/tmp",
    )
    .unwrap();
    let feed = SimulatedFeed::new(trades, limit, scramble);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let mut driver = BackfillDriver::new(config, feed, MemorySink::default());
    let summary = runtime.block_on(driver.run()).unwrap();

    let ends = driver
        .source()
        .windows()
        .iter()
        .map(|w| w.unix_bounds().1)
        .collect();
    (driver.into_sink(), ends, summary.pages, summary.late_trades_dropped)
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Proves: the written files are an exact, sorted, per-day partition of the feed
    #[test]
    fn backfill_partitions_feed_by_day(
        offsets in prop::collection::vec((0i64..3 * 86_400, 0u32..1_000_000_000), 0..120),
        limit in 4usize..25,
        scramble in any::<u64>(),
    ) {
        let trades = build_trades(&offsets);
        let mut expected: BTreeMap<DayKey, BTreeSet<u64>> = BTreeMap::new();
        for t in &trades {
            expected.entry(t.day_key()).or_default().insert(t.id());
        }
        let distinct_seconds: HashSet<i64> = trades.iter().map(|t| t.time().timestamp()).collect();

        let (sink, ends, pages, late) = run_backfill(trades, limit, scramble);

        prop_assert_eq!(late, 0);

        let mut written: BTreeMap<DayKey, BTreeSet<u64>> = BTreeMap::new();
        let mut seen = HashSet::new();
        for (day, day_trades) in &sink.days {
            prop_assert!(
                day_trades.windows(2).all(|p| (p[0].time(), p[0].id()) <= (p[1].time(), p[1].id())),
                "file for {} is not sorted", day
            );
            for t in day_trades {
                prop_assert_eq!(t.day_key(), *day, "trade {} written to the wrong day", t.id());
                prop_assert!(seen.insert(t.id()), "trade {} written twice", t.id());
            }
            prop_assert!(written.insert(*day, day_trades.iter().map(|t| t.id()).collect()).is_none());
        }
        prop_assert_eq!(written, expected);

        prop_assert!(ends.windows(2).all(|p| p[1] < p[0]), "request bounds must decrease: {:?}", ends);
        prop_assert!(
            pages as usize <= 2 * distinct_seconds.len() + 2,
            "{} pages for {} distinct seconds", pages, distinct_seconds.len()
        );
    }

    /// Proves: files come out newest day first
    #[test]
    fn backfill_flushes_newest_day_first(
        offsets in prop::collection::vec((0i64..3 * 86_400, 0u32..1_000_000_000), 1..80),
        limit in 4usize..12,
        scramble in any::<u64>(),
    ) {
        let trades = build_trades(&offsets);
        let (sink, _, _, _) = run_backfill(trades, limit, scramble);

        let days: Vec<DayKey> = sink.days.iter().map(|(d, _)| *d).collect();
        prop_assert!(days.windows(2).all(|p| p[0] > p[1]), "flush order {:?}", days);
    }
}
