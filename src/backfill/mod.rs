//! Trade History Backfill
//!
//! Backward pagination over a market's trade feed, bucketed per UTC day and
//! written one file per day as soon as a day can no longer change.
//!
//! ```text
//! TradeSource ──page──▶ BackfillDriver ──insert──▶ BucketStore
//!                              │                        │
//!                              └──watermark──▶ FlushPolicy ──closed days──▶ DaySink
//! ```

pub mod bucket_store;
pub mod driver;
pub mod fetch;
pub mod flush;
pub mod sink;

pub use bucket_store::{BucketStore, DayBucket, InsertOutcome};
pub use driver::{BackfillDriver, BackfillError, DriverState, RunSummary};
pub use fetch::{FetchError, TradePage, TradeSource};
pub use flush::{FlushPolicy, FlushedDay};
pub use sink::{day_file_name, CsvDaySink, DaySink, SinkError};
