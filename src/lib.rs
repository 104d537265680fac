//! FTXU Trade Backfill Library
//!
//! Downloads a market's complete trade history from the FTX US REST API and
//! stores it as one CSV file per UTC day.

pub mod backfill;
pub mod config;
pub mod models;
pub mod scrapers;

pub use backfill::{BackfillDriver, BackfillError, CsvDaySink, RunSummary};
pub use config::{BackfillConfig, FtxuClientConfig, OutputFormat};
pub use scrapers::FtxuRestClient;
