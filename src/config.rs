//! Run configuration.
//!
//! Everything the backfill engine needs is carried in an explicit
//! `BackfillConfig` value; the HTTP client reads its own settings from the
//! environment.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::TimeWindow;

pub const FTXU_API_BASE: &str = "https://ftx.us/api";
pub const FTXU_EXCHANGE: &str = "FTXU";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Output CSV layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// `id,price,side,size,time`, comma-delimited
    Raw,
    /// `NanoTs|Symbol|Exchange|Price|Size|TradeId|TakerSide`, pipe-delimited
    Normalized,
}

impl OutputFormat {
    pub fn delimiter(&self) -> u8 {
        match self {
            OutputFormat::Raw => b',',
            OutputFormat::Normalized => b'|',
        }
    }

    pub fn header(&self) -> &'static [&'static str] {
        match self {
            OutputFormat::Raw => &crate::models::RAW_HEADER,
            OutputFormat::Normalized => &crate::models::NORMALIZED_HEADER,
        }
    }
}

/// Errors in user supplied run parameters.
#[derive(Debug, Clone)]
pub enum ConfigError {
    EmptyMarket,
    InvalidDate {
        field: &'static str,
        value: String,
        reason: String,
    },
    /// start date after end date
    InvertedRange { start: NaiveDate, end: NaiveDate },
    InvalidOutputDir(PathBuf),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMarket => write!(f, "market must not be empty"),
            Self::InvalidDate {
                field,
                value,
                reason,
            } => write!(f, "invalid {}: {:?} ({})", field, value, reason),
            Self::InvertedRange { start, end } => {
                write!(f, "start date {} is after end date {}", start, end)
            }
            Self::InvalidOutputDir(p) => write!(f, "invalid output directory: {}", p.display()),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|e| ConfigError::InvalidDate {
        field,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Parameters of one backfill run.
#[derive(Debug, Clone)]
pub struct BackfillConfig {
    /// Market name as the API knows it, e.g. `BTC/USD`
    pub market: String,
    /// Market name without `/`, used in file names and normalized rows
    pub symbol: String,
    pub exchange: String,
    pub start_date: NaiveDate,
    /// Inclusive; the run covers up to the last second of this day
    pub end_date: NaiveDate,
    pub out_dir: PathBuf,
    pub sort_ascending: bool,
    pub format: OutputFormat,
    /// Pause between consecutive page requests
    pub page_delay: Duration,
}

impl BackfillConfig {
    pub fn new(
        market: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        out_dir: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let market = market.trim();
        if market.is_empty() {
            return Err(ConfigError::EmptyMarket);
        }
        if start_date > end_date {
            return Err(ConfigError::InvertedRange {
                start: start_date,
                end: end_date,
            });
        }

        Ok(Self {
            market: market.to_string(),
            symbol: market.replace('/', ""),
            exchange: FTXU_EXCHANGE.to_string(),
            start_date,
            end_date,
            out_dir: out_dir.into(),
            sort_ascending: true,
            format: OutputFormat::Normalized,
            page_delay: Duration::ZERO,
        })
    }

    pub fn with_sort_ascending(mut self, sort_ascending: bool) -> Self {
        self.sort_ascending = sort_ascending;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    /// Requested range: start of `start_date` through the last second of `end_date`.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::from_dates(self.start_date, self.end_date)
    }

    /// The output directory must already exist.
    pub fn ensure_output_dir(&self) -> Result<(), ConfigError> {
        if is_dir(&self.out_dir) {
            Ok(())
        } else {
            Err(ConfigError::InvalidOutputDir(self.out_dir.clone()))
        }
    }
}

fn is_dir(p: &Path) -> bool {
    std::fs::metadata(p).map(|m| m.is_dir()).unwrap_or(false)
}

/// HTTP client settings
#[derive(Debug, Clone)]
pub struct FtxuClientConfig {
    pub base_url: String,
    /// Per-request timeout; expiry surfaces as a transport error
    pub timeout: Duration,
    /// When set, every raw response body is written here before decoding
    pub dump_dir: Option<PathBuf>,
}

impl Default for FtxuClientConfig {
    fn default() -> Self {
        Self {
            base_url: FTXU_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
            dump_dir: None,
        }
    }
}

impl FtxuClientConfig {
    /// Defaults overridden by `FTXU_API_BASE` and `FTXU_HTTP_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let mut config = Self::default();

        if let Ok(v) = std::env::var("FTXU_API_BASE") {
            let v = v.trim().trim_end_matches('/');
            if !v.is_empty() {
                config.base_url = v.to_string();
            }
        }
        if let Ok(v) = std::env::var("FTXU_HTTP_TIMEOUT_SECS") {
            if let Ok(secs) = v.parse::<u64>() {
                if secs > 0 {
                    config.timeout = Duration::from_secs(secs);
                }
            }
        }

        config
    }

    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }
}
