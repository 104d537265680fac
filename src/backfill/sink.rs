//! Day File Sink
//!
//! Writes one flushed bucket to `<out_dir>/<EXCHANGE>-<symbol>-<YYYYMMDD>.csv`.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{BackfillConfig, OutputFormat};
use crate::models::{DayKey, Trade};

/// Errors while persisting a day.
#[derive(Debug, Clone)]
pub enum SinkError {
    Create { path: PathBuf, reason: String },
    Write { path: PathBuf, reason: String },
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create { path, reason } => {
                write!(f, "cannot create {}: {}", path.display(), reason)
            }
            Self::Write { path, reason } => {
                write!(f, "cannot write {}: {}", path.display(), reason)
            }
        }
    }
}

impl std::error::Error for SinkError {}

/// Destination for closed day buckets. Records arrive already ordered.
pub trait DaySink: Send {
    /// Persist one day and return where it went.
    fn write_day(&mut self, day: DayKey, trades: &[Trade]) -> Result<PathBuf, SinkError>;
}

/// `<EXCHANGE>-<symbol>-<YYYYMMDD>.csv`
pub fn day_file_name(exchange: &str, symbol: &str, day: DayKey) -> String {
    format!("{}-{}-{}.csv", exchange, symbol.replace('/', ""), day.compact())
}

/// CSV writer for the raw or normalized layout.
#[derive(Debug, Clone)]
pub struct CsvDaySink {
    out_dir: PathBuf,
    symbol: String,
    exchange: String,
    format: OutputFormat,
}

impl CsvDaySink {
    pub fn new(
        out_dir: impl Into<PathBuf>,
        symbol: &str,
        exchange: &str,
        format: OutputFormat,
    ) -> Self {
        Self {
            out_dir: out_dir.into(),
            symbol: symbol.replace('/', ""),
            exchange: exchange.to_string(),
            format,
        }
    }

    pub fn from_config(config: &BackfillConfig) -> Self {
        Self::new(&config.out_dir, &config.symbol, &config.exchange, config.format)
    }

    pub fn path_for(&self, day: DayKey) -> PathBuf {
        self.out_dir
            .join(day_file_name(&self.exchange, &self.symbol, day))
    }

    fn write_rows(&self, path: &Path, trades: &[Trade]) -> Result<(), SinkError> {
        let write_err = |e: csv::Error| SinkError::Write {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let file = std::fs::File::create(path).map_err(|e| SinkError::Create {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut w = csv::WriterBuilder::new()
            .delimiter(self.format.delimiter())
            .has_headers(false)
            .from_writer(file);

        w.write_record(self.format.header()).map_err(write_err)?;
        for t in trades {
            match self.format {
                OutputFormat::Raw => w.write_record(t.raw_record()),
                OutputFormat::Normalized => {
                    w.write_record(t.normalized_record(&self.symbol, &self.exchange))
                }
            }
            .map_err(write_err)?;
        }

        w.flush().map_err(|e| SinkError::Write {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

impl DaySink for CsvDaySink {
    fn write_day(&mut self, day: DayKey, trades: &[Trade]) -> Result<PathBuf, SinkError> {
        let path = self.path_for(day);
        self.write_rows(&path, trades)?;
        info!(count = trades.len(), path = %path.display(), "Saved trades");
        Ok(path)
    }
}
