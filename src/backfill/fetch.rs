//! Page Fetch Seam
//!
//! Trait for sources that return one page of trades for an inclusive time
//! window. The HTTP client lives in `scrapers::ftxu_rest`; tests use scripted
//! in-memory sources.

use crate::models::{TimeWindow, Trade};

/// One decoded page.
#[derive(Debug, Clone, Default)]
pub struct TradePage {
    /// Upstream `success` flag. `false` is fatal to a run.
    pub success: bool,
    /// Trades in whatever order the upstream returned them.
    pub trades: Vec<Trade>,
}

impl TradePage {
    pub fn ok(trades: Vec<Trade>) -> Self {
        Self {
            success: true,
            trades,
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            trades: Vec::new(),
        }
    }

    /// An empty successful page means the requested range is exhausted.
    pub fn is_exhausted(&self) -> bool {
        self.success && self.trades.is_empty()
    }
}

/// Errors raised while fetching a page.
#[derive(Debug, Clone)]
pub enum FetchError {
    /// Connection failure, timeout or non-2xx HTTP status
    Transport(String),
    /// Response body is not a well-formed trade envelope
    Decode(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
            Self::Decode(msg) => write!(f, "decode error: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

/// Source of trade pages for a market.
///
/// `window.end` is inclusive. No ordering of the returned trades is implied.
#[async_trait::async_trait]
pub trait TradeSource: Send + Sync {
    async fn fetch(&self, market: &str, window: &TimeWindow) -> Result<TradePage, FetchError>;

    /// Source identifier for logging.
    fn name(&self) -> &str {
        "unknown"
    }
}
