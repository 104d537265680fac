//! FTX US REST Client
//!
//! Fetches one page of historical trades per call from
//! `GET /markets/{market}/trades?start_time=..&end_time=..`.

use anyhow::{Context, Result};
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::backfill::fetch::{FetchError, TradePage, TradeSource};
use crate::config::{FtxuClientConfig, FTXU_EXCHANGE};
use crate::models::{TimeWindow, TradeResponse};

/// Longest body excerpt carried in an HTTP status error
const ERROR_BODY_EXCERPT: usize = 512;

#[derive(Clone)]
pub struct FtxuRestClient {
    client: Client,
    config: FtxuClientConfig,
}

impl FtxuRestClient {
    pub fn new(config: FtxuClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .context("Failed to build FtxuRestClient")?;

        Ok(Self { client, config })
    }

    #[inline]
    pub fn trades_url(&self, market: &str) -> String {
        format!("{}/markets/{}/trades", self.config.base_url, market)
    }

    fn dump_response(&self, dir: &Path, market: &str, window: &TimeWindow, body: &[u8]) {
        let (start_s, end_s) = window.unix_bounds();
        let path = dir.join(format!(
            "{}-{}-{}-{}.json",
            FTXU_EXCHANGE,
            market.replace('/', ""),
            start_s,
            end_s
        ));
        if let Err(e) = std::fs::write(&path, body) {
            warn!(path = %path.display(), error = %e, "Failed to dump response body");
        }
    }
}

#[async_trait::async_trait]
impl TradeSource for FtxuRestClient {
    async fn fetch(&self, market: &str, window: &TimeWindow) -> Result<TradePage, FetchError> {
        let url = self.trades_url(market);
        let (start_s, end_s) = window.unix_bounds();
        debug!(%url, start_s, end_s, "GET trades");

        let resp = self
            .client
            .get(&url)
            .query(&[("start_time", start_s), ("end_time", end_s)])
            .send()
            .await
            .map_err(|e| transport_error("GET trades failed", &e))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| transport_error("reading trades body failed", &e))?;

        if let Some(dir) = &self.config.dump_dir {
            self.dump_response(dir, market, window, &body);
        }

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            let excerpt: String = text.chars().take(ERROR_BODY_EXCERPT).collect();
            return Err(FetchError::Transport(format!(
                "GET {} {}: {}",
                url, status, excerpt
            )));
        }

        parse_response(&body)
    }

    fn name(&self) -> &str {
        "ftxu_rest"
    }
}

fn transport_error(what: &str, e: &reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Transport(format!("{}: timeout: {}", what, e))
    } else {
        FetchError::Transport(format!("{}: {}", what, e))
    }
}

/// Decode a `/trades` response body.
pub fn parse_response(body: &[u8]) -> Result<TradePage, FetchError> {
    let r: TradeResponse =
        serde_json::from_slice(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    Ok(TradePage {
        success: r.success,
        trades: r.result,
    })
}
