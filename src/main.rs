//! ftxu - FTX US market data tools
//!
//! Usage:
//!   ftxu download --market BTC/USD --start 2022-02-01 --end 2022-02-03 --out-dir ./data
//!
//! Environment:
//!   FTXU_API_BASE           - API base URL (default https://ftx.us/api)
//!   FTXU_HTTP_TIMEOUT_SECS  - Per-request timeout (default 30)
//!   RUST_LOG                - Log filter (default ftxu_backfill=info)

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ftxu_backfill::config::parse_date;
use ftxu_backfill::{
    BackfillConfig, BackfillDriver, CsvDaySink, FtxuClientConfig, FtxuRestClient, OutputFormat,
};

#[derive(Parser, Debug)]
#[command(name = "ftxu")]
#[command(about = "FTXU related tools")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download FTXU market data
    Download(DownloadArgs),
}

#[derive(clap::Args, Debug)]
struct DownloadArgs {
    /// Name of market (e.g. BTC/USD)
    #[arg(short, long)]
    market: String,

    /// Start date in YYYY-MM-DD format
    #[arg(long)]
    start: String,

    /// End date (inclusive) in YYYY-MM-DD format
    #[arg(long)]
    end: String,

    /// Output directory to save data
    #[arg(long)]
    out_dir: PathBuf,

    /// Sort output data in ascending order by time
    #[arg(
        long,
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    sort: bool,

    /// Store data in raw FTXU format instead of the btloader compatible format
    #[arg(long, default_value_t = false)]
    raw: bool,

    /// Also save every raw API response as JSON in the output directory
    #[arg(long, default_value_t = false)]
    dump_responses: bool,

    /// Pause between page requests
    #[arg(long, default_value = "25")]
    page_delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();

    match args.command {
        Commands::Download(download) => run_download(download).await,
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ftxu_backfill=info,ftxu=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn build_config(args: &DownloadArgs) -> Result<BackfillConfig> {
    let start = parse_date("start", &args.start)?;
    let end = parse_date("end", &args.end)?;
    let format = if args.raw {
        OutputFormat::Raw
    } else {
        OutputFormat::Normalized
    };

    let config = BackfillConfig::new(&args.market, start, end, &args.out_dir)?
        .with_sort_ascending(args.sort)
        .with_format(format)
        .with_page_delay(Duration::from_millis(args.page_delay_ms));
    config.ensure_output_dir()?;
    Ok(config)
}

async fn run_download(args: DownloadArgs) -> Result<()> {
    let config = build_config(&args)?;

    let mut client_config = FtxuClientConfig::from_env();
    if args.dump_responses {
        client_config = client_config.with_dump_dir(&config.out_dir);
    }
    let client = FtxuRestClient::new(client_config)?;
    let sink = CsvDaySink::from_config(&config);

    info!(
        market = %config.market,
        out_dir = %config.out_dir.display(),
        format = ?config.format,
        "Downloading trades"
    );

    let mut driver = BackfillDriver::new(config, client, sink);
    let summary = driver
        .run()
        .await
        .context("trade download did not complete")?;

    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parse(argv: &[&str]) -> DownloadArgs {
        match Args::try_parse_from(argv).unwrap().command {
            Commands::Download(d) => d,
        }
    }

    #[test]
    fn test_download_defaults() {
        let dir = tempdir().unwrap();
        let out = dir.path().to_string_lossy().to_string();
        let args = parse(&[
            "ftxu", "download", "-m", "BTC/USD", "--start", "2022-02-01", "--end", "2022-02-02",
            "--out-dir", &out,
        ]);
        assert!(args.sort);
        assert!(!args.raw);

        let config = build_config(&args).unwrap();
        assert_eq!(config.symbol, "BTCUSD");
        assert_eq!(config.format, OutputFormat::Normalized);
        assert_eq!(config.page_delay, Duration::from_millis(25));
    }

    #[test]
    fn test_download_flags() {
        let dir = tempdir().unwrap();
        let out = dir.path().to_string_lossy().to_string();
        let args = parse(&[
            "ftxu", "download", "--market", "ETH/USD", "--start", "2022-02-01", "--end",
            "2022-02-01", "--out-dir", &out, "--sort", "false", "--raw",
        ]);
        let config = build_config(&args).unwrap();
        assert!(!config.sort_ascending);
        assert_eq!(config.format, OutputFormat::Raw);
    }

    #[test]
    fn test_sort_flag_forms() {
        let base = [
            "ftxu", "download", "-m", "BTC/USD", "--start", "2022-02-01", "--end", "2022-02-01",
            "--out-dir", ".",
        ];

        let bare: Vec<&str> = base.iter().copied().chain(["--sort"]).collect();
        assert!(parse(&bare).sort);

        let equals: Vec<&str> = base.iter().copied().chain(["--sort=false"]).collect();
        assert!(!parse(&equals).sort);

        let spaced: Vec<&str> = base.iter().copied().chain(["--sort", "false", "--raw"]).collect();
        let args = parse(&spaced);
        assert!(!args.sort);
        assert!(args.raw);
    }

    #[test]
    fn test_missing_required_flag() {
        assert!(Args::try_parse_from(["ftxu", "download", "--market", "BTC/USD"]).is_err());
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let dir = tempdir().unwrap();
        let out = dir.path().to_string_lossy().to_string();
        let bad_date = parse(&[
            "ftxu", "download", "-m", "BTC/USD", "--start", "02/01/2022", "--end", "2022-02-02",
            "--out-dir", &out,
        ]);
        assert!(build_config(&bad_date).is_err());

        let missing_dir = parse(&[
            "ftxu", "download", "-m", "BTC/USD", "--start", "2022-02-01", "--end", "2022-02-02",
            "--out-dir", "/definitely/not/here",
        ]);
        assert!(build_config(&missing_dir).is_err());
    }
}
