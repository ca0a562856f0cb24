mod analysis;
mod comfy_table;
mod csv_report;
mod indicators;
mod market_data;
mod price_series;
mod storage_utils;
mod symbols;
mod tui;

use clap::Parser;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{Subscriber, error, info};
use tracing_subscriber::EnvFilter;

use crate::market_data::YahooChartClient;
use crate::storage_utils::{AppConfig, AsyncStorageManager};

/// Daily RSI, local extrema and deviation screener for a list of symbols.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Directory holding config.json and report.json (default: `storage` next to the binary)
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Text file with one symbol per line
    #[arg(long)]
    symbols: Option<PathBuf>,

    /// Directory for the CSV tables
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// RSI smoothing period
    #[arg(long)]
    period: Option<usize>,

    /// Half-width of the local extrema neighbourhood
    #[arg(long)]
    window: Option<usize>,

    /// Days of history to download
    #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
    days: Option<i64>,

    /// Open the interactive viewer instead of printing tables
    #[arg(long)]
    tui: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(path) = &self.symbols {
            config.symbols_file = path.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(period) = self.period {
            config.analysis.rsi_period = period;
        }
        if let Some(window) = self.window {
            config.analysis.extrema_window = window;
        }
        if let Some(days) = self.days {
            config.history_days = days;
        }
    }
}

const LOG_FILE: &str = "rsi-screener.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn open_log_file(dir: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))
}

// The TUI owns the terminal, so its logs go to a file instead of stderr.
fn file_subscriber(file: File) -> impl Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .finish()
}

fn init_logging(tui: bool, storage_dir: &Path) -> anyhow::Result<()> {
    if tui {
        tracing::subscriber::set_global_default(file_subscriber(open_log_file(storage_dir)?))?;
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let storage = match &cli.storage_dir {
        Some(dir) => AsyncStorageManager::new(dir).await?,
        None => AsyncStorageManager::new_relative("storage").await?,
    };
    init_logging(cli.tui, &storage.base_dir)?;
    let mut config: AppConfig = storage.load_or_init("config", AppConfig::default()).await?;
    cli.apply(&mut config);
    info!(storage = %storage.base_dir.display(), symbols = %config.symbols_file.display(), "configuration loaded");

    let source = Arc::new(YahooChartClient::new(&config.market_data)?);

    if cli.tui {
        let ctx = Arc::new(tui::PipelineContext {
            config,
            storage,
            source,
        });
        return tui::run_tui(ctx).await;
    }

    match analysis::run_analysis_pipeline(&config, &storage, source.as_ref()).await {
        Ok(report) => {
            comfy_table::print(&report);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "analysis pipeline failed");
            Err(e)
        }
    }
}
