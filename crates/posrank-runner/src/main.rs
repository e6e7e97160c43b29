//! # posrank-runner
//!
//! Main entry point for the position-ranking ingester.
//!
//! Loads an optional JSON configuration file, then runs one ingestion
//! pipeline per enabled exchange concurrently, each on its own blocking task,
//! and waits for all of them to finish.
//!
//! # Usage
//!
//! ```bash
//! posrank-runner config.json --log-level info
//! posrank-runner --exchange dce --exchange shfe --end-date 2020-10-09
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::Parser;
use posrank_core::config::{AppConfig, ExchangeConfig, load_config};
use posrank_core::logging::{banner, init_logging};
use posrank_core::store::{RankStore, SqliteStore};
use posrank_core::types::Exchange;
use posrank_ingest::http_helper::{ReqwestTransport, RetryPolicy};
use posrank_ingest::pipeline::{Pipeline, PipelineSettings};
use posrank_ingest::registry::create_adapter;
use posrank_ingest::stats::RunSummary;
use tracing::{error, info, warn};

/// Futures position-ranking ingester.
#[derive(Parser, Debug)]
#[command(name = "posrank-runner", about = "Incremental ingestion of exchange position rankings")]
struct Cli {
    /// Configuration file path (JSON). Defaults apply when omitted.
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(short, long)]
    log_level: Option<String>,

    /// Optional log directory for file output. Overrides the config file.
    #[arg(long)]
    log_dir: Option<String>,

    /// Only run these exchanges (repeatable).
    #[arg(short, long)]
    exchange: Vec<Exchange>,

    /// Last trading day to ingest (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    end_date: Option<NaiveDate>,
}

/// Build and run one exchange's pipeline on the current (blocking) thread.
fn run_exchange(
    exchange_cfg: &ExchangeConfig,
    app: &AppConfig,
    store: Arc<dyn RankStore>,
    end_date: Option<NaiveDate>,
) -> Result<RunSummary> {
    let adapter = create_adapter(exchange_cfg, app)?;
    let http = ReqwestTransport::new(Duration::from_secs(app.http_timeout_sec()), app.user_agent().as_deref())
        .context("build http client")?;
    let settings = PipelineSettings { end_date, retry: RetryPolicy::new(app.retry_attempts()), ..Default::default() };
    Pipeline::new(adapter, store, Box::new(http), settings).run()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config = match &cli.config {
        Some(path) => load_config(path).with_context(|| format!("load config {}", path.display()))?,
        None => AppConfig::default(),
    };

    // 2. Initialize logging
    let log_level = cli.log_level.clone().or_else(|| config.log_level()).unwrap_or_else(|| "info".into());
    let log_dir = cli.log_dir.clone().or_else(|| config.log_path());
    init_logging(&log_level, log_dir.as_deref(), &config.module_name());

    let started = Instant::now();
    info!("{}", banner("start"));

    // 3. Open the shared store
    let store: Arc<dyn RankStore> = Arc::new(SqliteStore::new(config.store_path(), config.collection_names())?);
    info!("store at {}", config.store_path().display());

    let mut exchanges = config.effective_exchanges();
    if !cli.exchange.is_empty() {
        exchanges.retain(|c| c.exchange_id().is_ok_and(|id| cli.exchange.contains(&id)));
    }
    if exchanges.is_empty() {
        warn!("no exchanges selected");
    }

    // 4. Fan out: one blocking task per exchange
    let config = Arc::new(config);
    let mut handles = Vec::with_capacity(exchanges.len());
    for exchange_cfg in exchanges {
        let app = config.clone();
        let store = store.clone();
        let end_date = cli.end_date;
        let name = exchange_cfg.exchange.clone();
        info!("[{name}] starting pipeline");
        let handle = tokio::task::spawn_blocking(move || run_exchange(&exchange_cfg, &app, store, end_date));
        handles.push((name, handle));
    }

    // 5. Fan in
    let mut failed = 0usize;
    for (name, handle) in handles {
        match handle.await {
            Ok(Ok(summary)) if summary.is_clean() => info!("[{name}] {summary}"),
            Ok(Ok(summary)) => warn!("[{name}] {summary}"),
            Ok(Err(e)) => {
                error!("[{name}] pipeline failed: {e:#}");
                failed += 1;
            }
            Err(e) => {
                error!("[{name}] task failed: {e}");
                failed += 1;
            }
        }
    }

    info!("elapsed {:.1}s", started.elapsed().as_secs_f64());
    info!("{}", banner("end"));

    if failed > 0 {
        bail!("{failed} pipeline(s) failed");
    }
    Ok(())
}
