//! # indicators-watch
//!
//! Runs an `IndicatorStore` against a live indicator API and prints the
//! snapshot after every refresh, until Ctrl-C.
//!
//! With `--once` it fetches the current snapshot and every tracked series a
//! single time, prints them and exits.

mod config;

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use lib_indicators::configs::ApiSettings;
use lib_indicators::indicators::{IndicatorStore, ResourceKey, SeriesSummary, StoreConfig, StoreEvent};
use lib_indicators::loggers::{setup_logging, LogSettings};
use lib_indicators::utils::format::{format_time_of_day, time_ago};

use crate::config::{load_config, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // `.env` must be loaded before clap reads the environment.
    dotenvy::dotenv().ok();
    let config = load_config()?;

    let _guard = setup_logging(&LogSettings {
        level: config.log_level.clone().unwrap_or_else(|| "info".to_string()),
        log_dir: config.log_dir.clone(),
        file_prefix: "indicators-watch".to_string(),
        console: true,
    })
    .context("initializing logging")?;

    let store = build_store(&config)?;
    info!(base_url = store.source().client().base_url(), "Indicator watcher starting");

    for id in &config.track {
        store.track_historical(id, config.history_window(), None);
    }

    if config.trigger_refresh {
        match store.request_upstream_refresh().await {
            Ok(ack) => info!(message = ack.message.as_deref().unwrap_or(""), "Upstream refresh acknowledged"),
            Err(e) => warn!(error = %e, "Upstream refresh failed"),
        }
    }

    if config.once {
        return run_once(&store).await;
    }

    run_until_ctrl_c(&store).await
}

fn build_store(config: &Config) -> Result<IndicatorStore> {
    let mut settings = match &config.api_base {
        Some(base) => ApiSettings::with_base_url(base),
        None => ApiSettings::from_env(),
    };
    if let Some(secs) = config.timeout_secs.filter(|s| *s > 0) {
        settings.timeout = Duration::from_secs(secs);
    }

    let mut store_config = StoreConfig::default();
    if let Some(secs) = config.interval_secs.filter(|s| *s > 0) {
        store_config.current_interval = Duration::from_secs(secs);
        store_config.historical_interval = Duration::from_secs(secs);
    }
    if let Some(days) = config.history_window() {
        store_config.historical_days = days;
    }

    settings.store(store_config).context("building indicator store")
}

async fn run_once(store: &IndicatorStore) -> Result<()> {
    store
        .refresh_now(ResourceKey::Current)
        .await
        .context("fetching current indicators")?;
    for (id, _) in store.tracked_historical() {
        if let Err(e) = store.refresh_now(ResourceKey::historical(&id)).await {
            warn!(id, error = %e, "Historical fetch failed");
        }
    }
    print_snapshot(store);
    Ok(())
}

async fn run_until_ctrl_c(store: &IndicatorStore) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<StoreEvent>();
    let subscription = store.subscribe(move |event| {
        let _ = tx.send(event.clone());
    });

    store.start();

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("listening for Ctrl-C")?;
                info!("Ctrl-C received, stopping");
                break;
            }
            Some(event) = rx.recv() => {
                match &event.error {
                    Some(e) => error!(key = %event.key, kind = e.kind(), error = %e, "Refresh failed"),
                    None => print_snapshot(store),
                }
            }
        }
    }

    store.stop();
    subscription.unsubscribe();
    Ok(())
}

fn print_snapshot(store: &IndicatorStore) {
    let now = Utc::now();
    let freshness = store.freshness().map_or("Sin datos", |f| f.label());
    println!("\n== Indicadores ({freshness}, {}) ==", format_time_of_day(now));

    for indicator in store.current() {
        let age = indicator.timestamp.map(|ts| time_ago(ts, now)).unwrap_or_default();
        println!(
            "{:<24} {:>16}  {:<12} {}",
            indicator.id,
            indicator.display(),
            indicator.source.as_deref().unwrap_or("-"),
            age
        );
    }

    for (id, _) in store.tracked_historical() {
        let points = store.get_historical(&id);
        match SeriesSummary::from_points(&points) {
            Some(summary) => {
                let change = summary.change_display().map(|c| c.text).unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<24} {} .. {}  min {:.2}  max {:.2}  {} ({} pts)",
                    id,
                    summary.start,
                    summary.end,
                    summary.min,
                    summary.max,
                    change,
                    points.len()
                );
            }
            None => println!("{id:<24} sin historial"),
        }
    }
}
