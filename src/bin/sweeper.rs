//! Standalone expiration worker. Runs the same sweep as the in-process loop
//! and `POST /bookings/cleanup`, against the same database file.
//!
//! Usage: `roombook-sweeper [--once] [--dry-run]`

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tracing_subscriber::EnvFilter;

use roombook::config::AppConfig;
use roombook::db;
use roombook::services::sweeper::{SweepParams, Sweeper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let once = args.iter().any(|a| a == "--once");
    let dry_run = args.iter().any(|a| a == "--dry-run");
    anyhow::ensure!(!dry_run || once, "--dry-run is only supported together with --once");

    let config = AppConfig::from_env();
    anyhow::ensure!(
        config.database_url != ":memory:",
        "the sweeper needs a database file shared with the server"
    );

    let conn = db::init_db(&config.database_url)?;
    let sweeper = Arc::new(Sweeper::new(
        Arc::new(Mutex::new(conn)),
        chrono::Duration::minutes(config.booking_timeout_minutes),
    ));

    if once {
        let report = sweeper.run(SweepParams {
            now: Utc::now(),
            dry_run,
            limit: None,
        })?;
        if let Some(report) = report {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        return Ok(());
    }

    let interval = Duration::from_secs(config.sweep_interval_secs.max(1));
    tokio::select! {
        _ = sweeper.run_forever(interval) => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("sweeper stopping"),
    }
    Ok(())
}
