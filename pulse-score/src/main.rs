//! pulse-score - Aggregation, scoring and recompute scheduling
//!
//! Reads accepted trust-signal events, folds them into bucketed rate
//! statistics with Wilson confidence intervals, computes bounded composite
//! scores, and drives the per-key exactly-once recompute job machinery.

use anyhow::Result;
use clap::Parser;
use pulse_common::config::{database_path, ensure_root_folder, load_module_config, resolve_root_folder};
use pulse_common::db::init_database;
use pulse_common::events::EventBus;
use pulse_score::config::ScoreConfig;
use pulse_score::{build_router, spawn_background_tasks, AppState};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pulse-score", about = "MarketPulse scoring and scheduling service")]
struct Args {
    /// Root data folder (overrides PULSE_ROOT_FOLDER and the config file)
    #[arg(long)]
    root_folder: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting MarketPulse Scoring (pulse-score) v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let root_folder = resolve_root_folder(args.root_folder.as_deref());
    ensure_root_folder(&root_folder)?;

    let db_path = database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path).await?;
    let mut config = ScoreConfig::load(&pool).await?;

    // Settings table is authoritative; the TOML config file fills the gap
    // when no webhook has been configured there
    if config.alert_webhook_url.is_none() {
        if let Ok(toml_config) = pulse_common::config::load_toml_config() {
            if let Some(url) = toml_config.alert_webhook_url {
                if !url.is_empty() {
                    info!("Alert webhook loaded from config file");
                    config.alert_webhook_url = Some(url);
                }
            }
        }
    }
    info!(
        "Score config: job timeout {}s, max attempts {}, retry sweep every {}s",
        config.job_timeout.as_secs(),
        config.job_max_attempts,
        config.retry_sweep_interval.as_secs()
    );

    let module = load_module_config(&pool, "pulse-score").await?;
    let event_bus = EventBus::new(1000);

    let state = AppState::new(pool, event_bus, config);
    spawn_background_tasks(&state);
    let app = build_router(state);

    let bind_addr = format!("{}:{}", module.host, module.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("pulse-score listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
