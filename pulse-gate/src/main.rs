//! pulse-gate (Envelope Guard) - Signed trust-signal ingest gate
//!
//! Verifies inbound envelope authenticity, freshness and uniqueness before
//! events are allowed into the store. Stateless across requests; all shared
//! state lives in the database so parallel instances need no coordination.

use anyhow::Result;
use clap::Parser;
use pulse_common::config::{database_path, ensure_root_folder, load_module_config, resolve_root_folder};
use pulse_common::db::init_database;
use pulse_common::events::EventBus;
use pulse_gate::config::GateConfig;
use pulse_gate::{build_router, AppState};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pulse-gate", about = "MarketPulse envelope guard service")]
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

    info!("Starting MarketPulse Envelope Guard (pulse-gate) v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let root_folder = resolve_root_folder(args.root_folder.as_deref());
    ensure_root_folder(&root_folder)?;

    let db_path = database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path).await?;
    let config = GateConfig::load(&pool).await?;
    info!(
        "Guard config: freshness window {}s, seen cache capacity {}",
        config.freshness_window.num_seconds(),
        config.seen_cache_capacity
    );

    let module = load_module_config(&pool, "pulse-gate").await?;
    let event_bus = EventBus::new(1000);

    let state = AppState::new(pool, event_bus, config);
    pulse_gate::spawn_background_tasks(&state);
    let app = build_router(state);

    let bind_addr = format!("{}:{}", module.host, module.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("pulse-gate listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
