use std::sync::Arc;

use run_roster::config::Config;
use run_roster::engine::RosterEngine;
use run_roster::server::{AppState, build_router};
use run_roster::store::{FileRunStore, MemoryRunStore, RunStore};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "run_roster=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let store: Arc<dyn RunStore> = match &config.state_dir {
        Some(dir) => Arc::new(FileRunStore::open(dir)?),
        None => {
            info!("RUN_ROSTER_STATE_DIR not set, state will not survive a restart");
            Arc::new(MemoryRunStore::new())
        }
    };
    let engine = Arc::new(RosterEngine::new(store, config.engine_settings()));

    if config.seed_items {
        let added = engine.seed_catalog().await?;
        info!(added, "Seeded item catalog");
    }

    let app = build_router(AppState::new(engine));

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
            }
            shutdown.cancel();
        }
    });

    info!("listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    Ok(())
}
