use std::net::SocketAddr;
use std::sync::Arc;
use time::OffsetDateTime;
use waitline::estimation::QueueEngine;
use waitline::state::AppState;
use waitline::storage::memory::MemoryStore;
use waitline::storage::seed::seed_catalogue;
use waitline::{api, config};

fn init_tracing(level: &str) {
    let level = level.parse::<tracing::Level>().unwrap_or(tracing::Level::INFO);
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_default()?;
    init_tracing(config.log_level());
    tracing::info!(
        config_path = config::DEFAULT_CONFIG_PATH,
        app = %config.app.name,
        "waitline starting"
    );

    let store = Arc::new(MemoryStore::new());
    let seeded = seed_catalogue(store.as_ref(), &config, OffsetDateTime::now_utc()).await?;
    tracing::info!(
        location_types = seeded.location_types,
        locations = seeded.locations,
        "Catalogue seeded"
    );

    let engine = QueueEngine::new(store, config.engine_settings()?);
    let settings = engine.settings();
    tracing::info!(
        live_window_minutes = settings.live_window.whole_minutes(),
        cooldown_minutes = settings.checkin_cooldown.whole_minutes(),
        utc_offset = %settings.utc_offset,
        "Engine settings loaded"
    );

    let app = api::router(Arc::new(AppState::new(engine)));
    let port = config.server_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
