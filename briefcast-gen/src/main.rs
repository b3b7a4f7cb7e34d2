//! briefcast-gen - News briefing generation service
//!
//! Turns a topic into a multimedia news briefing: researched briefing
//! document, timed production script, narrated audio, and a combined
//! briefing video, streamed to clients as typed progress events.

use anyhow::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use briefcast_common::AppConfig;
use briefcast_gen::{build_router, AppState, ServiceClients};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting briefcast-gen service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load();

    // Media directories must exist before ServeDir mounts them
    std::fs::create_dir_all(&config.audio_dir)?;
    std::fs::create_dir_all(&config.video_dir)?;
    info!("Audio directory: {}", config.audio_dir.display());
    info!("Video directory: {}", config.video_dir.display());

    let clients = ServiceClients::from_config(&config)?;
    let bind_addr = config.bind_addr.clone();

    let state = AppState::new(config, clients);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
