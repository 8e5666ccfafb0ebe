// Use mimalloc as the global allocator for the many small per-device buffers
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use netautomate_lib::api::{create_router, AppState};
use netautomate_lib::config::load_config;
use netautomate_lib::init_logging;
use netautomate_lib::inventory::Inventory;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    info!("NetAutomate starting...");

    let config = load_config().await?;
    let inventory = Arc::new(Inventory::open(&config.data_dir).await?);
    let state = Arc::new(AppState::new(&config, inventory));
    let gateway = state.gateway.clone();

    let app = create_router(state, &config.server.cors_origins);
    let listener = TcpListener::bind(&config.server.bind).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    gateway.disconnect().await;
    info!("NetAutomate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
