//! API router configuration

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::handlers::{batch, credentials, gateway, health, inventory, jumphosts};
use super::state::AppState;

/// Create the API router with all routes
///
/// `cors_origins` lists the dashboard origins allowed to call the API; `*`
/// allows any origin.
pub fn create_router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        // Devices
        .route(
            "/inventory/devices",
            get(inventory::list_devices).post(inventory::create_device),
        )
        .route(
            "/inventory/devices/:name",
            put(inventory::update_device).delete(inventory::delete_device),
        )
        .route("/inventory/export/csv", get(inventory::export_csv))
        .route("/inventory/import/csv", post(inventory::import_csv))
        // Credentials
        .route(
            "/credentials",
            get(credentials::list_credentials).post(credentials::create_credential),
        )
        .route(
            "/credentials/:name",
            put(credentials::update_credential).delete(credentials::delete_credential),
        )
        // Jump hosts
        .route(
            "/jumphosts",
            get(jumphosts::list_jumphosts).post(jumphosts::create_jumphost),
        )
        .route(
            "/jumphosts/:name",
            put(jumphosts::update_jumphost).delete(jumphosts::delete_jumphost),
        )
        // Batch
        .route("/batch/execute", post(batch::execute))
        .route("/batch/execute/stream", post(batch::execute_stream))
        .route("/batch/jobs", get(batch::list_jobs))
        .route("/batch/jobs/:id/cancel", post(batch::cancel_job))
        .route("/batch/download", post(batch::download))
        // Gateway
        .route("/gateway/status", get(gateway::status))
        .route("/gateway/connect", post(gateway::connect))
        .route("/gateway/disconnect", post(gateway::disconnect))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o.trim() == "*") {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {:?}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}
