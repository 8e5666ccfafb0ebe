use axum::Json;

use crate::api::dto::{BannerResponse, HealthResponse};

pub async fn root() -> Json<BannerResponse> {
    Json(BannerResponse {
        message: "Network Automation API is running",
        status: "ok",
    })
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}
