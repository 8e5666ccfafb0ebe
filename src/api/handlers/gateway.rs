use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::api::dto::{
    GatewayConnectRequest, GatewayConnectResponse, GatewayStatusResponse, StatusResponse,
};
use crate::api::error::ApiError;
use crate::api::state::AppState;

pub async fn status(State(state): State<Arc<AppState>>) -> Json<GatewayStatusResponse> {
    Json(state.gateway.status().await.into())
}

pub async fn connect(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GatewayConnectRequest>, JsonRejection>,
) -> Result<Json<GatewayConnectResponse>, ApiError> {
    let Json(request) = payload?;
    if request.jumphost1_profile.trim().is_empty() {
        return Err(ApiError::BadRequest("jumphost1_profile is required".into()));
    }

    let snapshot = state
        .gateway
        .connect(
            &request.jumphost1_profile,
            request.jumphost2_profile.as_deref(),
        )
        .await?;

    Ok(Json(GatewayConnectResponse {
        status: snapshot.status.as_str(),
        jumphost1: snapshot.hop1,
        jumphost2: snapshot.hop2,
    }))
}

pub async fn disconnect(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let snapshot = state.gateway.disconnect().await;
    Json(StatusResponse {
        status: snapshot.status.as_str(),
    })
}
