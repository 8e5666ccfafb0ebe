use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;

use crate::api::dto::MessageResponse;
use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::inventory::{JumpHostProfile, JumpHostSummary};

pub async fn list_jumphosts(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<String, JumpHostSummary>> {
    Json(state.inventory.list_jumphosts())
}

pub async fn create_jumphost(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<JumpHostProfile>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(profile) = payload?;
    let name = profile.name.trim().to_string();
    state.inventory.add_jumphost(profile).await?;
    Ok(Json(MessageResponse::new(format!(
        "Jump host profile '{}' saved",
        name
    ))))
}

pub async fn update_jumphost(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    payload: Result<Json<JumpHostProfile>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(profile) = payload?;
    state.inventory.update_jumphost(&name, profile).await?;
    Ok(Json(MessageResponse::new(format!(
        "Jump host profile '{}' updated",
        name
    ))))
}

pub async fn delete_jumphost(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.inventory.delete_jumphost(&name).await?;
    Ok(Json(MessageResponse::new(format!(
        "Jump host profile '{}' deleted",
        name
    ))))
}
