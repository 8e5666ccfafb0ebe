use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;

use crate::api::dto::MessageResponse;
use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::inventory::{CredentialProfile, CredentialSummary};

pub async fn list_credentials(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<String, CredentialSummary>> {
    Json(state.inventory.list_credentials())
}

pub async fn create_credential(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialProfile>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(profile) = payload?;
    let name = profile.name.trim().to_string();
    state.inventory.add_credential(profile).await?;
    Ok(Json(MessageResponse::new(format!(
        "Credential profile '{}' saved",
        name
    ))))
}

pub async fn update_credential(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    payload: Result<Json<CredentialProfile>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(profile) = payload?;
    state.inventory.update_credential(&name, profile).await?;
    Ok(Json(MessageResponse::new(format!(
        "Credential profile '{}' updated",
        name
    ))))
}

pub async fn delete_credential(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.inventory.delete_credential(&name).await?;
    Ok(Json(MessageResponse::new(format!(
        "Credential profile '{}' deleted",
        name
    ))))
}
