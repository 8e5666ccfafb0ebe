//! Device inventory endpoints

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use tracing::info;

use crate::api::dto::{DeviceResponse, ImportResponse, MessageResponse};
use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::inventory::csv::{export_devices, parse_devices};
use crate::inventory::DeviceRecord;

pub async fn list_devices(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, DeviceRecord>> {
    Json(state.inventory.list_devices())
}

pub async fn create_device(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DeviceRecord>, JsonRejection>,
) -> Result<Json<DeviceResponse>, ApiError> {
    let Json(record) = payload?;
    let device = state.inventory.add_device(record).await?;
    Ok(Json(DeviceResponse {
        message: format!("Device '{}' saved", device.name),
        device,
    }))
}

pub async fn update_device(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    payload: Result<Json<DeviceRecord>, JsonRejection>,
) -> Result<Json<DeviceResponse>, ApiError> {
    let Json(record) = payload?;
    let device = state.inventory.update_device(&name, record).await?;
    Ok(Json(DeviceResponse {
        message: format!("Device '{}' updated", device.name),
        device,
    }))
}

pub async fn delete_device(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.inventory.delete_device(&name).await?;
    Ok(Json(MessageResponse::new(format!("Device '{}' deleted", name))))
}

pub async fn export_csv(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let body = export_devices(&state.inventory.snapshot())?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=inventory_export.csv",
            ),
        ],
        body,
    ))
}

/// Import devices from the multipart field `file`; existing names are overwritten
pub async fn import_csv(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ImportResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            upload = Some(field.bytes().await?);
            break;
        }
    }
    let bytes = upload.ok_or_else(|| ApiError::BadRequest("Missing multipart field 'file'".into()))?;

    let outcome = parse_devices(&bytes)?;
    let imported = state.inventory.upsert_devices(outcome.records).await?;
    info!(
        "CSV import: {} device(s) imported, {} row(s) rejected",
        imported,
        outcome.errors.len()
    );

    Ok(Json(ImportResponse {
        message: format!("Imported {} device(s)", imported),
        imported,
        errors: outcome.errors,
    }))
}
