//! Batch execution endpoints

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::stream::{self, Stream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::dto::MessageResponse;
use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::batch::{
    archive_name, export_results, BatchEntry, BatchEvent, BatchExecutor, BatchRequest, JobSummary,
};

/// Run a command on every listed device and return the per-device results
///
/// The job is bound to this request: if the client goes away the future is
/// dropped and the job is cancelled.
pub async fn execute(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<Vec<BatchEntry>>, ApiError> {
    let Json(request) = payload?;
    let results = state
        .executor
        .execute(
            request.device_names,
            request.command,
            None,
            CancellationToken::new(),
        )
        .await?;
    Ok(Json(results))
}

/// Same as [`execute`], streamed as server-sent events
pub async fn execute_stream(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let Json(request) = payload?;
    let targets: Vec<String> = request
        .device_names
        .iter()
        .map(|t| t.trim().to_string())
        .collect();
    BatchExecutor::validate(&targets, &request.command)?;

    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let executor = state.executor.clone();
    let job_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = executor
            .execute(targets, request.command, Some(tx), job_cancel)
            .await
        {
            warn!("Streamed batch rejected: {}", e);
        }
    });

    // Dropping the stream (client disconnect) drops the guard and cancels the job
    let guard = cancel.drop_guard();
    let events = stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let event = rx.recv().await?;
        Some((Ok::<_, Infallible>(to_sse(&event)), (rx, guard)))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn to_sse(event: &BatchEvent) -> Event {
    match Event::default().event(event.name()).json_data(event) {
        Ok(sse) => sse,
        Err(e) => {
            warn!("Failed to encode batch event: {}", e);
            Event::default().event("error").data(e.to_string())
        }
    }
}

pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Vec<JobSummary>> {
    Json(state.executor.list_jobs())
}

pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::NotFound(format!("Batch job '{}' not found", id)))?;
    if !state.executor.cancel_job(&id) {
        return Err(ApiError::NotFound(format!("Batch job '{}' not found", id)));
    }
    Ok(Json(MessageResponse::new(format!(
        "Batch job '{}' cancelled",
        id
    ))))
}

/// Package posted results into a zip archive
pub async fn download(
    payload: Result<Json<Vec<BatchEntry>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(results) = payload?;
    let now = chrono::Local::now().naive_local();
    let bytes = export_results(&results, now)?;
    let filename = archive_name(now);
    debug!("Exported {} result(s) to {}", results.len(), filename);

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", filename),
            ),
        ],
        bytes,
    ))
}
