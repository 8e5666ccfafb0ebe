//! HTTP error mapping
//!
//! Every failure leaves the API as `{"detail": "..."}` with a status code
//! chosen by error kind.

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::batch::{BatchError, ExportError};
use crate::gateway::GatewayError;
use crate::inventory::InventoryError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
        }
        (
            status,
            Json(ErrorBody {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::Validation(_) | InventoryError::Csv(_) => {
                ApiError::BadRequest(err.to_string())
            }
            InventoryError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            InventoryError::AlreadyExists { .. } | InventoryError::InUse { .. } => {
                ApiError::Conflict(err.to_string())
            }
            InventoryError::Storage(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidProfile(_) => ApiError::NotFound(err.to_string()),
            GatewayError::AlreadyConnected
            | GatewayError::ConnectInProgress
            | GatewayError::Aborted => ApiError::Conflict(err.to_string()),
            GatewayError::HopFailed { .. } => ApiError::BadGateway(err.to_string()),
        }
    }
}

impl From<BatchError> for ApiError {
    fn from(err: BatchError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        ApiError::Internal(format!("Failed to create zip: {}", err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(format!("Invalid upload: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::RecordKind;

    #[test]
    fn test_inventory_error_status() {
        let cases = [
            (InventoryError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (
                InventoryError::NotFound {
                    kind: RecordKind::Device,
                    name: "r1".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                InventoryError::InUse {
                    kind: RecordKind::Credential,
                    name: "lab".into(),
                    devices: vec!["r1".into()],
                },
                StatusCode::CONFLICT,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_gateway_error_status() {
        assert_eq!(
            ApiError::from(GatewayError::InvalidProfile("b2".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(GatewayError::AlreadyConnected).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(GatewayError::HopFailed {
                hop: 1,
                profile: "b1".into(),
                reason: "refused".into()
            })
            .status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
