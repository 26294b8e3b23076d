use axum::{
    extract::rejection::{PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use cloudant_client::CloudantError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Revision conflict: {0}")]
    Conflict(String),

    #[error("Document store error: {0}")]
    Store(CloudantError),
}

impl From<CloudantError> for ApiError {
    fn from(err: CloudantError) -> Self {
        match err {
            CloudantError::NotFound(resource) => ApiError::NotFound(resource),
            CloudantError::Conflict(reason) => ApiError::Conflict(reason),
            other => ApiError::Store(other),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::InvalidPayload(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidPayload(rejection.body_text())
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::InvalidPayload(reason) => {
                debug!("Rejected payload: {}", reason);
                "Invalid payload"
            }
            ApiError::NotFound(resource) => {
                debug!("Document not found: {}", resource);
                "Document not found."
            }
            ApiError::Conflict(reason) => {
                warn!("Revision conflict: {}", reason);
                "Document update conflict."
            }
            ApiError::Store(err) => {
                error!("Document store request failed: {}", err);
                "Internal server error."
            }
        };

        (
            self.status_code(),
            Json(ErrorResponse {
                error: message.to_string(),
            }),
        )
            .into_response()
    }
}
