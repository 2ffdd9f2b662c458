use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::services::FeedError;
use crate::session::SessionError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Session store error: {0}")]
    StoreFailure(String),

    #[error("Upstream error: {0}")]
    UpstreamFailure(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "Unauthorized",
            ApiError::NotFound(_) => "NotFound",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::StoreFailure(_) => "StoreFailure",
            ApiError::UpstreamFailure(_) => "UpstreamFailure",
            ApiError::InternalError(_) => "InternalError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::StoreFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body used both for plain HTTP errors and for `error` frames on the event stream.
    pub fn to_body(&self) -> ErrorResponse {
        let message = match self {
            ApiError::Unauthorized(msg)
            | ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::StoreFailure(msg)
            | ApiError::UpstreamFailure(msg)
            | ApiError::InternalError(msg) => msg.clone(),
        };

        ErrorResponse {
            error: self.kind().to_string(),
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            ApiError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized: {}", msg);
                // Token-gated routes answer 401 without a body.
                return status.into_response();
            }
            ApiError::NotFound(msg) => tracing::warn!("Not found: {}", msg),
            ApiError::BadRequest(msg) => tracing::warn!("Bad request: {}", msg),
            ApiError::StoreFailure(msg) => tracing::error!("Session store error: {}", msg),
            ApiError::UpstreamFailure(msg) => tracing::error!("Upstream error: {}", msg),
            ApiError::InternalError(msg) => tracing::error!("Internal error: {}", msg),
        }

        (status, Json(self.to_body())).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        if err.is_absent() {
            ApiError::NotFound(err.to_string())
        } else {
            ApiError::StoreFailure(err.to_string())
        }
    }
}

impl From<FeedError> for ApiError {
    fn from(err: FeedError) -> Self {
        ApiError::UpstreamFailure(err.to_string())
    }
}
