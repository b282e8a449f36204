use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use base64::DecodeError;
use serde::{Deserialize, Serialize};
use tokio::io;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("missing or invalid Content-Length header")]
    InvalidLength,
    #[error("declared body of {declared} bytes exceeds the {limit} byte limit")]
    BodyTooLarge { declared: usize, limit: usize },
    #[error("request body ended after {got} of {expected} declared bytes")]
    TruncatedBody { expected: usize, got: usize },
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("invalid base64 data: {0}")]
    InvalidBase64(#[from] DecodeError),
    #[error("failed to write {path}: {source}")]
    Storage { path: String, source: io::Error },
    #[error("failed to run {program}: {source}")]
    DeviceControl { program: String, source: io::Error },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidLength
                | Self::BodyTooLarge { .. }
                | Self::TruncatedBody { .. }
                | Self::InvalidJson(_)
                | Self::InvalidBase64(_)
        )
    }
}

// Every failure is reported as a 500, whatever its cause.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_client_error() {
            tracing::warn!("rejected upload: {self}");
        } else {
            tracing::error!("{self:?}");
        }

        let res = ErrorResponse {
            error: self.to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(res)).into_response()
    }
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
