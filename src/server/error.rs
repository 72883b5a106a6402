use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tracing::error;

use crate::error::MatchError;

/// Boundary wrapper mapping [`MatchError`] onto HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub MatchError);

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    actual: Option<usize>,
}

impl ApiError {
    /// Status used by the matching API: caller mistakes are 4xx, everything
    /// else is a server error.
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            MatchError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            e if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MatchError> for ApiError {
    fn from(err: MatchError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        error_response(status, &self.0)
    }
}

/// JSON error body `{error, message}` naming the error kind.
pub(crate) fn error_response(status: StatusCode, err: &MatchError) -> axum::response::Response {
    let code = err.kind();
    if status.is_server_error() {
        error!(code, status = %status, error = %err, "api_error");
    }

    let (expected, actual) = match err {
        MatchError::DimensionMismatch { expected, actual } => (Some(*expected), Some(*actual)),
        _ => (None, None),
    };

    let body = Json(ErrorResponse {
        error: code,
        message: err.to_string(),
        expected,
        actual,
    });

    (status, body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError(MatchError::InvalidInput("empty".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(MatchError::ProviderUnavailable("down".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError(MatchError::IndexConflict {
                name: "i".into(),
                detail: "d".into()
            })
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
