//! HTTP error rendering. Every error leaving the API carries the machine
//! readable `{message, type, code}` body, with the non-standard 572 and 470
//! codes passed through verbatim for clients that key off them.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::debug;

use crate::error::HoustonError;
use crate::model::ErrorBody;

/// Wrapper giving [`HoustonError`] an HTTP rendering.
#[derive(Debug)]
pub struct ApiError(pub HoustonError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<HoustonError> for ApiError {
    fn from(error: HoustonError) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        debug!(code, kind = self.0.kind(), "request failed: {}", self.0);
        let body = ErrorBody {
            message: self.0.to_string(),
            kind: self.0.kind().to_string(),
            code,
        };
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_standard_codes_survive() {
        let response = ApiError(HoustonError::TransactionFailed).into_response();
        assert_eq!(response.status().as_u16(), 572);

        let response = ApiError(HoustonError::KeyNotFound).into_response();
        assert_eq!(response.status().as_u16(), 470);
    }

    #[test]
    fn test_state_errors_are_bad_request() {
        let response = ApiError(HoustonError::StageChange("x".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
