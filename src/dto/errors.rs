use serde::Serialize;
use std::fmt;

use crate::error::SecretError;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: u16,
}

impl ApiError {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
        }
    }

    pub fn invalid_input() -> Self {
        Self::new("Invalid input", 405)
    }

    pub fn not_found() -> Self {
        Self::new("Secret not found", 404)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API Error {}: {}", self.code, self.error)
    }
}

impl std::error::Error for ApiError {}

impl From<SecretError> for ApiError {
    fn from(err: SecretError) -> Self {
        if err.is_validation() {
            return Self::invalid_input();
        }
        if err.is_gone() {
            return Self::not_found();
        }
        tracing::error!(error = %err, "storage failure");
        Self::new("Internal server error", 500)
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = axum::http::StatusCode::from_u16(self.code)
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::Json(self);
        (status, body).into_response()
    }
}
