// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Translation of [`AnnexError`] into HTTP responses.

use annex_core::AnnexError;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

/// Handler error wrapping the workspace error.
#[derive(Debug)]
pub struct ApiError(pub AnnexError);

impl From<AnnexError> for ApiError {
    fn from(err: AnnexError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(AnnexError::Validation(rejection.body_text()))
    }
}

/// HTTP status for each error kind.
pub fn status_for(err: &AnnexError) -> StatusCode {
    match err {
        AnnexError::Validation(_) => StatusCode::BAD_REQUEST,
        AnnexError::NotFound { .. } => StatusCode::NOT_FOUND,
        AnnexError::Conflict { .. } => StatusCode::CONFLICT,
        AnnexError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        AnnexError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        AnnexError::Config(_) | AnnexError::Storage { .. } | AnnexError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %self.0, status = status.as_u16(), "request rejected");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}
