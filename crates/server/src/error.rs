//! Structured errors for the edgeside listener.
//!
//! These map onto the HTTP status the edge answers with.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

/// Structured errors for the edgeside listener.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The edge pipeline failed before a response could start.
    #[error(transparent)]
    Edge(#[from] edgeside_core::Error),

    /// The origin answered with a status code HTTP cannot carry.
    #[error("INVALID_STATUS: origin answered with status {0}")]
    InvalidStatus(u16),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Edge(err) => StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_GATEWAY),
            ServerError::InvalidStatus(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(error = %self, status = status.as_u16(), "answering with error status");

        let reason = status.canonical_reason().unwrap_or("Error");
        (status, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], format!("{} {reason}", status.as_u16()))
            .into_response()
    }
}
