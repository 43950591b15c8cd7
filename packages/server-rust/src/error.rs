//! Errors surfaced by request handlers.

use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reqctx_core::ContextError;

/// Failures while producing a response.
///
/// Each maps to a plain-text `500`; the request scope is discarded as usual.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("request scope carries no request id")]
    MissingRequestId,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "request handling failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(CONTENT_TYPE, "text/plain")],
            format!("{self}\n"),
        )
            .into_response()
    }
}
