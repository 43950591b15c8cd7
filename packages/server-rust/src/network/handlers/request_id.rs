//! The request-id endpoint: answers any request with the id generated for it.

use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use reqctx_core::current_scope;

use crate::error::ServerError;

/// Responds `200 OK`, `text/plain`, body `Request ID: <id>\n`.
///
/// The id is not passed in: it is read from the request scope established
/// by the scope middleware.
///
/// # Errors
///
/// Fails with a 500 when no scope is active or the scope holds no id.
pub async fn request_id_handler() -> Result<Response, ServerError> {
    let body = render_request_id()?;
    Ok(([(CONTENT_TYPE, "text/plain")], body).into_response())
}

/// Renders the response body from the current scope.
///
/// # Errors
///
/// [`ServerError::Context`] outside a scope, [`ServerError::MissingRequestId`]
/// when the scope has no string `requestId`.
pub fn render_request_id() -> Result<String, ServerError> {
    let id = current_scope()?
        .request_id()
        .ok_or(ServerError::MissingRequestId)?;
    Ok(format!("Request ID: {id}\n"))
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use reqctx_core::{run_in_scope, RequestContext, RequestId};

    use super::*;

    #[tokio::test]
    async fn renders_id_from_current_scope() {
        let id = RequestId::parse("abc123xyz").unwrap();
        let response = run_in_scope(RequestContext::with_request_id(&id), request_id_handler())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Request ID: abc123xyz\n");
    }

    #[tokio::test]
    async fn fails_outside_scope() {
        let response = request_id_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn fails_when_scope_has_no_id() {
        let err = run_in_scope(RequestContext::new(), async { render_request_id() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::MissingRequestId));
    }
}
