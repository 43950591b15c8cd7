//! Tower middleware that gives every request its own context scope.
//!
//! For each request the layer generates a [`RequestId`], seeds a fresh
//! [`RequestContext`] with it, and runs the inner service inside that scope,
//! both the synchronous `call` and every poll of the returned future. The same
//! context is also placed in the request extensions for handlers that prefer
//! to take it as a parameter.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use http::header::HeaderName;
use http::{HeaderValue, Request, Response};
use reqctx_core::{run_in_scope, run_in_scope_sync, RequestContext, RequestId};
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use super::shutdown::ShutdownController;

/// Response header carrying the server-generated request id.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
/// Response header echoing a client-supplied `x-request-id`.
pub const X_CORRELATION_ID: HeaderName = HeaderName::from_static("x-correlation-id");

// ---------------------------------------------------------------------------
// RequestScopeLayer
// ---------------------------------------------------------------------------

/// Layer that wraps services with per-request scope establishment.
#[derive(Debug, Clone)]
pub struct RequestScopeLayer {
    shutdown: Arc<ShutdownController>,
}

impl RequestScopeLayer {
    /// Requests handled under this layer are counted as in flight on `shutdown`.
    #[must_use]
    pub fn new(shutdown: Arc<ShutdownController>) -> Self {
        Self { shutdown }
    }
}

impl<S> Layer<S> for RequestScopeLayer {
    type Service = RequestScopeService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestScopeService {
            inner,
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

// ---------------------------------------------------------------------------
// RequestScopeService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RequestScopeService<S> {
    inner: S,
    shutdown: Arc<ShutdownController>,
}

impl<S, B, ResBody> Service<Request<B>> for RequestScopeService<S>
where
    S: Service<Request<B>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let request_id = RequestId::generate();
        let context = RequestContext::with_request_id(&request_id);
        let correlation_id = req.headers().get(&X_REQUEST_ID).cloned();
        req.extensions_mut().insert(context.clone());

        let span = info_span!(
            "request",
            method = %req.method(),
            path = %req.uri().path(),
            request_id = %request_id,
            status = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        );
        let guard = self.shutdown.in_flight_guard();
        let start = Instant::now();

        let inner = &mut self.inner;
        let fut = span.in_scope(|| run_in_scope_sync(context.clone(), || inner.call(req)));

        Box::pin(
            async move {
                let _guard = guard;
                let result = run_in_scope(context, fut).await;

                let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                let span = tracing::Span::current();
                span.record("duration_ms", duration_ms);

                let mut response = match result {
                    Ok(response) => response,
                    Err(err) => {
                        tracing::warn!(duration_ms, "inner service failed");
                        return Err(err);
                    }
                };

                let status = response.status().as_u16();
                span.record("status", status);

                let headers = response.headers_mut();
                if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
                    headers.insert(X_REQUEST_ID, value);
                }
                if let Some(client_id) = correlation_id {
                    headers.insert(X_CORRELATION_ID, client_id);
                }

                tracing::info!(status, duration_ms, "request complete");
                Ok(response)
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
