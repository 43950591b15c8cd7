//! HTTP middleware stack for the request-id server.
//!
//! Ordering follows the outer-to-inner convention: the first layer listed is
//! the outermost, sees the request first and the response last.

use std::sync::Arc;

use axum::http::StatusCode;
use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;
use super::metrics::MetricsLayer;
use super::scope::RequestScopeLayer;
use super::shutdown::ShutdownController;

/// The composed layer type produced by [`build_http_layers`], innermost
/// layer first.
type HttpLayers = Stack<
    TimeoutLayer,
    Stack<
        CorsLayer,
        Stack<
            CompressionLayer,
            Stack<
                TraceLayer<SharedClassifier<ServerErrorsAsFailures>>,
                Stack<MetricsLayer, Stack<RequestScopeLayer, Identity>>,
            >,
        >,
    >,
>;

/// Builds the tower stack applied to every route.
///
/// **Outermost to innermost:**
/// 1. `RequestScope` -- generates the request id and runs everything below
///    inside that request's context scope and tracing span
/// 2. `Metrics` -- request count, latency, in-flight gauge
/// 3. `Trace` -- tower-http request/response events, nested in the request span
/// 4. `Compression` -- gzip when the client asks for it
/// 5. `CORS` -- configured origins, any method
/// 6. `Timeout` -- 408 once `request_timeout` elapses
#[must_use]
pub fn build_http_layers(config: &NetworkConfig, shutdown: Arc<ShutdownController>) -> HttpLayers {
    ServiceBuilder::new()
        .layer(RequestScopeLayer::new(shutdown))
        .layer(MetricsLayer)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&config.cors_origins))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .into_inner()
}

/// `"*"` anywhere in the list allows any origin; otherwise each entry that
/// parses as a header value is allowed.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([super::scope::X_REQUEST_ID])
}
