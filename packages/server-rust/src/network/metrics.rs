//! Request metrics middleware.
//!
//! Records request count, latency, and in-flight gauge through the `metrics`
//! facade. Without an installed recorder the calls are no-ops.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use http::{Method, Request, Response};
use tower::{Layer, Service};

use crate::telemetry::{
    HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS,
};

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that records request metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

/// Holds the in-flight gauge up; cancelled requests still bring it down.
struct InFlightGauge;

impl InFlightGauge {
    fn enter() -> Self {
        metrics::gauge!(HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
        Self
    }
}

impl Drop for InFlightGauge {
    fn drop(&mut self) {
        metrics::gauge!(HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);
    }
}

impl<S, B, ResBody> Service<Request<B>> for MetricsService<S>
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

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let method = method_label(req.method());
        let gauge = InFlightGauge::enter();
        let start = Instant::now();
        let fut = self.inner.call(req);

        Box::pin(async move {
            let result = fut.await;
            drop(gauge);

            let status = match &result {
                Ok(response) => response.status().as_u16().to_string(),
                Err(_) => "error".to_string(),
            };

            metrics::histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method)
                .record(start.elapsed().as_secs_f64());
            metrics::counter!(HTTP_REQUESTS_TOTAL, "method" => method, "status" => status)
                .increment(1);

            result
        })
    }
}

/// Maps the request method to a bounded label set. The fallback route accepts
/// any method, so extension methods collapse into `OTHER`.
fn method_label(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::HEAD => "HEAD",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::PATCH => "PATCH",
        Method::OPTIONS => "OPTIONS",
        Method::CONNECT => "CONNECT",
        Method::TRACE => "TRACE",
        _ => "OTHER",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use http::StatusCode;
    use tower::{service_fn, ServiceExt};

    use super::*;
    use crate::telemetry::prometheus_builder;

    #[tokio::test]
    async fn records_count_and_latency_per_status() {
        let recorder = prometheus_builder().unwrap().build_recorder();
        let handle = recorder.handle();
        let _local = metrics::set_default_local_recorder(&recorder);

        let svc = MetricsLayer.layer(service_fn(|_req: Request<()>| async {
            let mut response = Response::new(());
            *response.status_mut() = StatusCode::NOT_FOUND;
            Ok::<_, Infallible>(response)
        }));

        let response = svc.oneshot(Request::new(())).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let rendered = handle.render();
        assert!(rendered.contains("http_requests_total{method=\"GET\",status=\"404\"} 1"));
        assert!(rendered.contains("http_request_duration_seconds_count{method=\"GET\"} 1"));
        assert!(rendered.contains("http_requests_in_flight 0"));
    }

    #[tokio::test]
    async fn errors_are_counted_separately() {
        let recorder = prometheus_builder().unwrap().build_recorder();
        let handle = recorder.handle();
        let _local = metrics::set_default_local_recorder(&recorder);

        let svc = MetricsLayer.layer(service_fn(|_req: Request<()>| async {
            Err::<Response<()>, _>("boom")
        }));

        assert!(svc.oneshot(Request::new(())).await.is_err());
        assert!(handle
            .render()
            .contains("http_requests_total{method=\"GET\",status=\"error\"} 1"));
    }

    #[tokio::test]
    async fn extension_methods_share_one_label() {
        let recorder = prometheus_builder().unwrap().build_recorder();
        let handle = recorder.handle();
        let _local = metrics::set_default_local_recorder(&recorder);

        let svc = MetricsLayer.layer(service_fn(|_req: Request<()>| async {
            Ok::<_, Infallible>(Response::new(()))
        }));

        for i in 0..200 {
            let method = Method::from_bytes(format!("M{i}").as_bytes()).unwrap();
            let request = Request::builder().method(method).body(()).unwrap();
            svc.clone().oneshot(request).await.unwrap();
        }
        svc.clone()
            .oneshot(Request::builder().method(Method::PATCH).body(()).unwrap())
            .await
            .unwrap();

        let rendered = handle.render();
        let series = rendered
            .lines()
            .filter(|line| line.starts_with("http_requests_total{"))
            .count();
        assert_eq!(series, 2);
        assert!(rendered.contains("http_requests_total{method=\"OTHER\",status=\"200\"} 200"));
        assert!(rendered.contains("http_requests_total{method=\"PATCH\",status=\"200\"} 1"));
        assert!(!rendered.contains("method=\"M0\""));
    }

    #[test]
    fn standard_methods_keep_their_names() {
        assert_eq!(method_label(&Method::GET), "GET");
        assert_eq!(method_label(&Method::OPTIONS), "OPTIONS");
        assert_eq!(method_label(&Method::from_bytes(b"PURGE").unwrap()), "OTHER");
    }

    #[tokio::test]
    async fn passes_through_without_recorder() {
        let svc = MetricsLayer.layer(service_fn(|_req: Request<()>| async {
            Ok::<_, Infallible>(Response::new("ok"))
        }));

        let response = svc.oneshot(Request::new(())).await.unwrap();
        assert_eq!(*response.body(), "ok");
    }
}
