//! HTTP handlers and the shared state they extract.

pub mod health;
pub mod metrics;
pub mod request_id;

pub use health::{health_handler, liveness_handler, readiness_handler};
pub use metrics::metrics_handler;
pub use request_id::request_id_handler;

use std::sync::Arc;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusHandle;

use super::ShutdownController;

/// State shared by all handlers via `State` extraction. Cheap to clone.
///
/// Holds server-wide resources only; per-request state lives in the request
/// scope, never here.
#[derive(Clone)]
pub struct AppState {
    pub shutdown: Arc<ShutdownController>,
    /// Server start time, for uptime.
    pub start_time: Instant,
    /// Present when the Prometheus recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}
