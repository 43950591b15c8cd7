//! Listener, middleware, handlers, and lifecycle of the request-id server.

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod module;
pub mod scope;
pub mod shutdown;

pub use config::*;
pub use handlers::AppState;
pub use module::NetworkModule;
pub use scope::{RequestScopeLayer, X_CORRELATION_ID, X_REQUEST_ID};
pub use shutdown::*;
