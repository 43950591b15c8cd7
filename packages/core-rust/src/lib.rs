//! `reqctx` core: a request-scoped context store and request identifiers.
//!
//! Concurrent request handlers share one process, so per-request state lives
//! in an isolated scope bound to the request's logical flow rather than in a
//! shared variable. See [`context`] for the store and [`request_id`] for the
//! identifier scheme.

pub mod context;
pub mod error;
pub mod request_id;

pub use context::{
    current_scope, run_in_scope, run_in_scope_sync, try_current_scope, RequestContext,
};
pub use error::ContextError;
pub use request_id::{RequestId, REQUEST_ID_KEY, REQUEST_ID_LEN};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
