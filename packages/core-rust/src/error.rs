//! Error types for the request context store.

/// Errors raised by the request context store and identifier parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// The current logical flow is not running inside any request scope.
    #[error("no request scope is active on the current task")]
    NoActiveScope,
    /// A string could not be parsed as a [`RequestId`](crate::RequestId).
    #[error("invalid request id {value:?}: expected 1 to 13 lowercase base-36 characters")]
    InvalidRequestId { value: String },
}
