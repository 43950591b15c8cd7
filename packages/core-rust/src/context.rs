//! Request-scoped context store.
//!
//! Each request runs inside its own scope, established with [`run_in_scope`].
//! While the scope is active, any code on that request's logical flow can
//! reach the context through [`current_scope`] without it being threaded
//! through every call. The slot is a tokio task-local: it travels with the
//! future across `.await` points and worker threads, and is invisible to
//! every other task, including tasks spawned from inside the scope.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::ContextError;
use crate::request_id::{RequestId, REQUEST_ID_KEY};

tokio::task_local! {
    static CURRENT: RequestContext;
}

/// Key/value state belonging to exactly one in-flight request.
///
/// Cloning yields another handle to the same map, so a handle stored in the
/// request's extensions and the one returned by [`current_scope`] observe the
/// same writes. Handles must stay on the owning request's flow.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    values: Arc<Mutex<HashMap<String, Value>>>,
}

impl RequestContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context seeded with the request identifier under
    /// [`REQUEST_ID_KEY`].
    #[must_use]
    pub fn with_request_id(id: &RequestId) -> Self {
        let ctx = Self::new();
        ctx.set(REQUEST_ID_KEY, id.clone());
        ctx
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().get(key).cloned()
    }

    /// Stores `value` under `key` and returns the value it replaced.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.lock().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.values.lock().remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.lock().contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }

    /// Returns the request identifier, if one is stored as a string.
    #[must_use]
    pub fn request_id(&self) -> Option<String> {
        self.values
            .lock()
            .get(REQUEST_ID_KEY)
            .and_then(Value::as_str)
            .map(str::to_owned)
    }

    /// Copies the current contents out of the context.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.values.lock().clone()
    }

    /// Returns `true` if both handles point at the same scope state.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }
}

impl<K, V> FromIterator<(K, V)> for RequestContext
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let values = iter
            .into_iter()
            .map(|(k, v)| -> (String, Value) { (k.into(), v.into()) })
            .collect();
        Self {
            values: Arc::new(Mutex::new(values)),
        }
    }
}

/// Runs `body` with `context` as the current scope and returns its output.
///
/// The scope covers every poll of `body`, so code resuming after a
/// suspension point still sees `context`. When `body` completes, errors, or
/// unwinds, the previous scope (or none) is restored.
pub async fn run_in_scope<F>(context: RequestContext, body: F) -> F::Output
where
    F: Future,
{
    tracing::trace!(request_id = ?context.request_id(), "entering request scope");
    CURRENT.scope(context, body).await
}

/// Synchronous counterpart of [`run_in_scope`].
pub fn run_in_scope_sync<F, R>(context: RequestContext, f: F) -> R
where
    F: FnOnce() -> R,
{
    CURRENT.sync_scope(context, f)
}

/// Returns the context of the nearest enclosing scope.
///
/// # Errors
///
/// Returns [`ContextError::NoActiveScope`] when called outside any scope.
pub fn current_scope() -> Result<RequestContext, ContextError> {
    CURRENT
        .try_with(RequestContext::clone)
        .map_err(|_| ContextError::NoActiveScope)
}

/// Like [`current_scope`], but yields `None` outside a scope.
#[must_use]
pub fn try_current_scope() -> Option<RequestContext> {
    CURRENT.try_with(RequestContext::clone).ok()
}

/// Reads `key` from the current scope.
///
/// # Errors
///
/// Returns [`ContextError::NoActiveScope`] when called outside any scope.
pub fn get(key: &str) -> Result<Option<Value>, ContextError> {
    CURRENT
        .try_with(|ctx| ctx.get(key))
        .map_err(|_| ContextError::NoActiveScope)
}

/// Writes `key` in the current scope, returning the replaced value.
///
/// # Errors
///
/// Returns [`ContextError::NoActiveScope`] when called outside any scope.
pub fn set(
    key: impl Into<String>,
    value: impl Into<Value>,
) -> Result<Option<Value>, ContextError> {
    let (key, value): (String, Value) = (key.into(), value.into());
    CURRENT
        .try_with(move |ctx| ctx.set(key, value))
        .map_err(|_| ContextError::NoActiveScope)
}
