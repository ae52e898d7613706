//! Subscriber callbacks.

use crate::token::CallbackId;
use std::fmt;
use std::sync::Arc;

/// Closure type for subscribers: `(topic, data)`.
pub type CallbackFn<T> = dyn Fn(&str, Option<&T>) + Send + Sync;

/// A subscriber function with a stable identity.
///
/// Clones share the identity, so the same callback can be registered on many
/// topics and later removed from all of them with
/// [`PubSub::unsubscribe_callback`](crate::PubSub::unsubscribe_callback).
pub struct Callback<T> {
    id: CallbackId,
    func: Arc<CallbackFn<T>>,
}

impl<T> Callback<T> {
    /// Wrap a closure, giving it a fresh identity.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&str, Option<&T>) + Send + Sync + 'static,
    {
        Self {
            id: CallbackId::generate(),
            func: Arc::new(func),
        }
    }

    /// Wrap a closure under an existing identity.
    pub(crate) fn with_id<F>(id: CallbackId, func: F) -> Self
    where
        F: Fn(&str, Option<&T>) + Send + Sync + 'static,
    {
        Self {
            id,
            func: Arc::new(func),
        }
    }

    /// The callback's identity.
    #[must_use]
    pub fn id(&self) -> CallbackId {
        self.id
    }

    /// Invoke the callback.
    pub fn call(&self, topic: &str, data: Option<&T>) {
        (self.func)(topic, data);
    }
}

impl<T> Clone for Callback<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            func: Arc::clone(&self.func),
        }
    }
}

impl<T> fmt::Debug for Callback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").field("id", &self.id).finish()
    }
}
