//! Per-request side-channel.
//!
//! Every [`Request`](crate::Request) carries a [`RequestContext`]: a small
//! keyed bag that lives exactly as long as the request. An error hook deep inside
//! the router and a middleware wrapping the whole chain never see each other's
//! call frames; they meet here.
//!
//! ```text
//! TraceMiddleware   ctx = req.context().clone()  ──┐
//!   └─ Router                                      │ same Arc
//!        └─ ErrorHook  ctx.items().insert(KEY, e) ─┘
//! TraceMiddleware   ctx.items().remove(KEY)
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

type Value = Box<dyn Any + Send + Sync>;

/// Handle to the side-channel of one request. Clones share the same bag.
#[derive(Clone, Default)]
pub struct RequestContext {
    items: Arc<Items>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &Items {
        &self.items
    }
}

/// Keyed storage scoped to one request.
///
/// Keys are `&'static str` constants owned by whoever writes them. Writing a
/// key replaces its previous value.
#[derive(Default)]
pub struct Items {
    // Never contended across requests; the lock only makes the shared handle
    // `Sync` within one request.
    map: Mutex<HashMap<&'static str, Value>>,
}

impl Items {
    /// Stores `value` under `key`. Returns `true` when a previous value was
    /// replaced.
    pub fn insert<T>(&self, key: &'static str, value: T) -> bool
    where
        T: Any + Send + Sync,
    {
        self.lock().insert(key, Box::new(value)).is_some()
    }

    /// Removes and returns the value under `key` if it holds a `T`.
    ///
    /// A value of another type is left in place.
    pub fn remove<T>(&self, key: &'static str) -> Option<T>
    where
        T: Any + Send + Sync,
    {
        let mut map = self.lock();
        if !map.get(key)?.is::<T>() {
            return None;
        }
        map.remove(key)?.downcast::<T>().ok().map(|boxed| *boxed)
    }

    pub fn contains(&self, key: &'static str) -> bool {
        self.lock().contains_key(key)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<&'static str, Value>> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
