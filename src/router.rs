//! Radix-tree request router.
//!
//! One tree per HTTP method, O(path-length) lookup. The router is also the
//! innermost stage of the pipeline: it owns the middleware stack and the error
//! hooks, and it is where a handler's failure first becomes visible.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::config::TraceConfig;
use crate::error::HandlerError;
use crate::handler::{BoxedHandler, Handler, HandlerResult};
use crate::middleware::capture::ExceptionCapture;
use crate::middleware::trace::TraceMiddleware;
use crate::middleware::{ErrorHook, Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Every builder method returns `self` so registrations chain naturally.
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    layers: Vec<Arc<dyn Middleware>>,
    hooks: Vec<Arc<dyn ErrorHook>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax: `req.param("name")` retrieves them:
    ///
    /// ```rust,no_run
    /// # use http::Method;
    /// # use reqtrace::{Request, Response, Router};
    /// # async fn get_user(_: Request) -> Response { Response::text("") }
    /// # async fn create_user(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .on(Method::GET,  "/users/{id}", get_user)
    ///     .on(Method::POST, "/users",      create_user);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered for `method`. Routes are fixed at startup; a bad one is a
    /// programming error.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Append a middleware. The first layer registered is the outermost.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    /// Register an observer for handler failures. Hooks run in registration
    /// order.
    pub fn on_error(mut self, hook: impl ErrorHook) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Turn on console request tracing.
    ///
    /// Installs [`ExceptionCapture`] as an error hook and [`TraceMiddleware`]
    /// as the outermost layer, regardless of what was registered before.
    /// From then on every [`HandlerError`] records a backtrace.
    ///
    /// ```rust,no_run
    /// use reqtrace::{Router, TraceConfig};
    ///
    /// let app = Router::new()
    ///     .debug_logging(TraceConfig::new().highlight("my_service::"));
    /// ```
    pub fn debug_logging(mut self, config: TraceConfig) -> Self {
        crate::error::force_backtraces();
        self.layers.insert(0, Arc::new(TraceMiddleware::new(config)));
        self.on_error(ExceptionCapture)
    }

    /// Runs one request through the middleware stack and the router.
    ///
    /// This is what the server calls per request; it is also the way to drive
    /// the pipeline in tests without opening a socket.
    pub async fn call(self: Arc<Self>, req: Request) -> HandlerResult {
        Next::new(self).run(req).await
    }

    pub(crate) fn layer_at(&self, position: usize) -> Option<Arc<dyn Middleware>> {
        self.layers.get(position).cloned()
    }

    /// Innermost stage: look up the handler, call it, and let the hooks see
    /// any failure before it propagates.
    pub(crate) async fn route(&self, mut req: Request) -> HandlerResult {
        let Some((handler, params)) = self.lookup(req.method(), req.path()) else {
            return Ok(Response::status(StatusCode::NOT_FOUND));
        };

        req.set_params(params);
        let ctx = req.context().clone();

        let outcome = AssertUnwindSafe(handler.call(req))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(HandlerError::from_panic(payload)));

        if let Err(error) = &outcome {
            for hook in &self.hooks {
                hook.on_error(error, &ctx);
            }
        }

        outcome
    }

    fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }
}
