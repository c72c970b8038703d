//! Middleware layer.
//!
//! Two extension points sit around the router:
//!
//! - [`Middleware`] wraps the whole request. It receives the request and a
//!   [`Next`] continuation, and decides what happens before and after the rest
//!   of the chain runs. Layers are applied in registration order, first one
//!   outermost.
//! - [`ErrorHook`] observes handler failures from inside the router, with
//!   access to the failing request's [`RequestContext`]. Hooks cannot change
//!   the error or the response; they only look.
//!
//! Built-in:
//! - [`trace`]: colorized per-request trace lines on the console
//! - [`capture`]: stores handler errors where [`trace`] can find them

pub mod capture;
pub mod trace;

use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::HandlerError;
use crate::handler::{BoxFuture, HandlerResult};
use crate::request::Request;
use crate::router::Router;

/// A request/response interceptor.
///
/// ```rust,no_run
/// use reqtrace::middleware::{Middleware, Next};
/// use reqtrace::{BoxFuture, HandlerResult, Request};
///
/// struct Timing;
///
/// impl Middleware for Timing {
///     fn handle(&self, req: Request, next: Next) -> BoxFuture<HandlerResult> {
///         Box::pin(async move {
///             let started = std::time::Instant::now();
///             let outcome = next.run(req).await;
///             tracing::debug!(elapsed = ?started.elapsed(), "request done");
///             outcome
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, req: Request, next: Next) -> BoxFuture<HandlerResult>;
}

/// Observer called by the router when a handler returns an error or panics.
pub trait ErrorHook: Send + Sync + 'static {
    fn on_error(&self, error: &HandlerError, ctx: &RequestContext);
}

/// The rest of the pipeline, as seen from one middleware.
///
/// `run` takes `self` by value: a middleware can invoke the continuation at
/// most once.
pub struct Next {
    router: Arc<Router>,
    position: usize,
}

impl Next {
    pub(crate) fn new(router: Arc<Router>) -> Self {
        Self { router, position: 0 }
    }

    /// Runs the remaining layers, then the router.
    pub async fn run(self, req: Request) -> HandlerResult {
        let layer = self.router.layer_at(self.position);
        match layer {
            Some(layer) => {
                let next = Next { router: self.router, position: self.position + 1 };
                layer.handle(req, next).await
            }
            None => self.router.route(req).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use bytes::Bytes;
    use http::{Method, StatusCode};
    use http_body_util::Full;

    use crate::response::Response;

    struct Tag {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Middleware for Tag {
        fn handle(&self, req: Request, next: Next) -> BoxFuture<HandlerResult> {
            let name = self.name;
            let log = Arc::clone(&self.log);
            Box::pin(async move {
                log.lock().unwrap().push(format!("enter {name}"));
                let outcome = next.run(req).await;
                log.lock().unwrap().push(format!("leave {name}"));
                outcome
            })
        }
    }

    fn get(path: &str) -> Request {
        Request::from_http(
            http::Request::get(path).body(Full::new(Bytes::new())).unwrap(),
        )
    }

    #[tokio::test]
    async fn first_layer_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler_log = Arc::clone(&log);

        let router = Router::new()
            .layer(Tag { name: "outer", log: Arc::clone(&log) })
            .layer(Tag { name: "inner", log: Arc::clone(&log) })
            .on(Method::GET, "/", move |_req: Request| {
                let log = Arc::clone(&handler_log);
                async move {
                    log.lock().unwrap().push("handler".to_owned());
                    Response::text("ok")
                }
            });

        let res = Arc::new(router).call(get("/")).await.unwrap();
        assert_eq!(res.status_code(), StatusCode::OK);

        assert_eq!(
            *log.lock().unwrap(),
            ["enter outer", "enter inner", "handler", "leave inner", "leave outer"],
        );
    }

    #[tokio::test]
    async fn layers_see_unrouted_requests() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = Router::new().layer(Tag { name: "only", log: Arc::clone(&log) });

        let res = Arc::new(router).call(get("/missing")).await.unwrap();
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(*log.lock().unwrap(), ["enter only", "leave only"]);
    }
}
