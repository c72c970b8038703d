//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The router holds handlers of *different* types in a single
//! `HashMap<Method, Tree>`, so each one is hidden behind a trait object
//! (`dyn ErasedHandler`) with a uniform signature:
//!
//! ```text
//! async fn hello(req: Request) -> Result<Response, E>  ← user writes this
//!        ↓ router.on(Method::GET, "/", hello)
//! hello.into_boxed_handler()                           ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(hello))                           ← stored as BoxedHandler
//!        ↓
//! handler.call(req)  at request time                   ← one vtable dispatch
//!        ↓
//! Box::pin(async { hello(req).await.into_handler_result() })
//! ```
//!
//! Handlers may return anything that is [`IntoResponse`], or a `Result` whose
//! error converts into [`HandlerError`]. An `Err` is what the trace middleware
//! reports as an unhandled error.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::StatusCode;

use crate::error::HandlerError;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// What one pass through the pipeline produces.
pub type HandlerResult = Result<Response, HandlerError>;

/// A heap-allocated, type-erased future.
///
/// `Pin<Box<…>>` lets the runtime poll it in place; `Send + 'static` lets
/// tokio move it across worker threads.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<HandlerResult>;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── IntoHandlerResult ─────────────────────────────────────────────────────────

/// Return types accepted from a handler.
///
/// Implemented for the [`IntoResponse`] types reqtrace ships and for
/// `Result<T, E>` where `T: IntoResponse` and `E: Into<HandlerError>`.
pub trait IntoHandlerResult {
    fn into_handler_result(self) -> HandlerResult;
}

impl IntoHandlerResult for Response {
    fn into_handler_result(self) -> HandlerResult { Ok(self) }
}

impl IntoHandlerResult for &'static str {
    fn into_handler_result(self) -> HandlerResult { Ok(self.into_response()) }
}

impl IntoHandlerResult for String {
    fn into_handler_result(self) -> HandlerResult { Ok(self.into_response()) }
}

impl IntoHandlerResult for StatusCode {
    fn into_handler_result(self) -> HandlerResult { Ok(self.into_response()) }
}

impl<T, E> IntoHandlerResult for Result<T, E>
where
    T: IntoResponse,
    E: Into<HandlerError>,
{
    fn into_handler_result(self) -> HandlerResult {
        self.map(IntoResponse::into_response).map_err(Into::into)
    }
}

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` with the signature:
///
/// ```text
/// async fn name(req: Request) -> impl IntoHandlerResult
/// ```
///
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoHandlerResult + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoHandlerResult + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Bridges a concrete handler `F` to the [`ErasedHandler`] trait object.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoHandlerResult + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<HandlerResult> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_handler_result() })
    }
}
