//! # reqtrace
//!
//! Colorized, per-request debug tracing for a minimal hyper HTTP stack.
//!
//! Turn it on and every request leaves one block on the console:
//!
//! ```text
//! [14:03:27]  GET     /orders/17                                          200 OK                       3 ms
//! [14:03:29]  POST    /orders                                             --- No Response             12 ms
//! {"sku":17,"qty":2}
//! shop::orders::OutOfStock: sku 17 unavailable
//!    at shop::orders::reserve
//!         in ./src/orders.rs:42:9
//! ```
//!
//! - Static assets (`/js`, `/css`, `/fonts`) are skipped.
//! - JSON bodies are shown, cut at 1000 characters; other content types are
//!   summarized by type and length.
//! - Handler errors (and panics) are shown with their type, message and stack,
//!   frames from your own code highlighted.
//! - Records from concurrent requests never interleave.
//!
//! Tracing only observes: the handler error still propagates, and the server
//! still answers it with `500`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::Method;
//! use reqtrace::{HandlerError, Request, Response, Router, Server, TraceConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .on(Method::GET,  "/users/{id}", get_user)
//!         .on(Method::POST, "/users",      create_user)
//!         .debug_logging(TraceConfig::new().highlight("my_service::"));
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#))
//! }
//!
//! async fn create_user(req: Request) -> Result<Response, HandlerError> {
//!     let body = req.body().text().await?;
//!     if body.is_empty() {
//!         return Err(HandlerError::new("my_service::EmptyBody", "no user given"));
//!     }
//!     Ok(Response::json(body))
//! }
//! ```

mod body;
mod config;
mod context;
mod error;
mod handler;
mod render;
mod request;
mod response;
mod router;
mod server;
mod stack;

pub mod middleware;

pub use body::Body;
pub use config::{ColorChoice, Highlights, TraceConfig};
pub use context::{Items, RequestContext};
pub use error::{Error, HandlerError, SharedError};
pub use handler::{BoxFuture, Handler, HandlerResult, IntoHandlerResult};
pub use middleware::capture::{CapturedError, EXCEPTION_ITEM, ExceptionCapture};
pub use middleware::trace::TraceMiddleware;
pub use render::{BodyPreview, Renderer, TraceRecord};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
