//! Per-request console tracing.
//!
//! [`TraceMiddleware`] times the rest of the chain and, however it ends,
//! prints one [`TraceRecord`]: method, path, status, latency, a preview of the
//! request body, and the handler error captured by
//! [`ExceptionCapture`](super::capture::ExceptionCapture) if there was one.
//!
//! Order of work per request:
//!
//! 1. start the clock, run the continuation, stop the clock
//! 2. skip everything for excluded path prefixes (`/js`, `/css`, `/fonts`)
//! 3. read the body (outside the output lock)
//! 4. take the captured error out of the side-channel
//! 5. render the record while holding the output lock
//!
//! The continuation's outcome is returned as-is. A failure in steps 3 or 5
//! replaces it: the instrumentation error is what propagates.
//!
//! Handler panics are already turned into errors by the router. A panic in
//! a layer between the tracer and the router is caught here, stored in the
//! side-channel like any handler error, and continues as a `panic`
//! [`HandlerError`] so the server still answers `500`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use futures_util::FutureExt;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};

use crate::config::{Highlights, TraceConfig};
use crate::error::HandlerError;
use crate::handler::{BoxFuture, HandlerResult};
use crate::middleware::capture::{CapturedError, EXCEPTION_ITEM};
use crate::middleware::{Middleware, Next};
use crate::render::{BodyPreview, Renderer, TraceRecord};
use crate::request::Request;

/// Middleware printing a colorized trace record for every request.
///
/// Usually installed through [`Router::debug_logging`](crate::Router::debug_logging),
/// which also registers the error hook it depends on.
#[derive(Clone)]
pub struct TraceMiddleware {
    inner: Arc<Tracer>,
}

struct Tracer {
    excluded_prefixes: Vec<String>,
    max_body_chars: usize,
    renderer: Renderer,
}

impl TraceMiddleware {
    pub fn new(config: TraceConfig) -> Self {
        let colors = config.color.enabled();
        let highlights = Highlights::new(config.highlights);
        let renderer = match config.writer {
            Some(writer) => Renderer::writer(writer, colors, highlights),
            None => Renderer::stdout(colors, highlights),
        };

        Self {
            inner: Arc::new(Tracer {
                excluded_prefixes: config.excluded_prefixes,
                max_body_chars: config.max_body_chars,
                renderer,
            }),
        }
    }
}

impl Tracer {
    fn should_trace(&self, path: &str) -> bool {
        !self.excluded_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}

impl Middleware for TraceMiddleware {
    fn handle(&self, req: Request, next: Next) -> BoxFuture<HandlerResult> {
        let tracer = Arc::clone(&self.inner);

        Box::pin(async move {
            let started = Instant::now();

            // The request is moved into the chain; keep what the record needs.
            let method = req.method().clone();
            let path = req.path().to_owned();
            let content_type = req.header(CONTENT_TYPE.as_str()).map(str::to_owned);
            let content_length = req
                .header(CONTENT_LENGTH.as_str())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = req.body().clone();
            let ctx = req.context().clone();

            let outcome = match AssertUnwindSafe(next.run(req)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => {
                    let error = HandlerError::from_panic(payload);
                    ctx.items().insert(EXCEPTION_ITEM, CapturedError::from(&error));
                    Err(error)
                }
            };
            let elapsed = started.elapsed();

            if !tracer.should_trace(&path) {
                tracing::trace!(%path, "excluded from request trace");
                return outcome;
            }

            let text = body.text().await?;
            let record = TraceRecord {
                timestamp: Local::now(),
                method,
                path,
                status: outcome.as_ref().ok().map(|res| res.status_code()),
                elapsed,
                body: BodyPreview::build(
                    content_type.as_deref(),
                    content_length,
                    &text,
                    tracer.max_body_chars,
                ),
                error: ctx.items().remove::<CapturedError>(EXCEPTION_ITEM),
            };

            tracer.renderer.render(&record).map_err(crate::Error::from)?;
            outcome
        })
    }
}
