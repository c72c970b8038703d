//! Error types.
//!
//! Two kinds of failure flow through reqtrace:
//!
//! - [`Error`]: infrastructure failures: binding a port, accepting a
//!   connection, reading a request body off the wire, writing to the console.
//! - [`HandlerError`]: an application error raised by a handler. It travels
//!   up the middleware chain as the `Err` side of every [`Next::run`] and is
//!   turned into a `500` by the server once nothing else claims it.
//!
//! [`Next::run`]: crate::middleware::Next::run

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Boxed error used for body streams of arbitrary origin.
pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A body-stream failure, shared by every reader of the same body.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by reqtrace's fallible infrastructure operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid socket address `{addr}`: {source}")]
    Addr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("request body: {0}")]
    Body(#[source] SharedError),
}

// ── Backtraces ────────────────────────────────────────────────────────────────

static FORCE_BACKTRACES: AtomicBool = AtomicBool::new(false);

/// Record a backtrace for every later `HandlerError`, whatever
/// `RUST_BACKTRACE` says. Set once by
/// [`Router::debug_logging`](crate::Router::debug_logging).
pub(crate) fn force_backtraces() {
    FORCE_BACKTRACES.store(true, Ordering::Relaxed);
}

fn capture_backtrace() -> Option<Backtrace> {
    let backtrace = if FORCE_BACKTRACES.load(Ordering::Relaxed) {
        Backtrace::force_capture()
    } else {
        Backtrace::capture()
    };
    (backtrace.status() == BacktraceStatus::Captured).then_some(backtrace)
}

// ── HandlerError ──────────────────────────────────────────────────────────────

/// An error raised while handling a request.
///
/// Any `std::error::Error + Send + Sync + 'static` converts into it, so
/// handlers can use `?` freely:
///
/// ```rust,no_run
/// use reqtrace::{HandlerError, Request, Response};
///
/// async fn load(req: Request) -> Result<Response, HandlerError> {
///     let raw = req.body().text().await?;
///     let n: u32 = raw.trim().parse()?;
///     Ok(Response::text(format!("{}", n * 2)))
/// }
/// ```
///
/// The conversion records the concrete type name of the source error. A
/// backtrace is captured at that point once tracing is installed, or when
/// `RUST_BACKTRACE` / `RUST_LIB_BACKTRACE` ask for one. `HandlerError` intentionally does not
/// implement `std::error::Error` itself; if it did, the blanket `From` impl
/// would overlap with `From<T> for T`.
pub struct HandlerError {
    type_name: Cow<'static, str>,
    message: String,
    source: Option<BoxError>,
    backtrace: Option<Backtrace>,
}

impl HandlerError {
    /// Builds an error from a type label and a message, capturing a backtrace
    /// at the call site when backtraces are enabled.
    pub fn new(type_name: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            source: None,
            backtrace: capture_backtrace(),
        }
    }

    /// Converts a caught panic payload. The unwind has already happened, so
    /// there is no meaningful backtrace to record.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_owned()
        };

        Self {
            type_name: Cow::Borrowed("panic"),
            message,
            source: None,
            backtrace: None,
        }
    }

    /// Fully-qualified type name of the original error.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The backtrace captured when the error was created, if any.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        self.backtrace.as_ref()
    }

    /// The wrapped error, when the `HandlerError` was built from one.
    pub fn source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.source.as_deref()
    }
}

impl<E> From<E> for HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self {
            type_name: Cow::Borrowed(std::any::type_name::<E>()),
            message: err.to_string(),
            source: Some(Box::new(err)),
            backtrace: capture_backtrace(),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerError")
            .field("type_name", &self.type_name)
            .field("message", &self.message)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("boom")
        }
    }

    impl std::error::Error for Boom {}

    #[test]
    fn conversion_records_type_name_and_message() {
        let err = HandlerError::from(Boom);
        assert!(err.type_name().ends_with("tests::Boom"));
        assert_eq!(err.message(), "boom");
        assert!(err.source().is_some());
    }

    #[test]
    fn forced_backtraces_are_always_captured() {
        force_backtraces();

        let err = HandlerError::from(Boom);
        let backtrace = err.backtrace().unwrap();
        assert_eq!(backtrace.status(), BacktraceStatus::Captured);
        assert!(HandlerError::new("app::Oops", "x").backtrace().is_some());
    }

    #[test]
    fn captured_backtraces_are_never_placeholders() {
        if let Some(backtrace) = HandlerError::from(Boom).backtrace() {
            assert_eq!(backtrace.status(), BacktraceStatus::Captured);
        }
    }

    #[test]
    fn question_mark_converts_std_errors() {
        fn parse(s: &str) -> Result<u32, HandlerError> {
            Ok(s.parse::<u32>()?)
        }

        let err = parse("nope").unwrap_err();
        assert!(err.type_name().ends_with("ParseIntError"));
        assert_eq!(err.to_string(), format!("{}: {}", err.type_name(), err.message()));
    }

    #[test]
    fn panic_payloads_become_messages() {
        let err = HandlerError::from_panic(Box::new("index out of bounds"));
        assert_eq!(err.type_name(), "panic");
        assert_eq!(err.message(), "index out of bounds");
        assert!(err.backtrace().is_none());

        let err = HandlerError::from_panic(Box::new(String::from("owned")));
        assert_eq!(err.message(), "owned");

        let err = HandlerError::from_panic(Box::new(42_u8));
        assert_eq!(err.message(), "Box<dyn Any>");
    }
}
