//! Handler-error capture.
//!
//! [`ExceptionCapture`] is an [`ErrorHook`] that copies a failing handler's
//! error into the request's side-channel under [`EXCEPTION_ITEM`], where the
//! trace middleware picks it up after the chain unwinds. The error itself
//! keeps propagating untouched; the server still answers `500`.

use crate::context::RequestContext;
use crate::error::HandlerError;
use crate::middleware::ErrorHook;
use crate::stack;

/// Side-channel key shared by [`ExceptionCapture`] (writer) and the trace
/// middleware (reader).
pub const EXCEPTION_ITEM: &str = "reqtrace.debug.exception";

/// An owned snapshot of a [`HandlerError`], as the trace renderer needs it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedError {
    /// Fully-qualified type name of the original error.
    pub type_name: String,
    pub message: String,
    /// One frame per line, `at <symbol> in <file>:<line>:<col>` where the
    /// location is known.
    pub stack_trace: String,
}

impl From<&HandlerError> for CapturedError {
    fn from(err: &HandlerError) -> Self {
        Self {
            type_name: err.type_name().to_owned(),
            message: err.message().to_owned(),
            stack_trace: err.backtrace().map(stack::format_backtrace).unwrap_or_default(),
        }
    }
}

/// Stores every handler error in the request's side-channel. Last write wins.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExceptionCapture;

impl ErrorHook for ExceptionCapture {
    fn on_error(&self, error: &HandlerError, ctx: &RequestContext) {
        ctx.items().insert(EXCEPTION_ITEM, CapturedError::from(error));
    }
}
