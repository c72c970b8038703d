//! Stack-trace text for captured errors.
//!
//! `std::backtrace::Backtrace` renders each frame over two lines:
//!
//! ```text
//!    4: shop::orders::reserve
//!              at ./src/orders.rs:42:9
//! ```
//!
//! The console renderer works line by line and splits a frame from its
//! source location at `" in "`, so frames are folded into one line each:
//!
//! ```text
//!    at shop::orders::reserve in ./src/orders.rs:42:9
//! ```

use std::backtrace::{Backtrace, BacktraceStatus};

/// Frames belonging to the capture machinery itself.
const SKIPPED_PREFIXES: &[&str] = &[
    "std::backtrace",
    "<std::backtrace",
    "reqtrace::error::",
    "<reqtrace::error::HandlerError",
];

/// Folds a backtrace into `at <symbol> in <location>` lines. Returns an empty
/// string when nothing was captured.
pub(crate) fn format_backtrace(backtrace: &Backtrace) -> String {
    if backtrace.status() != BacktraceStatus::Captured {
        return String::new();
    }
    fold_frames(&backtrace.to_string())
}

fn fold_frames(raw: &str) -> String {
    let mut frames: Vec<(String, Option<String>)> = Vec::new();

    for line in raw.lines().map(str::trim) {
        if let Some(location) = line.strip_prefix("at ") {
            if let Some((_, slot @ None)) = frames.last_mut() {
                *slot = Some(location.to_owned());
            }
        } else if let Some(symbol) = frame_symbol(line) {
            frames.push((symbol.to_owned(), None));
        }
    }

    let mut out = String::new();
    for (symbol, location) in frames {
        if SKIPPED_PREFIXES.iter().any(|p| symbol.starts_with(p)) {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("   at ");
        out.push_str(&symbol);
        if let Some(location) = location {
            out.push_str(" in ");
            out.push_str(&location);
        }
    }
    out
}

/// `"12: some::symbol"` → `Some("some::symbol")`.
fn frame_symbol(line: &str) -> Option<&str> {
    let (index, symbol) = line.split_once(": ")?;
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "   0: std::backtrace::Backtrace::force_capture
             at /rustc/library/std/src/backtrace.rs:312:9
   1: reqtrace::error::HandlerError::new
             at ./src/error.rs:74:24
   2: shop::orders::reserve
             at ./src/orders.rs:42:9
   3: <core::pin::Pin<P> as core::future::future::Future>::poll
   4: tokio::runtime::task::core::Core<T,S>::poll
             at /cargo/tokio/src/runtime/task/core.rs:331:17";

    #[test]
    fn folds_symbol_and_location_into_one_line() {
        let folded = fold_frames(RAW);
        let lines: Vec<&str> = folded.lines().collect();

        assert_eq!(lines, [
            "   at shop::orders::reserve in ./src/orders.rs:42:9",
            "   at <core::pin::Pin<P> as core::future::future::Future>::poll",
            "   at tokio::runtime::task::core::Core<T,S>::poll in /cargo/tokio/src/runtime/task/core.rs:331:17",
        ]);
    }

    #[test]
    fn ignores_non_frame_lines() {
        assert_eq!(fold_frames("disabled backtrace"), "");
        assert_eq!(frame_symbol("note: see RUST_BACKTRACE"), None);
        assert_eq!(frame_symbol("7: a::b"), Some("a::b"));
    }

    #[test]
    fn disabled_backtraces_are_empty() {
        assert_eq!(format_backtrace(&Backtrace::disabled()), "");
    }
}
