//! Trace configuration.
//!
//! Everything is fixed at startup. The builder is consumed by
//! [`Router::debug_logging`](crate::Router::debug_logging) or
//! [`TraceMiddleware::new`](crate::middleware::trace::TraceMiddleware::new).

use std::fmt;
use std::io::Write;
use std::sync::Arc;

/// Path prefixes skipped by default: static assets are noise in a debug log.
pub const DEFAULT_EXCLUDED_PREFIXES: [&str; 3] = ["/js", "/css", "/fonts"];

/// Body previews longer than this many characters are cut.
pub const DEFAULT_MAX_BODY_CHARS: usize = 1000;

/// Whether trace output carries ANSI colors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorChoice {
    /// Follow `console::colors_enabled()`: on for a terminal, off when piped
    /// or when `NO_COLOR` / `CLICOLOR=0` is set.
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    pub(crate) fn enabled(self) -> bool {
        match self {
            Self::Auto => console::colors_enabled(),
            Self::Always => true,
            Self::Never => false,
        }
    }
}

/// Substrings that mark a stack-trace line as worth a second look, usually
/// the crate names of your own code.
///
/// Matching is plain, case-sensitive substring containment.
#[derive(Clone, Debug, Default)]
pub struct Highlights(Arc<[String]>);

impl Highlights {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(items.into_iter().map(Into::<String>::into).collect())
    }

    /// Whether `line` contains any of the highlighted substrings.
    pub fn matches(&self, line: &str) -> bool {
        self.0.iter().any(|h| line.contains(h.as_str()))
    }
}

/// Builder for the trace middleware.
///
/// ```rust
/// use reqtrace::{ColorChoice, TraceConfig};
///
/// let config = TraceConfig::new()
///     .highlight("billing::")
///     .highlight("orders::")
///     .exclude_prefix("/favicon.ico")
///     .max_body_chars(500)
///     .color(ColorChoice::Always);
/// ```
pub struct TraceConfig {
    pub(crate) highlights: Vec<String>,
    pub(crate) excluded_prefixes: Vec<String>,
    pub(crate) max_body_chars: usize,
    pub(crate) color: ColorChoice,
    pub(crate) writer: Option<Box<dyn Write + Send>>,
}

impl TraceConfig {
    pub fn new() -> Self {
        Self {
            highlights: Vec::new(),
            excluded_prefixes: DEFAULT_EXCLUDED_PREFIXES.iter().map(|p| (*p).to_owned()).collect(),
            max_body_chars: DEFAULT_MAX_BODY_CHARS,
            color: ColorChoice::Auto,
            writer: None,
        }
    }

    /// Add one highlighted substring. Order of registration is kept.
    pub fn highlight(mut self, needle: impl Into<String>) -> Self {
        self.highlights.push(needle.into());
        self
    }

    pub fn highlights<I, S>(mut self, needles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.highlights.extend(needles.into_iter().map(Into::into));
        self
    }

    /// Skip requests whose path starts with `prefix`, in addition to the
    /// defaults.
    pub fn exclude_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.excluded_prefixes.push(prefix.into());
        self
    }

    /// Replace the excluded prefixes, defaults included.
    pub fn excluded_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_body_chars(mut self, max: usize) -> Self {
        self.max_body_chars = max;
        self
    }

    pub fn color(mut self, choice: ColorChoice) -> Self {
        self.color = choice;
        self
    }

    /// Send trace records to `writer` instead of stdout.
    pub fn writer(mut self, writer: impl Write + Send + 'static) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TraceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceConfig")
            .field("highlights", &self.highlights)
            .field("excluded_prefixes", &self.excluded_prefixes)
            .field("max_body_chars", &self.max_body_chars)
            .field("color", &self.color)
            .field("writer", &self.writer.as_ref().map(|_| "custom"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TraceConfig::default();
        assert_eq!(config.excluded_prefixes, ["/js", "/css", "/fonts"]);
        assert_eq!(config.max_body_chars, 1000);
        assert_eq!(config.color, ColorChoice::Auto);
        assert!(config.highlights.is_empty());
        assert!(config.writer.is_none());
    }

    #[test]
    fn builder_accumulates() {
        let config = TraceConfig::new()
            .highlight("a::")
            .highlights(["b::", "c::"])
            .exclude_prefix("/static")
            .max_body_chars(10)
            .color(ColorChoice::Never);

        assert_eq!(config.highlights, ["a::", "b::", "c::"]);
        assert_eq!(config.excluded_prefixes.last().map(String::as_str), Some("/static"));
        assert_eq!(config.max_body_chars, 10);
        assert!(!config.color.enabled());
    }

    #[test]
    fn excluded_prefixes_replace_defaults() {
        let config = TraceConfig::new().excluded_prefixes(["/assets"]);
        assert_eq!(config.excluded_prefixes, ["/assets"]);
    }

    #[test]
    fn highlight_matching_is_ordinal() {
        let highlights = Highlights::new(["shop::"]);
        assert!(highlights.matches("   at shop::orders::reserve in ./src/orders.rs:4"));
        assert!(!highlights.matches("   at Shop::orders::reserve"));
        assert!(!Highlights::default().matches("anything"));
    }
}
