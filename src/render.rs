//! Console rendering of trace records.
//!
//! A [`Renderer`] owns one output sink and the lock that guards it. A record
//! is written while that lock is held, start to finish, so records from
//! concurrent requests never interleave.
//!
//! For stdout the lock is the process-wide [`std::io::StdoutLock`]: every
//! renderer pointed at stdout, and every `println!` in the process, is
//! serialized against it.
//!
//! Layout of one record:
//!
//! ```text
//! [14:03:27]  POST    /orders                                             201 Created                 12 ms
//! {"sku":17,"qty":2}
//! shop::orders::OutOfStock: sku 17 unavailable
//!    at shop::orders::reserve
//!         in ./src/orders.rs:42:9
//! ```

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local};
use console::{Color, Style};
use http::{Method, StatusCode};

use crate::config::Highlights;
use crate::middleware::capture::CapturedError;

/// Marker separating a stack frame from its source location.
const LOCATION_MARKER: &str = " in ";

// ── TraceRecord ───────────────────────────────────────────────────────────────

/// Everything printed about one completed request.
#[derive(Clone, Debug)]
pub struct TraceRecord {
    pub timestamp: DateTime<Local>,
    pub method: Method,
    pub path: String,
    /// `None` when the pipeline ended in an error and produced no response.
    pub status: Option<StatusCode>,
    pub elapsed: Duration,
    pub body: BodyPreview,
    pub error: Option<CapturedError>,
}

/// What to show of the request body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BodyPreview {
    None,
    /// Non-JSON payloads are summarized, never dumped.
    Summary { content_type: String, length: u64 },
    Text(String),
    /// The first `max_body_chars` characters of a longer body.
    Truncated(String),
}

impl BodyPreview {
    /// Decides how a body is previewed.
    ///
    /// `content_length` is the declared header value; when it is missing the
    /// length of `text` in bytes is used instead.
    pub fn build(
        content_type: Option<&str>,
        content_length: Option<u64>,
        text: &str,
        max_chars: usize,
    ) -> Self {
        if let Some(content_type) = content_type {
            if !is_json(content_type) {
                return Self::Summary {
                    content_type: content_type.to_owned(),
                    length: content_length.unwrap_or(text.len() as u64),
                };
            }
        }

        match text.char_indices().nth(max_chars) {
            Some((cut, _)) => Self::Truncated(text[..cut].to_owned()),
            None if text.is_empty() => Self::None,
            None => Self::Text(text.to_owned()),
        }
    }
}

/// `application/json`, ignoring case and any parameters such as `charset`.
fn is_json(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case("application/json")
}

// ── Palette ───────────────────────────────────────────────────────────────────

pub(crate) fn method_color(method: &Method) -> Color {
    match *method {
        Method::GET => Color::Green,
        Method::POST => Color::Cyan,
        Method::PUT => Color::Magenta,
        Method::DELETE => Color::Red,
        _ => Color::Yellow,
    }
}

/// Status buckets, each with its own color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StatusClass {
    /// 1xx, or no response at all.
    Other,
    Success,
    Redirection,
    ClientError,
    ServerError,
}

impl StatusClass {
    pub(crate) fn of(status: Option<StatusCode>) -> Self {
        match status.map(|s| s.as_u16()) {
            Some(500..) => Self::ServerError,
            Some(400..) => Self::ClientError,
            Some(300..) => Self::Redirection,
            Some(200..) => Self::Success,
            _ => Self::Other,
        }
    }

    pub(crate) fn color(self) -> Color {
        match self {
            Self::ServerError => Color::Red,
            Self::ClientError => Color::Yellow,
            Self::Redirection => Color::Magenta,
            Self::Success => Color::Green,
            Self::Other => Color::Cyan,
        }
    }
}

pub(crate) fn frame_style(highlighted: bool) -> Style {
    if highlighted {
        Style::new().red().bright().on_black()
    } else {
        Style::new().red().on_black()
    }
}

fn location_style() -> Style {
    Style::new().yellow().on_black()
}

fn body_style() -> Style {
    Style::new().black().bright().on_black()
}

fn plain_style() -> Style {
    Style::new().white().on_black()
}

// ── Renderer ──────────────────────────────────────────────────────────────────

enum Sink {
    Stdout,
    Writer(Mutex<Box<dyn Write + Send>>),
}

/// Writes trace records to one sink, one record at a time.
pub struct Renderer {
    sink: Sink,
    colors: bool,
    highlights: Highlights,
}

impl Renderer {
    pub fn stdout(colors: bool, highlights: Highlights) -> Self {
        Self { sink: Sink::Stdout, colors, highlights }
    }

    pub fn writer(writer: Box<dyn Write + Send>, colors: bool, highlights: Highlights) -> Self {
        Self { sink: Sink::Writer(Mutex::new(writer)), colors, highlights }
    }

    /// Writes one record as a single uninterrupted block.
    pub fn render(&self, record: &TraceRecord) -> io::Result<()> {
        match &self.sink {
            Sink::Stdout => {
                let mut out = io::stdout().lock();
                self.write_record(&mut out, record)?;
                out.flush()
            }
            Sink::Writer(writer) => {
                let mut out = writer.lock().unwrap_or_else(PoisonError::into_inner);
                self.write_record(&mut **out, record)?;
                out.flush()
            }
        }
    }

    fn write_record(&self, out: &mut dyn Write, record: &TraceRecord) -> io::Result<()> {
        self.write_summary(out, record)?;
        self.write_body(out, &record.body)?;
        if let Some(error) = &record.error {
            self.write_error(out, error)?;
        }
        Ok(())
    }

    fn write_summary(&self, out: &mut dyn Write, record: &TraceRecord) -> io::Result<()> {
        let timestamp = record.timestamp.format("[%H:%M:%S]");
        write!(out, "{}", self.paint(plain_style()).apply_to(format!("{timestamp} ")))?;

        let method = Style::new().black().bg(method_color(&record.method));
        write!(out, "{}", self.paint(method).apply_to(format!(" {:<7}", record.method.as_str())))?;

        write!(out, "{}", self.paint(plain_style()).apply_to(format!(" {:<50} ", record.path)))?;

        let (code, reason) = match record.status {
            Some(status) => (status.as_str().to_owned(), status.canonical_reason().unwrap_or("")),
            None => ("---".to_owned(), "No Response"),
        };
        let status = Style::new().fg(StatusClass::of(record.status).color()).on_black();
        write!(out, "{}", self.paint(status).apply_to(format!("{code} {reason:<20} ")))?;

        let millis = record.elapsed.as_millis();
        writeln!(out, "{}", self.paint(plain_style()).apply_to(format!("{millis:>6} ms")))
    }

    fn write_body(&self, out: &mut dyn Write, body: &BodyPreview) -> io::Result<()> {
        let line = match body {
            BodyPreview::None => return Ok(()),
            BodyPreview::Summary { content_type, length } => {
                format!("{content_type} body ({length} bytes)")
            }
            BodyPreview::Text(text) => text.clone(),
            BodyPreview::Truncated(head) => format!("{head} ..."),
        };
        writeln!(out, "{}", self.paint(body_style()).apply_to(line))
    }

    fn write_error(&self, out: &mut dyn Write, error: &CapturedError) -> io::Result<()> {
        let kind = Style::new().white().on_red();
        let message = Style::new().white().on_red().on_bright();
        writeln!(
            out,
            "{}{}",
            self.paint(kind).apply_to(format!("{}:", error.type_name)),
            self.paint(message).apply_to(format!(" {}", error.message)),
        )?;

        for line in error.stack_trace.lines() {
            let frame = self.paint(frame_style(self.highlights.matches(line)));
            match line.find(LOCATION_MARKER) {
                None => writeln!(out, "{}", frame.apply_to(line))?,
                Some(at) => {
                    writeln!(out, "{}", frame.apply_to(&line[..=at]))?;
                    let location = self.paint(location_style());
                    writeln!(out, "{}", location.apply_to(format!("\t{}", &line[at + 1..])))?;
                }
            }
        }
        Ok(())
    }

    fn paint(&self, style: Style) -> Style {
        style.force_styling(self.colors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use chrono::TimeZone;

    /// In-memory sink shared with the test body.
    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn renderer(colors: bool, highlights: &[&str]) -> (Renderer, Buffer) {
        let buffer = Buffer::default();
        let renderer = Renderer::writer(
            Box::new(buffer.clone()),
            colors,
            Highlights::new(highlights.iter().copied()),
        );
        (renderer, buffer)
    }

    fn record(method: Method, status: Option<StatusCode>) -> TraceRecord {
        TraceRecord {
            timestamp: Local.with_ymd_and_hms(2024, 3, 9, 14, 3, 27).unwrap(),
            method,
            path: "/orders".to_owned(),
            status,
            elapsed: Duration::from_millis(12),
            body: BodyPreview::None,
            error: None,
        }
    }

    fn captured(stack_trace: &str) -> CapturedError {
        CapturedError {
            type_name: "shop::orders::OutOfStock".to_owned(),
            message: "sku 17 unavailable".to_owned(),
            stack_trace: stack_trace.to_owned(),
        }
    }

    #[test]
    fn summary_line_has_fixed_columns() {
        let (renderer, buffer) = renderer(false, &[]);
        renderer.render(&record(Method::POST, Some(StatusCode::CREATED))).unwrap();

        let expected = format!(
            "[14:03:27]  {:<7} {:<50} {} {:<20} {:>6} ms\n",
            "POST", "/orders", 201, "Created", 12,
        );
        assert_eq!(buffer.text(), expected);
    }

    #[test]
    fn missing_response_renders_placeholder() {
        let (renderer, buffer) = renderer(false, &[]);
        renderer.render(&record(Method::GET, None)).unwrap();

        assert!(buffer.text().contains(" --- No Response          "));
    }

    #[test]
    fn status_buckets() {
        let class = |code: u16| StatusClass::of(Some(StatusCode::from_u16(code).unwrap()));

        assert_eq!(class(200), StatusClass::Success);
        assert_eq!(class(204), StatusClass::Success);
        assert_eq!(class(302), StatusClass::Redirection);
        assert_eq!(class(404), StatusClass::ClientError);
        assert_eq!(class(503), StatusClass::ServerError);
        assert_eq!(class(101), StatusClass::Other);
        assert_eq!(StatusClass::of(None), StatusClass::Other);

        assert!(matches!(StatusClass::ServerError.color(), Color::Red));
        assert!(matches!(StatusClass::ClientError.color(), Color::Yellow));
        assert!(matches!(StatusClass::Success.color(), Color::Green));
        assert!(matches!(StatusClass::Other.color(), Color::Cyan));
    }

    #[test]
    fn method_colors() {
        assert!(matches!(method_color(&Method::GET), Color::Green));
        assert!(matches!(method_color(&Method::POST), Color::Cyan));
        assert!(matches!(method_color(&Method::PUT), Color::Magenta));
        assert!(matches!(method_color(&Method::DELETE), Color::Red));
        assert!(matches!(method_color(&Method::PATCH), Color::Yellow));
    }

    #[test]
    fn colored_summary_uses_status_color() {
        let (renderer, buffer) = renderer(true, &[]);
        renderer.render(&record(Method::GET, Some(StatusCode::NOT_FOUND))).unwrap();

        let expected = Style::new()
            .fg(Color::Yellow)
            .on_black()
            .force_styling(true)
            .apply_to(format!("404 {:<20} ", "Not Found"))
            .to_string();
        assert!(buffer.text().contains(&expected));
    }

    #[test]
    fn body_preview_policy() {
        let long = "x".repeat(1500);
        assert_eq!(
            BodyPreview::build(Some("application/json"), Some(1500), &long, 1000),
            BodyPreview::Truncated("x".repeat(1000)),
        );
        assert_eq!(
            BodyPreview::build(Some("multipart/form-data"), Some(2048), "--boundary", 1000),
            BodyPreview::Summary { content_type: "multipart/form-data".to_owned(), length: 2048 },
        );
        assert_eq!(
            BodyPreview::build(Some("Application/JSON; charset=utf-8"), None, "{}", 1000),
            BodyPreview::Text("{}".to_owned()),
        );
        assert_eq!(BodyPreview::build(None, None, "plain", 1000), BodyPreview::Text("plain".to_owned()));
        assert_eq!(BodyPreview::build(None, None, "", 1000), BodyPreview::None);
        assert_eq!(
            BodyPreview::build(Some("text/plain"), None, "four", 1000),
            BodyPreview::Summary { content_type: "text/plain".to_owned(), length: 4 },
        );
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let text = "é".repeat(5);
        assert_eq!(BodyPreview::build(None, None, &text, 3), BodyPreview::Truncated("ééé".to_owned()));
        assert_eq!(BodyPreview::build(None, None, &text, 5), BodyPreview::Text(text.clone()));
    }

    #[test]
    fn body_lines() {
        let (renderer, buffer) = renderer(false, &[]);
        let mut rec = record(Method::POST, Some(StatusCode::OK));

        rec.body = BodyPreview::Truncated("abc".to_owned());
        renderer.render(&rec).unwrap();
        rec.body = BodyPreview::Summary { content_type: "multipart/form-data".to_owned(), length: 2048 };
        renderer.render(&rec).unwrap();

        let text = buffer.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "abc ...");
        assert_eq!(lines[3], "multipart/form-data body (2048 bytes)");
    }

    #[test]
    fn frames_split_at_location_marker() {
        let (renderer, buffer) = renderer(false, &[]);
        let mut rec = record(Method::GET, Some(StatusCode::INTERNAL_SERVER_ERROR));
        rec.error = Some(captured(
            "   at shop::orders::reserve in ./src/orders.rs:42:9\n   at tokio::runtime::poll",
        ));
        renderer.render(&rec).unwrap();

        let text = buffer.text();
        let lines: Vec<&str> = text.lines().skip(1).collect();
        assert_eq!(lines, [
            "shop::orders::OutOfStock: sku 17 unavailable",
            "   at shop::orders::reserve ",
            "\tin ./src/orders.rs:42:9",
            "   at tokio::runtime::poll",
        ]);
    }

    #[test]
    fn highlighted_frames_stand_out() {
        let (renderer, buffer) = renderer(true, &["shop::"]);
        let mut rec = record(Method::GET, None);
        rec.error = Some(captured("   at core::ops::call\n   at shop::handler\n   at tokio::poll"));
        renderer.render(&rec).unwrap();

        let styled = |line: &str, highlighted: bool| {
            frame_style(highlighted).force_styling(true).apply_to(line).to_string()
        };
        let text = buffer.text();

        assert!(text.contains(&styled("   at core::ops::call", false)));
        assert!(text.contains(&styled("   at shop::handler", true)));
        assert!(text.contains(&styled("   at tokio::poll", false)));
        assert!(!text.contains(&styled("   at shop::handler", false)));
        assert!(!text.contains(&styled("   at core::ops::call", true)));
    }

    #[test]
    fn colors_off_writes_no_escape_codes() {
        let (renderer, buffer) = renderer(false, &["shop::"]);
        let mut rec = record(Method::DELETE, Some(StatusCode::SERVICE_UNAVAILABLE));
        rec.body = BodyPreview::Text("{}".to_owned());
        rec.error = Some(captured("   at shop::handler in ./src/lib.rs:1:1"));
        renderer.render(&rec).unwrap();

        assert!(!buffer.text().contains('\u{1b}'));
    }

    #[test]
    fn stdout_records_wait_for_the_process_wide_lock() {
        use std::sync::mpsc;
        use std::thread;

        let renderer = Renderer::stdout(false, Highlights::default());
        let (done, finished) = mpsc::channel();

        let held = io::stdout().lock();
        let writer = thread::spawn(move || {
            let result = renderer.render(&record(Method::GET, Some(StatusCode::OK)));
            done.send(result.is_ok()).unwrap();
        });

        assert!(finished.recv_timeout(Duration::from_millis(100)).is_err());
        drop(held);

        assert!(finished.recv_timeout(Duration::from_secs(5)).unwrap());
        writer.join().unwrap();
    }
}
