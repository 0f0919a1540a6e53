//! Frame formatting
//!
//! Turns one raw chunk read from the device into something the display
//! can append: styled text fragments, or a flat hex dump.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use chrono::{Local, Timelike};
use tracing::Span;

use super::ansi::{EscapeParser, RenderFragment};

/// Name given to every reader thread
pub const READER_THREAD_NAME: &str = "serial-reader";

/// Send panics raised on reader threads to the log instead of stderr.
///
/// `format_guarded` recovers from them, but the default hook would still
/// print the report onto the console the display is drawn on. Panics on
/// any other thread go to the previous hook.
pub fn install_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if thread::current().name() == Some(READER_THREAD_NAME) {
            tracing::error!("Reader panicked: {}", info);
        } else {
            previous(info);
        }
    }));
}

/// One renderable unit derived from a single read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayFrame {
    /// Styled text, in stream order
    Text(Vec<RenderFragment>),
    /// Hex dump, never interpreted as control sequences
    Hex(String),
}

impl DisplayFrame {
    pub fn is_empty(&self) -> bool {
        match self {
            DisplayFrame::Text(fragments) => fragments.is_empty(),
            DisplayFrame::Hex(text) => text.is_empty(),
        }
    }
}

/// Wall-clock time of day with millisecond precision.
///
/// Displays as `[HH:MM:SS.mmm] ` (trailing space included).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub millis: u16,
}

impl Timestamp {
    /// Current local wall-clock time
    pub fn now() -> Self {
        Self::from_time(&Local::now())
    }

    pub fn from_time(time: &impl Timelike) -> Self {
        Self {
            hours: time.hour() as u8,
            minutes: time.minute() as u8,
            seconds: time.second() as u8,
            // A leap second reports 1000+ here
            millis: (time.nanosecond() / 1_000_000).min(999) as u16,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:02}:{:02}:{:02}.{:03}] ",
            self.hours, self.minutes, self.seconds, self.millis
        )
    }
}

/// Render bytes as lowercase hex pairs separated by single spaces
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Formats raw chunks for one display session.
///
/// Owns the session's `EscapeParser`, so style carries from one chunk to
/// the next for as long as the formatter lives.
pub struct FrameFormatter {
    parser: EscapeParser,
    clock: fn() -> Timestamp,
    span: Span,
}

impl FrameFormatter {
    pub fn new(span: Span) -> Self {
        Self {
            parser: EscapeParser::new(),
            clock: Timestamp::now,
            span,
        }
    }

    /// Replace the time source (used for deterministic output)
    pub fn with_clock(mut self, clock: fn() -> Timestamp) -> Self {
        self.clock = clock;
        self
    }

    #[cfg(test)]
    pub fn parser(&self) -> &EscapeParser {
        &self.parser
    }

    /// Format a chunk, converting any failure into an inline error message
    /// so the caller's loop keeps running.
    pub fn format_guarded(&mut self, chunk: &[u8], timestamps: bool, hex_mode: bool) -> DisplayFrame {
        match panic::catch_unwind(AssertUnwindSafe(|| self.format(chunk, timestamps, hex_mode))) {
            Ok(frame) => frame,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown error".to_string());
                tracing::error!(parent: &self.span, "Failed to format {} bytes: {}", chunk.len(), message);
                DisplayFrame::Text(vec![RenderFragment::plain(format!(
                    "[Error displaying data: {}]",
                    message
                ))])
            }
        }
    }

    /// Format a chunk read from the device
    pub fn format(&mut self, chunk: &[u8], timestamps: bool, hex_mode: bool) -> DisplayFrame {
        let stamp = timestamps.then(|| (self.clock)().to_string());

        if hex_mode {
            let mut text = stamp.unwrap_or_default();
            text.push_str(&hex_dump(chunk));
            return DisplayFrame::Hex(text);
        }

        let decoded = String::from_utf8_lossy(chunk);
        let text = decoded.replace('\r', "");
        let lines: Vec<&str> = text
            .split('\n')
            .filter(|line| !line.trim().is_empty())
            .collect();

        let last = lines.len().saturating_sub(1);
        let mut fragments = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            let mut rendered = String::with_capacity(line.len() + 16);
            if let Some(stamp) = &stamp {
                rendered.push_str(stamp);
            }
            rendered.push_str(line);
            if i < last {
                rendered.push('\n');
            }
            self.parser.parse_into(&rendered, &mut fragments);
        }

        DisplayFrame::Text(fragments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ansi::{ActiveStyleSet, NamedColor};

    fn fixed_clock() -> Timestamp {
        Timestamp {
            hours: 13,
            minutes: 5,
            seconds: 9,
            millis: 42,
        }
    }

    fn formatter() -> FrameFormatter {
        FrameFormatter::new(Span::none()).with_clock(fixed_clock)
    }

    fn texts(frame: &DisplayFrame) -> Vec<&str> {
        match frame {
            DisplayFrame::Text(fragments) => fragments.iter().map(|f| f.text.as_str()).collect(),
            DisplayFrame::Hex(_) => panic!("expected text frame"),
        }
    }

    #[test]
    fn test_hex_mode() {
        let frame = formatter().format(&[0x00, 0x01, 0xFF], false, true);
        assert_eq!(frame, DisplayFrame::Hex("00 01 ff".to_string()));
    }

    #[test]
    fn test_hex_mode_timestamp_once() {
        let frame = formatter().format(b"\x1b[31m", true, true);
        assert_eq!(frame, DisplayFrame::Hex("[13:05:09.042] 1b 5b 33 31 6d".to_string()));
    }

    #[test]
    fn test_hex_mode_bypasses_parser() {
        let mut fmt = formatter();
        fmt.format(b"\x1b[32m", false, true);
        assert!(fmt.parser().style().is_plain());
    }

    #[test]
    fn test_blank_lines_dropped() {
        let frame = formatter().format(b"a\n\nb\n", false, false);
        assert_eq!(texts(&frame), vec!["a\n", "b"]);
    }

    #[test]
    fn test_carriage_returns_stripped() {
        let frame = formatter().format(b"one\r\ntwo\r\n", false, false);
        assert_eq!(texts(&frame), vec!["one\n", "two"]);
    }

    #[test]
    fn test_whitespace_only_lines_dropped() {
        let frame = formatter().format(b"  \t\nx\n   \n", false, false);
        assert_eq!(texts(&frame), vec!["x"]);
    }

    #[test]
    fn test_only_blank_content_gives_empty_frame() {
        let frame = formatter().format(b"\r\n\r\n  \n", false, false);
        assert_eq!(frame, DisplayFrame::Text(Vec::new()));
        assert!(frame.is_empty());
    }

    #[test]
    fn test_timestamp_per_line() {
        let frame = formatter().format(b"boot\nready", true, false);
        assert_eq!(
            texts(&frame),
            vec!["[13:05:09.042] boot\n", "[13:05:09.042] ready"]
        );
    }

    #[test]
    fn test_style_carries_between_chunks() {
        let mut fmt = formatter();
        fmt.format(b"\x1b[35mlevel=", false, false);
        let frame = fmt.format(b"debug", false, false);
        let magenta = ActiveStyleSet::default().with_fg(NamedColor::Magenta);
        assert_eq!(frame, DisplayFrame::Text(vec![RenderFragment::new("debug", magenta)]));
    }

    #[test]
    fn test_invalid_utf8_replaced() {
        let frame = formatter().format(&[b'o', b'k', 0xC3, 0x28], false, false);
        assert_eq!(texts(&frame), vec!["ok\u{FFFD}("]);
    }

    #[test]
    fn test_guarded_reports_panics() {
        fn broken_clock() -> Timestamp {
            panic!("clock unavailable")
        }
        let mut fmt = FrameFormatter::new(Span::none()).with_clock(broken_clock);
        let frame = fmt.format_guarded(b"data", true, false);
        assert_eq!(
            frame,
            DisplayFrame::Text(vec![RenderFragment::plain(
                "[Error displaying data: clock unavailable]"
            )])
        );
        // Still usable afterwards
        assert_eq!(texts(&fmt.format_guarded(b"data", false, false)), vec!["data"]);
    }

    #[test]
    fn test_reader_panics_are_logged() {
        use std::io;
        use std::sync::{Arc, Mutex};

        #[derive(Clone)]
        struct Capture(Arc<Mutex<Vec<u8>>>);

        impl io::Write for Capture {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        fn broken_clock() -> Timestamp {
            panic!("rtc offline")
        }

        install_panic_hook();

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let capture = Capture(buffer.clone());
        let frame = thread::Builder::new()
            .name(READER_THREAD_NAME.to_string())
            .spawn(move || {
                let subscriber = tracing_subscriber::fmt()
                    .with_writer(move || capture.clone())
                    .with_ansi(false)
                    .finish();
                tracing::subscriber::with_default(subscriber, || {
                    let mut fmt = FrameFormatter::new(Span::none()).with_clock(broken_clock);
                    fmt.format_guarded(b"x", true, false)
                })
            })
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(
            frame,
            DisplayFrame::Text(vec![RenderFragment::plain("[Error displaying data: rtc offline]")])
        );
        let logged = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("Reader panicked"));
        assert!(logged.contains("rtc offline"));
    }

    #[test]
    fn test_timestamp_from_time() {
        let time = chrono::NaiveTime::from_hms_milli_opt(1, 2, 3, 4).unwrap();
        assert_eq!(Timestamp::from_time(&time).to_string(), "[01:02:03.004] ");

        let leap = chrono::NaiveTime::from_hms_milli_opt(23, 59, 59, 1500).unwrap();
        assert_eq!(Timestamp::from_time(&leap).to_string(), "[23:59:59.999] ");
    }

    #[test]
    fn test_now_matches_local_clock() {
        let before = Local::now();
        let ts = Timestamp::now();
        let after = Local::now();
        assert!(ts.hours == before.hour() as u8 || ts.hours == after.hour() as u8);
    }
}
