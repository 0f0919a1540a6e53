//! Console sinks using crossterm
//!
//! Renders styled fragments to a terminal stream and shows status lines.

use std::io::{self, Write};

use crossterm::{
    queue,
    style::{Attribute, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
};

use crate::config::ColorScheme;
use crate::core::ansi::{ActiveStyleSet, StyleAttributes};
use crate::core::sink::{StatusSink, TextSink};

/// Replace control characters that would disturb the host terminal
fn printable(text: &str) -> String {
    text.chars()
        .map(|ch| match ch {
            '\n' | '\t' => ch.to_string(),
            '\x1b' => "^[".to_string(),
            c if c.is_control() => char::REPLACEMENT_CHARACTER.to_string(),
            c => c.to_string(),
        })
        .collect()
}

/// `TextSink` writing to a terminal stream
pub struct ConsoleSink<W: Write> {
    out: W,
    scheme: ColorScheme,
    /// Set after a failed write so the log is not flooded
    write_failed: bool,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout(scheme: ColorScheme) -> Self {
        Self::new(io::stdout(), scheme)
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W, scheme: ColorScheme) -> Self {
        Self {
            out,
            scheme,
            write_failed: false,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_styled(&mut self, text: &str, style: &ActiveStyleSet) -> io::Result<()> {
        if style.is_plain() {
            return queue!(self.out, Print(printable(text)));
        }

        if style.attrs.contains(StyleAttributes::BOLD) {
            queue!(self.out, SetAttribute(Attribute::Bold))?;
        }
        if style.attrs.contains(StyleAttributes::ITALIC) {
            queue!(self.out, SetAttribute(Attribute::Italic))?;
        }
        if style.attrs.contains(StyleAttributes::UNDERLINE) {
            queue!(self.out, SetAttribute(Attribute::Underlined))?;
        }
        if let Some(fg) = style.fg {
            queue!(self.out, SetForegroundColor(self.scheme.color(fg)))?;
        }
        if let Some(bg) = style.bg {
            queue!(self.out, SetBackgroundColor(self.scheme.color(bg)))?;
        }

        queue!(
            self.out,
            Print(printable(text)),
            SetAttribute(Attribute::Reset),
            ResetColor
        )
    }

    fn check(&mut self, result: io::Result<()>) {
        match result {
            Ok(()) => self.write_failed = false,
            Err(e) if !self.write_failed => {
                tracing::warn!("Console write failed: {}", e);
                self.write_failed = true;
            }
            Err(_) => {}
        }
    }
}

impl<W: Write> TextSink for ConsoleSink<W> {
    fn append_styled(&mut self, text: &str, style: &ActiveStyleSet) {
        let result = self.write_styled(text, style);
        self.check(result);
    }

    fn append_plain(&mut self, text: &str) {
        let result = queue!(self.out, Print(printable(text)));
        self.check(result);
    }

    /// A console is always at its end; this just flushes.
    fn scroll_to_end(&mut self) {
        let result = self.out.flush();
        self.check(result);
    }
}

/// `StatusSink` printing reverse-video status lines
pub struct ConsoleStatus<W: Write> {
    out: W,
}

impl ConsoleStatus<io::Stderr> {
    pub fn stderr() -> Self {
        Self { out: io::stderr() }
    }
}

impl<W: Write> ConsoleStatus<W> {
    #[allow(dead_code)]
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> StatusSink for ConsoleStatus<W> {
    fn set_status(&mut self, message: &str) {
        tracing::info!("Status: {}", message);
        let _ = queue!(
            self.out,
            Print("\n"),
            SetAttribute(Attribute::Reverse),
            Print(format!(" {} ", printable(message))),
            SetAttribute(Attribute::Reset),
            Print("\n")
        );
        let _ = self.out.flush();
    }
}
