//! Presentation-side interfaces
//!
//! The core never touches a display directly. It talks to these traits,
//! and only from the presentation thread.

use super::ansi::ActiveStyleSet;

/// Scrolling text display
pub trait TextSink {
    /// Append text drawn with `style`
    fn append_styled(&mut self, text: &str, style: &ActiveStyleSet);
    /// Append unstyled text
    fn append_plain(&mut self, text: &str);
    /// Bring the end of the display into view
    fn scroll_to_end(&mut self);
}

/// One-line status display
pub trait StatusSink {
    fn set_status(&mut self, message: &str);
}

#[cfg(test)]
pub mod testing {
    //! Recording sinks for tests

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SinkCall {
        Styled(String, ActiveStyleSet),
        Plain(String),
        ScrollToEnd,
    }

    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub calls: Vec<SinkCall>,
    }

    impl RecordingSink {
        /// All appended text, styles ignored
        pub fn text(&self) -> String {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    SinkCall::Styled(t, _) | SinkCall::Plain(t) => Some(t.as_str()),
                    SinkCall::ScrollToEnd => None,
                })
                .collect()
        }
    }

    impl TextSink for RecordingSink {
        fn append_styled(&mut self, text: &str, style: &ActiveStyleSet) {
            self.calls.push(SinkCall::Styled(text.to_string(), *style));
        }

        fn append_plain(&mut self, text: &str) {
            self.calls.push(SinkCall::Plain(text.to_string()));
        }

        fn scroll_to_end(&mut self) {
            self.calls.push(SinkCall::ScrollToEnd);
        }
    }

    #[derive(Debug, Default)]
    pub struct RecordingStatus {
        pub messages: Vec<String>,
    }

    impl RecordingStatus {
        pub fn last(&self) -> Option<&str> {
            self.messages.last().map(String::as_str)
        }
    }

    impl StatusSink for RecordingStatus {
        fn set_status(&mut self, message: &str) {
            self.messages.push(message.to_string());
        }
    }
}
