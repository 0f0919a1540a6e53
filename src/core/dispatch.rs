//! Render dispatch
//!
//! Ordered handoff from a reader thread to the presentation thread. The
//! reader holds a `RenderDispatcher`; the presentation thread owns the
//! `FrameQueue` and is the only place frames reach a `TextSink`.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use thiserror::Error;

use super::format::DisplayFrame;
use super::sink::TextSink;

/// Message delivered to the presentation thread
#[derive(Debug)]
pub enum DispatchMessage {
    /// A formatted frame from session `session`
    Frame { session: u64, frame: DisplayFrame },
    /// The reader of session `session` hit an I/O error and stopped
    Disconnected { session: u64, reason: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("presentation queue has shut down")]
pub struct DispatchClosed;

/// Producer handle given to one reader thread
#[derive(Clone)]
pub struct RenderDispatcher {
    session: u64,
    tx: Sender<DispatchMessage>,
}

impl RenderDispatcher {
    /// Queue a frame for the presentation thread
    pub fn submit(&self, frame: DisplayFrame) -> Result<(), DispatchClosed> {
        self.tx
            .send(DispatchMessage::Frame {
                session: self.session,
                frame,
            })
            .map_err(|_| DispatchClosed)
    }

    /// Ask the presentation thread to close the connection
    pub fn report_disconnect(&self, reason: String) -> Result<(), DispatchClosed> {
        self.tx
            .send(DispatchMessage::Disconnected {
                session: self.session,
                reason,
            })
            .map_err(|_| DispatchClosed)
    }
}

/// Consumer end, owned by the presentation thread.
///
/// Messages come out in exactly the order they were submitted. The queue
/// is unbounded: a device that outpaces the display grows it.
pub struct FrameQueue {
    tx: Sender<DispatchMessage>,
    rx: Receiver<DispatchMessage>,
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    /// Create a producer handle for a session
    pub fn dispatcher(&self, session: u64) -> RenderDispatcher {
        RenderDispatcher {
            session,
            tx: self.tx.clone(),
        }
    }

    /// Wait up to `timeout` for the next message
    pub fn recv_timeout(&self, timeout: Duration) -> Option<DispatchMessage> {
        match self.rx.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Next message if one is already waiting
    pub fn try_recv(&self) -> Option<DispatchMessage> {
        match self.rx.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// Append a frame to the sink.
///
/// An empty text frame is a no-op; anything else ends with a scroll to the
/// new end of the display.
pub fn apply_frame(frame: &DisplayFrame, sink: &mut dyn TextSink) {
    if frame.is_empty() {
        return;
    }

    match frame {
        DisplayFrame::Text(fragments) => {
            for fragment in fragments {
                sink.append_styled(&fragment.text, &fragment.style);
            }
        }
        DisplayFrame::Hex(text) => sink.append_plain(text),
    }
    sink.scroll_to_end();
}
