//! Core display pipeline.
//!
//! - **ansi**: escape sequence tokenizer and session style state
//! - **format**: raw chunk to `DisplayFrame` (text or hex, timestamps, line filtering)
//! - **dispatch**: ordered handoff of frames to the presentation thread
//! - **port**: serial device interfaces and the `serialport` backend
//! - **session**: connection lifecycle and the reader thread
//! - **sink**: traits the presentation side implements
//!
//! # Data flow
//!
//! ```text
//! device ─▶ reader thread ─▶ FrameFormatter ─▶ EscapeParser
//!                                  │
//!                                  ▼
//!                          RenderDispatcher ══▶ FrameQueue ─▶ TextSink
//!                          (reader thread)      (presentation thread)
//! ```

pub mod ansi;
pub mod dispatch;
pub mod format;
pub mod port;
pub mod session;
pub mod sink;
