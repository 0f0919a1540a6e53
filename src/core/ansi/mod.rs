//! ANSI escape sequence handling.
//!
//! - **style**: the session style state (`ActiveStyleSet`) and SGR code table
//! - **parser**: tokenizer and `EscapeParser` turning text into styled fragments

mod parser;
mod style;

pub use parser::{EscapeParser, RenderFragment};
pub use style::{ActiveStyleSet, NamedColor, StyleAttributes};
