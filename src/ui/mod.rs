//! Console front end.
//!
//! - **console**: `TextSink`/`StatusSink` implementations writing to the terminal
//! - **input**: Typed-line parsing, `:` commands and outbound encoding

pub mod console;
pub mod input;
