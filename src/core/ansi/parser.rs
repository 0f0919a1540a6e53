//! Control sequence tokenizer and SGR interpreter
//!
//! Splits decoded text on `ESC [ params letter` sequences and tracks the
//! style those sequences select. Only SGR (`m`) changes style; every other
//! final letter is consumed silently.

use super::style::ActiveStyleSet;

const ESC: u8 = 0x1B;

/// A piece of tokenized input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Text between control sequences
    Literal(&'a str),
    /// SGR sequence with its parameter codes (empty list means reset)
    StyleChange(Vec<u16>),
    /// Any other complete CSI sequence; recognized and discarded
    Control { params: Vec<u16>, final_byte: char },
}

/// Text plus the style that was active when it appeared in the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFragment {
    pub text: String,
    pub style: ActiveStyleSet,
}

impl RenderFragment {
    pub fn new(text: impl Into<String>, style: ActiveStyleSet) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, ActiveStyleSet::default())
    }
}

#[derive(Clone, Copy, PartialEq)]
enum ScanState {
    Escape,
    CsiParam,
}

/// Iterator over the tokens of one input string.
///
/// An `ESC` that does not start a complete sequence is ordinary literal
/// text, including a sequence cut off by the end of the input.
pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Try to match a full control sequence whose ESC is at `at`.
    /// Returns the index just past the final letter and the token.
    fn match_sequence(&self, at: usize) -> Option<(usize, Token<'a>)> {
        let bytes = self.input.as_bytes();
        let mut state = ScanState::Escape;
        let mut params: Vec<u16> = Vec::new();
        let mut current: Option<u16> = None;
        let mut idx = at + 1;

        loop {
            let byte = *bytes.get(idx)?;
            match state {
                ScanState::Escape => {
                    if byte != b'[' {
                        return None;
                    }
                    state = ScanState::CsiParam;
                }
                ScanState::CsiParam => match byte {
                    b'0'..=b'9' => {
                        let digit = (byte - b'0') as u16;
                        current = Some(current.unwrap_or(0).saturating_mul(10).saturating_add(digit));
                    }
                    b';' => {
                        params.push(current.take().unwrap_or(0));
                    }
                    b'A'..=b'Z' | b'a'..=b'z' => {
                        if current.is_some() || !params.is_empty() {
                            params.push(current.unwrap_or(0));
                        }
                        let token = if byte == b'm' {
                            Token::StyleChange(params)
                        } else {
                            Token::Control {
                                params,
                                final_byte: byte as char,
                            }
                        };
                        return Some((idx + 1, token));
                    }
                    _ => return None,
                },
            }
            idx += 1;
        }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let bytes = self.input.as_bytes();
        let start = self.pos;
        if start >= bytes.len() {
            return None;
        }

        let mut idx = start;
        while idx < bytes.len() {
            if bytes[idx] == ESC {
                if let Some((end, token)) = self.match_sequence(idx) {
                    if idx > start {
                        // Emit the preceding text first; the sequence is
                        // matched again on the next call.
                        self.pos = idx;
                        return Some(Token::Literal(&self.input[start..idx]));
                    }
                    self.pos = end;
                    return Some(token);
                }
            }
            idx += 1;
        }

        self.pos = bytes.len();
        Some(Token::Literal(&self.input[start..]))
    }
}

/// Escape sequence interpreter with session-scoped style state.
///
/// One parser belongs to one display session. The style left over at the
/// end of a call carries into the next one; it is only cleared by an SGR
/// reset or by dropping the parser.
#[derive(Debug, Default)]
pub struct EscapeParser {
    style: ActiveStyleSet,
}

impl EscapeParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Style that the next call will start from
    pub fn style(&self) -> ActiveStyleSet {
        self.style
    }

    /// Parse `input` into styled fragments
    #[allow(dead_code)]
    pub fn parse(&mut self, input: &str) -> Vec<RenderFragment> {
        let mut fragments = Vec::new();
        self.parse_into(input, &mut fragments);
        fragments
    }

    /// Parse `input`, appending fragments to `out`
    pub fn parse_into(&mut self, input: &str, out: &mut Vec<RenderFragment>) {
        for token in Tokenizer::new(input) {
            match token {
                Token::Literal(text) => {
                    if !text.is_empty() {
                        out.push(RenderFragment::new(text, self.style));
                    }
                }
                Token::StyleChange(params) => self.execute_sgr(&params),
                Token::Control { params, final_byte } => {
                    tracing::trace!("Ignoring CSI: params={:?}, final={:?}", params, final_byte);
                }
            }
        }
    }

    fn execute_sgr(&mut self, params: &[u16]) {
        if params.is_empty() {
            self.style.reset();
            return;
        }

        let mut iter = params.iter();
        while let Some(&param) = iter.next() {
            match param {
                // Extended colors are not rendered, but their arguments
                // must not be read as codes of their own
                38 | 48 => match iter.next().copied() {
                    Some(5) => {
                        iter.next();
                    }
                    Some(2) => {
                        iter.by_ref().take(3).for_each(drop);
                    }
                    _ => {}
                },
                _ => self.style.apply_sgr(param),
            }
        }
    }
}
