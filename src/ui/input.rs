//! User input handling
//!
//! Turns lines typed by the user into either console commands or bytes to
//! send to the device.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum InputError {
    #[error("hex length must be even")]
    OddHexLength,

    #[error("contains non-hex character in {0:?}")]
    InvalidHex(String),
}

/// How outbound lines are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendFormat {
    #[default]
    Ascii,
    Hex,
}

/// Bytes appended to every outbound line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    Lf,
    Cr,
    CrLf,
    None,
}

impl LineEnding {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            LineEnding::Lf => b"\n",
            LineEnding::Cr => b"\r",
            LineEnding::CrLf => b"\r\n",
            LineEnding::None => b"",
        }
    }
}

/// Parse hex text such as `"de ad be ef"` or `"DEADBEEF"`
pub fn parse_hex_bytes(input: &str) -> Result<Vec<u8>, InputError> {
    let compact: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.len() % 2 != 0 {
        return Err(InputError::OddHexLength);
    }

    compact
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| InputError::InvalidHex(String::from_utf8_lossy(pair).into_owned()))
        })
        .collect()
}

/// Bytes to write for one line of user input
pub fn encode_outbound(line: &str, format: SendFormat, ending: LineEnding) -> Result<Vec<u8>, InputError> {
    let mut bytes = match format {
        SendFormat::Ascii => line.as_bytes().to_vec(),
        SendFormat::Hex => parse_hex_bytes(line)?,
    };
    bytes.extend_from_slice(ending.as_bytes());
    Ok(bytes)
}

/// Console commands, entered as `:name args`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect { port: Option<String>, baud: Option<String> },
    Disconnect,
    Ports,
    Hex(bool),
    Timestamps(bool),
    SendFormat(SendFormat),
    Help,
    Quit,
}

/// What a line of input asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(Command),
    Send(String),
    Invalid(String),
}

fn parse_switch(arg: Option<&str>) -> Option<bool> {
    match arg? {
        "on" | "1" | "true" => Some(true),
        "off" | "0" | "false" => Some(false),
        _ => None,
    }
}

/// Classify one line typed by the user.
///
/// A leading `::` escapes a literal colon so it can be sent.
pub fn parse_input(line: &str) -> Input {
    if let Some(rest) = line.strip_prefix("::") {
        return Input::Send(format!(":{}", rest));
    }
    let Some(rest) = line.strip_prefix(':') else {
        return Input::Send(line.to_string());
    };

    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or("");
    let arg = words.next();

    let command = match name {
        "connect" | "c" => Some(Command::Connect {
            port: arg.map(str::to_string),
            baud: words.next().map(str::to_string),
        }),
        "disconnect" | "d" => Some(Command::Disconnect),
        "ports" => Some(Command::Ports),
        "hex" => parse_switch(arg).map(Command::Hex),
        "ts" | "timestamps" => parse_switch(arg).map(Command::Timestamps),
        "send-format" => match arg {
            Some("ascii") => Some(Command::SendFormat(SendFormat::Ascii)),
            Some("hex") => Some(Command::SendFormat(SendFormat::Hex)),
            _ => None,
        },
        "help" | "h" | "?" => Some(Command::Help),
        "quit" | "q" | "exit" => Some(Command::Quit),
        _ => None,
    };

    match command {
        Some(command) => Input::Command(command),
        None => Input::Invalid(line.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_bytes() {
        assert_eq!(parse_hex_bytes("de ad BE ef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(parse_hex_bytes("0102").unwrap(), vec![0x01, 0x02]);
        assert_eq!(parse_hex_bytes("   ").unwrap(), Vec::<u8>::new());
        assert_eq!(parse_hex_bytes("abc"), Err(InputError::OddHexLength));
        assert_eq!(parse_hex_bytes("zz"), Err(InputError::InvalidHex("zz".to_string())));
    }

    #[test]
    fn test_encode_outbound() {
        assert_eq!(
            encode_outbound("AT", SendFormat::Ascii, LineEnding::CrLf).unwrap(),
            b"AT\r\n".to_vec()
        );
        assert_eq!(
            encode_outbound("ff 00", SendFormat::Hex, LineEnding::None).unwrap(),
            vec![0xff, 0x00]
        );
        assert!(encode_outbound("f", SendFormat::Hex, LineEnding::Lf).is_err());
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_input(":connect /dev/ttyACM0 9600"),
            Input::Command(Command::Connect {
                port: Some("/dev/ttyACM0".to_string()),
                baud: Some("9600".to_string()),
            })
        );
        assert_eq!(parse_input(":hex on"), Input::Command(Command::Hex(true)));
        assert_eq!(parse_input(":ts off"), Input::Command(Command::Timestamps(false)));
        assert_eq!(parse_input(":q"), Input::Command(Command::Quit));
        assert_eq!(parse_input(":hex maybe"), Input::Invalid(":hex maybe".to_string()));
    }

    #[test]
    fn test_plain_lines_are_sent() {
        assert_eq!(parse_input("reboot"), Input::Send("reboot".to_string()));
        assert_eq!(parse_input("::raw"), Input::Send(":raw".to_string()));
        assert_eq!(parse_input(""), Input::Send(String::new()));
    }
}
