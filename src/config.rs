//! Configuration and color scheme management for serterm.
//!
//! This module provides:
//! - TOML configuration file loading from `~/.serterm/config.toml`
//! - Built-in color schemes mapping the eight ANSI color names to terminal colors
//!
//! # Configuration File
//!
//! ```toml
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! log_level = "info"
//!
//! [display]
//! timestamps = true
//! hex_mode = false
//! color_scheme = "tokyo-night"
//!
//! [send]
//! format = "ascii"     # ascii | hex
//! line_ending = "crlf" # lf | cr | crlf | none
//!
//! [serial]
//! read_timeout_ms = 1000
//! poll_interval_ms = 100
//! close_timeout_ms = 1000
//! ```
//!
//! # Available Color Schemes
//!
//! - `default` - The terminal's own ANSI colors
//! - `solarized-dark` - Ethan Schoonover's Solarized
//! - `gruvbox-dark` - Retro groove colors
//! - `tokyo-night` - VS Code Tokyo Night theme

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::ansi::NamedColor;
use crate::core::port::DEFAULT_BAUD_RATE;
use crate::core::session::Timing;
use crate::ui::input::{LineEnding, SendFormat};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write config: {0}")]
    Write(#[source] std::io::Error),
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port to open at startup
    pub port: Option<String>,
    pub baud_rate: u32,
    /// Log filter directive, overridden by `RUST_LOG`
    pub log_level: String,
    pub display: DisplayConfig,
    pub send: SendConfig,
    pub serial: SerialConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            log_level: "info".to_string(),
            display: DisplayConfig::default(),
            send: SendConfig::default(),
            serial: SerialConfig::default(),
        }
    }
}

/// Display settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub timestamps: bool,
    pub hex_mode: bool,
    pub color_scheme: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timestamps: false,
            hex_mode: false,
            color_scheme: "default".to_string(),
        }
    }
}

/// Outbound settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendConfig {
    pub format: SendFormat,
    pub line_ending: LineEnding,
}

/// Device timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub read_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub close_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 1000,
            poll_interval_ms: 100,
            close_timeout_ms: 1000,
        }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn timing(&self) -> Timing {
        Timing {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            close_timeout: Duration::from_millis(self.close_timeout_ms),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Falls back to defaults if the file is missing or broken; a broken
    /// file's error is returned alongside so the caller can report it once
    /// logging is up.
    pub fn load() -> (Self, Option<ConfigError>) {
        match Self::get_config_path() {
            Some(path) => Self::load_or_default(&path),
            None => (Self::default(), None),
        }
    }

    pub fn load_or_default(path: &Path) -> (Self, Option<ConfigError>) {
        if !path.exists() {
            return (Self::default(), None);
        }
        match Self::load_from(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(ConfigError::Read)?;
        Ok(toml::from_str(&content)?)
    }

    #[allow(dead_code)]
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(ConfigError::Write)
    }

    /// `~/.serterm`, created on demand
    pub fn config_dir() -> Option<PathBuf> {
        let dir = home_dir()?.join(".serterm");
        if !dir.exists() {
            let _ = fs::create_dir_all(&dir);
        }
        Some(dir)
    }

    fn get_config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn get_color_scheme(&self) -> ColorScheme {
        ColorScheme::by_name(&self.display.color_scheme)
    }
}

/// Color definition (RGB)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_crossterm(&self) -> crossterm::style::Color {
        crossterm::style::Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

/// Maps the eight ANSI color names to concrete colors.
///
/// `palette` is `None` for the terminal's own palette; otherwise it holds
/// RGB values in `NamedColor::ALL` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorScheme {
    pub name: String,
    pub palette: Option<[Color; 8]>,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self::default_scheme()
    }
}

impl ColorScheme {
    /// Use the terminal's ANSI colors
    pub fn default_scheme() -> Self {
        Self {
            name: "default".to_string(),
            palette: None,
        }
    }

    /// Solarized Dark scheme
    pub fn solarized_dark() -> Self {
        Self {
            name: "solarized-dark".to_string(),
            palette: Some([
                Color::new(7, 54, 66),
                Color::new(220, 50, 47),
                Color::new(133, 153, 0),
                Color::new(181, 137, 0),
                Color::new(38, 139, 210),
                Color::new(211, 54, 130),
                Color::new(42, 161, 152),
                Color::new(238, 232, 213),
            ]),
        }
    }

    /// Gruvbox Dark scheme
    pub fn gruvbox_dark() -> Self {
        Self {
            name: "gruvbox-dark".to_string(),
            palette: Some([
                Color::new(40, 40, 40),
                Color::new(204, 36, 29),
                Color::new(152, 151, 26),
                Color::new(215, 153, 33),
                Color::new(69, 133, 136),
                Color::new(177, 98, 134),
                Color::new(104, 157, 106),
                Color::new(235, 219, 178),
            ]),
        }
    }

    /// Tokyo Night scheme
    pub fn tokyo_night() -> Self {
        Self {
            name: "tokyo-night".to_string(),
            palette: Some([
                Color::new(21, 22, 30),
                Color::new(247, 118, 142),
                Color::new(158, 206, 106),
                Color::new(224, 175, 104),
                Color::new(122, 162, 247),
                Color::new(187, 154, 247),
                Color::new(125, 207, 255),
                Color::new(192, 202, 245),
            ]),
        }
    }

    /// Get scheme by name
    pub fn by_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "solarized-dark" | "solarized_dark" => Self::solarized_dark(),
            "gruvbox-dark" | "gruvbox_dark" | "gruvbox" => Self::gruvbox_dark(),
            "tokyo-night" | "tokyo_night" | "tokyonight" => Self::tokyo_night(),
            _ => Self::default_scheme(),
        }
    }

    /// List available schemes
    pub fn list() -> Vec<&'static str> {
        vec!["default", "solarized-dark", "gruvbox-dark", "tokyo-night"]
    }

    /// Terminal color for a named color
    pub fn color(&self, named: NamedColor) -> crossterm::style::Color {
        use crossterm::style::Color as Term;

        if let Some(palette) = &self.palette {
            let idx = NamedColor::ALL.iter().position(|c| *c == named).unwrap_or(0);
            return palette[idx].to_crossterm();
        }

        match named {
            NamedColor::Black => Term::Black,
            NamedColor::Red => Term::DarkRed,
            NamedColor::Green => Term::DarkGreen,
            NamedColor::Yellow => Term::DarkYellow,
            NamedColor::Blue => Term::DarkBlue,
            NamedColor::Magenta => Term::DarkMagenta,
            NamedColor::Cyan => Term::DarkCyan,
            NamedColor::White => Term::Grey,
        }
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            port = "COM4"

            [display]
            timestamps = true

            [send]
            line_ending = "crlf"
            "#,
        )
        .unwrap();

        assert_eq!(config.port.as_deref(), Some("COM4"));
        assert_eq!(config.baud_rate, 115200);
        assert!(config.display.timestamps);
        assert!(!config.display.hex_mode);
        assert_eq!(config.send.line_ending, LineEnding::CrLf);
        assert_eq!(config.send.format, SendFormat::Ascii);
        assert_eq!(config.serial, SerialConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.port = Some("/dev/ttyUSB1".to_string());
        config.display.color_scheme = "nord".to_string();
        config.send.format = SendFormat::Hex;
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_broken_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "baud_rate = \"fast\"").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_or_default_reports_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let (config, error) = Config::load_or_default(&path);
        assert_eq!(config, Config::default());
        assert!(error.is_none());

        fs::write(&path, "[display\ntimestamps = true").unwrap();
        let (config, error) = Config::load_or_default(&path);
        assert_eq!(config, Config::default());
        assert!(matches!(error, Some(ConfigError::Parse(_))));
    }

    #[test]
    fn test_timing_from_config() {
        let serial = SerialConfig {
            read_timeout_ms: 250,
            poll_interval_ms: 5,
            close_timeout_ms: 2000,
        };
        let timing = serial.timing();
        assert_eq!(timing.poll_interval, Duration::from_millis(5));
        assert_eq!(timing.close_timeout, Duration::from_secs(2));
        assert_eq!(serial.read_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_scheme_lookup() {
        assert_eq!(ColorScheme::by_name("Tokyo-Night").name, "tokyo-night");
        assert_eq!(ColorScheme::by_name("unknown").name, "default");
        assert_eq!(
            ColorScheme::default().color(NamedColor::Red),
            crossterm::style::Color::DarkRed
        );
        assert_eq!(
            ColorScheme::gruvbox_dark().color(NamedColor::White),
            crossterm::style::Color::Rgb { r: 235, g: 219, b: 178 }
        );
    }
}
