//! serterm - A serial terminal for the command line
//!
//! serterm opens a serial port, renders what the device sends with its ANSI
//! colors intact, and sends typed lines back to the device.
//!
//! # Features
//!
//! - **ANSI Styling**: Bold, italic, underline and the eight named colors
//! - **Timestamps**: Optional `[HH:MM:SS.mmm]` prefix on every line
//! - **Hex Display**: Raw bytes as hex pairs, escape sequences untouched
//! - **Hex Send**: Type `01 02 ff` to send raw bytes
//! - **Color Schemes**: Built-in palettes for the named colors
//!
//! # Quick Start
//!
//! ```text
//! serterm -l                       # List serial ports
//! serterm -p /dev/ttyUSB0          # Open a port at 115200 baud
//! serterm -p COM3 -b 9600 -t       # 9600 baud with timestamps
//! ```
//!
//! Inside the terminal, lines starting with `:` are commands; type `:help`.

mod app;
mod config;
mod core;
mod ui;

use std::env;
use std::io::{self, BufRead};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::app::App;
use crate::config::{ColorScheme, Config};
use crate::core::format;
use crate::core::port::{self, SerialConnector, BAUD_PRESETS};
use crate::core::session::{Connection, DisplayOptions};
use crate::ui::console::{ConsoleSink, ConsoleStatus};
use crate::ui::input::SendFormat;

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Command line overrides applied on top of config.toml
#[derive(Default)]
struct Args {
    port: Option<String>,
    baud_rate: Option<u32>,
    timestamps: bool,
    hex_mode: bool,
    send_hex: bool,
    list_ports: bool,
}

fn print_version() {
    eprintln!("serterm {}", VERSION);
}

fn print_help() {
    let presets: Vec<String> = BAUD_PRESETS.iter().map(|b| b.to_string()).collect();

    eprintln!("serterm {} - A serial terminal for the command line", VERSION);
    eprintln!();
    eprintln!("Usage: serterm [OPTIONS]");
    eprintln!();
    eprintln!("Connection options:");
    eprintln!("  -p, --port <PORT>     Serial port to open at startup");
    eprintln!("  -b, --baud <RATE>     Baud rate (common: {})", presets.join(", "));
    eprintln!("  -l, --list            List serial ports and exit");
    eprintln!();
    eprintln!("Display options:");
    eprintln!("  -t, --timestamps      Prefix each line with the time of arrival");
    eprintln!("  -x, --hex             Show received bytes as hex");
    eprintln!();
    eprintln!("Send options:");
    eprintln!("  --send-hex            Interpret typed lines as hex bytes");
    eprintln!();
    eprintln!("Other options:");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprint!("{}", app::HELP);
    eprintln!();
    eprintln!("Configuration: ~/.serterm/config.toml");
    eprintln!("Log file:      ~/.serterm/serterm.log (filter with RUST_LOG)");
    eprintln!();
    eprintln!("Color schemes: {}", ColorScheme::list().join(", "));
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-p" | "--port" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing port argument".to_string());
                }
                parsed.port = Some(args[i].clone());
            }
            "-b" | "--baud" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing baud rate argument".to_string());
                }
                let rate = port::parse_baud_rate(&args[i])
                    .map_err(|_| format!("Invalid baud rate: {}", args[i]))?;
                parsed.baud_rate = Some(rate);
            }
            "-t" | "--timestamps" => parsed.timestamps = true,
            "-x" | "--hex" => parsed.hex_mode = true,
            "--send-hex" => parsed.send_hex = true,
            "-l" | "--list" => parsed.list_ports = true,
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(parsed)
}

fn apply_args(config: &mut Config, args: &Args) {
    if let Some(port) = &args.port {
        config.port = Some(port.clone());
    }
    if let Some(rate) = args.baud_rate {
        config.baud_rate = rate;
    }
    if args.timestamps {
        config.display.timestamps = true;
    }
    if args.hex_mode {
        config.display.hex_mode = true;
    }
    if args.send_hex {
        config.send.format = SendFormat::Hex;
    }
}

fn init_logging(config: &Config) {
    let log_path = Config::config_dir()
        .map(|dir| dir.join("serterm.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("serterm.log"));

    // Open log file (append mode)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

/// Forward stdin lines to the presentation loop. The channel closes on EOF.
fn spawn_stdin_reader() -> io::Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
            debug!("stdin closed");
        })?;
    Ok(rx)
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let (mut config, load_error) = Config::load();
    apply_args(&mut config, &args);
    init_logging(&config);
    format::install_panic_hook();

    info!("serterm {} starting...", VERSION);
    if let Some(e) = &load_error {
        warn!("Using default configuration: {}", e);
        eprintln!("Warning: {} (using defaults)", e);
    }

    if args.list_ports {
        let ports = port::list_ports();
        if ports.is_empty() {
            eprintln!("No serial ports found");
        }
        for name in ports {
            println!("{}", name);
        }
        return Ok(());
    }

    let options = Arc::new(DisplayOptions::new(
        config.display.timestamps,
        config.display.hex_mode,
    ));
    let connection = Connection::new(
        Box::new(SerialConnector::new(config.serial.read_timeout())),
        options,
        config.serial.timing(),
    );

    let input = spawn_stdin_reader()?;
    let sink = ConsoleSink::stdout(config.get_color_scheme());

    let mut app = App::new(config, connection, sink, ConsoleStatus::stderr(), input);
    app.run();

    info!("serterm exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_override_config() {
        let mut config = Config::default();
        let args = Args {
            port: Some("COM7".to_string()),
            baud_rate: Some(9600),
            timestamps: true,
            hex_mode: false,
            send_hex: true,
            list_ports: false,
        };
        apply_args(&mut config, &args);

        assert_eq!(config.port.as_deref(), Some("COM7"));
        assert_eq!(config.baud_rate, 9600);
        assert!(config.display.timestamps);
        assert!(!config.display.hex_mode);
        assert_eq!(config.send.format, SendFormat::Hex);
    }

    #[test]
    fn test_empty_args_keep_config() {
        let mut config = Config::default();
        config.display.hex_mode = true;
        let before = config.clone();
        apply_args(&mut config, &Args::default());
        assert_eq!(config, before);
    }
}
