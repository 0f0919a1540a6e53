//! Serial device access
//!
//! Narrow byte-level interfaces over a serial port, plus the `serialport`
//! backed implementation used by the application.

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::SerialPort;
use thiserror::Error;

/// Baud rates offered by default
pub const BAUD_PRESETS: [u32; 3] = [9600, 115200, 460800];

pub const DEFAULT_BAUD_RATE: u32 = 115200;

#[derive(Error, Debug)]
pub enum PortError {
    #[error("No port selected")]
    NoPortSelected,

    #[error("Invalid baud rate: {0:?}")]
    InvalidBaudRate(String),

    #[error("Could not open port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Failed to read from port: {0}")]
    Read(#[source] io::Error),

    #[error("Failed to write to port: {0}")]
    Write(#[source] io::Error),

    #[error("Not connected")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Failed to start reader thread: {0}")]
    Spawn(#[source] io::Error),
}

impl PortError {
    /// Message shown in the status line
    pub fn status_message(&self) -> String {
        match self {
            PortError::NoPortSelected => "Error: No port selected".to_string(),
            PortError::InvalidBaudRate(_) => "Error: Invalid baud rate".to_string(),
            PortError::Open { port, .. } => format!("Error: Could not open port {}", port),
            PortError::Read(_) => "Error: Serial port disconnected unexpectedly".to_string(),
            PortError::Write(e) => format!("Error: Write failed: {}", e),
            PortError::NotConnected => "Error: Not connected".to_string(),
            PortError::AlreadyConnected => "Error: Already connected".to_string(),
            PortError::Spawn(e) => format!("Error: Could not start reader: {}", e),
        }
    }
}

pub type Result<T> = std::result::Result<T, PortError>;

/// Parse a user-supplied baud rate
pub fn parse_baud_rate(text: &str) -> Result<u32> {
    match text.trim().parse::<u32>() {
        Ok(baud) if baud > 0 => Ok(baud),
        _ => Err(PortError::InvalidBaudRate(text.to_string())),
    }
}

/// Inbound half of a device
pub trait ByteSource: Send {
    /// Number of bytes that can be read without blocking
    fn bytes_available(&mut self) -> Result<usize>;
    /// Read up to `count` bytes
    fn read(&mut self, count: usize) -> Result<Vec<u8>>;
}

/// Outbound half of a device
pub trait ByteSink: Send {
    fn write(&mut self, data: &[u8]) -> Result<()>;
}

/// Both halves of an open device
pub struct DeviceHandles {
    pub source: Box<dyn ByteSource>,
    pub sink: Box<dyn ByteSink>,
}

/// Opens devices by name
pub trait Connector {
    fn open(&self, port: &str, baud_rate: u32) -> Result<DeviceHandles>;
    fn list_ports(&self) -> Vec<String>;
}

/// `serialport` implementation of `Connector`
pub struct SerialConnector {
    read_timeout: Duration,
}

impl SerialConnector {
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }
}

impl Connector for SerialConnector {
    fn open(&self, port: &str, baud_rate: u32) -> Result<DeviceHandles> {
        let open_err = |source| PortError::Open {
            port: port.to_string(),
            source,
        };

        let reader = serialport::new(port, baud_rate)
            .timeout(self.read_timeout)
            .open()
            .map_err(open_err)?;
        let writer = reader.try_clone().map_err(open_err)?;

        Ok(DeviceHandles {
            source: Box::new(SerialSource { port: reader }),
            sink: Box::new(SerialSink { port: writer }),
        })
    }

    fn list_ports(&self) -> Vec<String> {
        list_ports()
    }
}

/// Names of the serial ports present on this machine
pub fn list_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate serial ports: {}", e);
            Vec::new()
        }
    }
}

struct SerialSource {
    port: Box<dyn SerialPort>,
}

impl ByteSource for SerialSource {
    fn bytes_available(&mut self) -> Result<usize> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(|e| PortError::Read(e.into()))
    }

    fn read(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; count];
        match self.port.read(&mut buffer) {
            Ok(n) => {
                buffer.truncate(n);
                Ok(buffer)
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(PortError::Read(e)),
        }
    }
}

struct SerialSink {
    port: Box<dyn SerialPort>,
}

impl ByteSink for SerialSink {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data).map_err(PortError::Write)?;
        self.port.flush().map_err(PortError::Write)
    }
}
