//! Presentation loop
//!
//! Runs on the main thread: owns the sinks, drains the frame queue in
//! order, and reacts to lines typed by the user.

use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;

use tracing::{debug, info};

use crate::config::Config;
use crate::core::dispatch::{apply_frame, DispatchMessage, FrameQueue};
use crate::core::session::Connection;
use crate::core::sink::{StatusSink, TextSink};
use crate::ui::input::{encode_outbound, parse_input, Command, Input, SendFormat};

/// How long one loop iteration waits for device output
const FRAME_WAIT: Duration = Duration::from_millis(20);

/// Messages applied per `pump` before input gets a turn
const PUMP_BATCH: usize = 256;

pub const HELP: &str = "\
Commands:
  :connect [port] [baud]   Open a port (defaults from config)
  :disconnect              Close the port
  :ports                   List serial ports
  :hex on|off              Hex display
  :ts on|off               Timestamps
  :send-format ascii|hex   How typed lines are sent
  :help                    This text
  :quit                    Exit
Any other line is sent to the device; start it with :: to send a leading colon.
";

pub struct App<T: TextSink, S: StatusSink> {
    config: Config,
    connection: Connection,
    queue: FrameQueue,
    sink: T,
    status: S,
    send_format: SendFormat,
    input: Receiver<String>,
    running: bool,
}

impl<T: TextSink, S: StatusSink> App<T, S> {
    pub fn new(config: Config, connection: Connection, sink: T, status: S, input: Receiver<String>) -> Self {
        let send_format = config.send.format;
        Self {
            config,
            connection,
            queue: FrameQueue::new(),
            sink,
            status,
            send_format,
            input,
            running: true,
        }
    }

    /// Run until `:quit` or the input closes
    pub fn run(&mut self) {
        info!("Presentation loop started");

        if self.config.port.is_some() {
            self.connect(None, None);
        } else {
            self.status.set_status("Not connected (type :help for commands)");
        }

        while self.running {
            self.pump(FRAME_WAIT);
            self.poll_input();
        }

        self.connection.close(&mut self.status);
        info!("Presentation loop finished");
    }

    /// Apply up to `PUMP_BATCH` queued messages, waiting up to `wait` for
    /// the first one. Returns how many were handled.
    pub fn pump(&mut self, wait: Duration) -> usize {
        let Some(first) = self.queue.recv_timeout(wait) else {
            return 0;
        };
        self.handle_message(first);
        let mut handled = 1;
        while handled < PUMP_BATCH {
            let Some(message) = self.queue.try_recv() else {
                break;
            };
            self.handle_message(message);
            handled += 1;
        }
        handled
    }

    fn handle_message(&mut self, message: DispatchMessage) {
        match message {
            // Frames from a detached reader of an earlier session are dropped
            DispatchMessage::Frame { session, frame } => {
                if self.connection.session() == Some(session) {
                    apply_frame(&frame, &mut self.sink);
                }
            }
            DispatchMessage::Disconnected { session, reason } => {
                self.connection.handle_disconnect(session, &reason, &mut self.status)
            }
        }
    }

    fn poll_input(&mut self) {
        loop {
            match self.input.try_recv() {
                Ok(line) => self.handle_line(&line),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("Input closed");
                    self.running = false;
                    break;
                }
            }
        }
    }

    pub fn handle_line(&mut self, line: &str) {
        match parse_input(line) {
            Input::Command(command) => self.handle_command(command),
            Input::Send(text) => self.send(&text),
            Input::Invalid(text) => self.status.set_status(&format!("Unknown command: {}", text)),
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { port, baud } => self.connect(port, baud),
            Command::Disconnect => {
                if self.connection.is_open() {
                    self.connection.close(&mut self.status);
                } else {
                    self.status.set_status("Not connected");
                }
            }
            Command::Ports => self.list_ports(),
            Command::Hex(enabled) => {
                self.connection.options().set_hex_mode(enabled);
                self.status
                    .set_status(&format!("Hex display {}", if enabled { "on" } else { "off" }));
            }
            Command::Timestamps(enabled) => {
                self.connection.options().set_timestamps(enabled);
                self.status
                    .set_status(&format!("Timestamps {}", if enabled { "on" } else { "off" }));
            }
            Command::SendFormat(format) => {
                self.send_format = format;
                let name = match format {
                    SendFormat::Ascii => "ascii",
                    SendFormat::Hex => "hex",
                };
                self.status.set_status(&format!("Sending as {}", name));
            }
            Command::Help => self.sink.append_plain(HELP),
            Command::Quit => self.running = false,
        }
    }

    fn connect(&mut self, port: Option<String>, baud: Option<String>) {
        let port = port
            .or_else(|| self.config.port.clone())
            .or_else(|| self.first_port());
        let baud = baud.unwrap_or_else(|| self.config.baud_rate.to_string());
        let _ = self.connection.open(
            port.as_deref().unwrap_or(""),
            &baud,
            &self.queue,
            &mut self.status,
        );
    }

    fn first_port(&mut self) -> Option<String> {
        let first = self.connection.list_ports().into_iter().next();
        if first.is_none() {
            self.status.set_status("No serial ports found");
        }
        first
    }

    fn list_ports(&mut self) {
        let ports = self.connection.list_ports();
        if ports.is_empty() {
            self.status.set_status("No serial ports found");
            return;
        }
        let mut listing = String::new();
        for port in ports {
            listing.push_str(&port);
            listing.push('\n');
        }
        self.sink.append_plain(&listing);
        self.sink.scroll_to_end();
    }

    fn send(&mut self, line: &str) {
        match encode_outbound(line, self.send_format, self.config.send.line_ending) {
            Ok(bytes) => {
                let _ = self.connection.send(&bytes, &mut self.status);
            }
            Err(e) => self.status.set_status(&format!("Invalid HEX input: {}", e)),
        }
    }

    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    #[cfg(test)]
    pub fn sink(&self) -> &T {
        &self.sink
    }

    #[cfg(test)]
    pub fn status(&self) -> &S {
        &self.status
    }
}
