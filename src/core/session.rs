//! Connection lifecycle
//!
//! Owns the open device and its reader thread. Every method here runs on
//! the presentation thread; the reader only ever talks back through its
//! `RenderDispatcher`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, info_span, warn, Span};

use super::dispatch::{FrameQueue, RenderDispatcher};
use super::format::{FrameFormatter, READER_THREAD_NAME};
use super::port::{self, ByteSink, ByteSource, Connector, PortError};
use super::sink::StatusSink;

/// Display switches shared with the reader thread
#[derive(Debug, Default)]
pub struct DisplayOptions {
    timestamps: AtomicBool,
    hex_mode: AtomicBool,
}

impl DisplayOptions {
    pub fn new(timestamps: bool, hex_mode: bool) -> Self {
        Self {
            timestamps: AtomicBool::new(timestamps),
            hex_mode: AtomicBool::new(hex_mode),
        }
    }

    pub fn timestamps(&self) -> bool {
        self.timestamps.load(Ordering::Relaxed)
    }

    pub fn hex_mode(&self) -> bool {
        self.hex_mode.load(Ordering::Relaxed)
    }

    pub fn set_timestamps(&self, enabled: bool) {
        self.timestamps.store(enabled, Ordering::Relaxed);
    }

    pub fn set_hex_mode(&self, enabled: bool) {
        self.hex_mode.store(enabled, Ordering::Relaxed);
    }
}

/// Reader loop timing
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// Pause when no bytes are waiting
    pub poll_interval: Duration,
    /// How long `close` waits for the reader to exit
    pub close_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            close_timeout: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
}

/// Reader thread plus the channel it signals on when it exits
struct ReaderHandle {
    thread: JoinHandle<()>,
    done: Receiver<()>,
}

/// State of the currently open device, if any
struct OpenDevice {
    port: String,
    session: u64,
    /// Reader stop flag
    running: Arc<AtomicBool>,
    sink: Box<dyn ByteSink>,
    reader: Option<ReaderHandle>,
    span: Span,
}

/// A serial connection and its reader thread
pub struct Connection {
    connector: Box<dyn Connector>,
    options: Arc<DisplayOptions>,
    timing: Timing,
    device: Option<OpenDevice>,
    next_session: u64,
}

impl Connection {
    pub fn new(connector: Box<dyn Connector>, options: Arc<DisplayOptions>, timing: Timing) -> Self {
        Self {
            connector,
            options,
            timing,
            device: None,
            next_session: 1,
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.device.is_some() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Session id of the open connection
    pub fn session(&self) -> Option<u64> {
        self.device.as_ref().map(|d| d.session)
    }

    #[allow(dead_code)]
    pub fn port(&self) -> Option<&str> {
        self.device.as_ref().map(|d| d.port.as_str())
    }

    pub fn options(&self) -> &Arc<DisplayOptions> {
        &self.options
    }

    pub fn list_ports(&self) -> Vec<String> {
        self.connector.list_ports()
    }

    /// Open `port` and start reading from it.
    ///
    /// On failure the connection stays closed and the reason is reported
    /// through `status` as well as returned.
    pub fn open(
        &mut self,
        port: &str,
        baud_text: &str,
        queue: &FrameQueue,
        status: &mut dyn StatusSink,
    ) -> port::Result<()> {
        let result = self.try_open(port, baud_text, queue);
        match &result {
            Ok(baud) => status.set_status(&format!("Connected to {} at {} baud", port, baud)),
            Err(e) => {
                warn!("Connect to {:?} failed: {}", port, e);
                status.set_status(&e.status_message());
            }
        }
        result.map(|_| ())
    }

    fn try_open(&mut self, port: &str, baud_text: &str, queue: &FrameQueue) -> port::Result<u32> {
        if self.device.is_some() {
            return Err(PortError::AlreadyConnected);
        }
        if port.trim().is_empty() {
            return Err(PortError::NoPortSelected);
        }
        let baud = port::parse_baud_rate(baud_text)?;
        let handles = self.connector.open(port, baud)?;

        let session = self.next_session;
        self.next_session += 1;
        let span = info_span!("session", id = session, port = %port);
        info!(parent: &span, "Connected at {} baud", baud);

        let running = Arc::new(AtomicBool::new(true));
        let reader = self
            .spawn_reader(running.clone(), handles.source, queue.dispatcher(session), span.clone())
            .map_err(PortError::Spawn)?;

        self.device = Some(OpenDevice {
            port: port.to_string(),
            session,
            running,
            sink: handles.sink,
            reader: Some(reader),
            span,
        });
        Ok(baud)
    }

    /// Start the reader thread. The thread owns `source` and drops it on
    /// exit, so the device is released as soon as the reader stops.
    fn spawn_reader(
        &self,
        running: Arc<AtomicBool>,
        source: Box<dyn ByteSource>,
        dispatcher: RenderDispatcher,
        span: Span,
    ) -> std::io::Result<ReaderHandle> {
        let options = self.options.clone();
        let poll_interval = self.timing.poll_interval;
        let (done_tx, done) = mpsc::channel();

        let thread = thread::Builder::new()
            .name(READER_THREAD_NAME.to_string())
            .spawn(move || {
                let formatter = FrameFormatter::new(span.clone());
                read_loop(&running, source, formatter, &options, &dispatcher, poll_interval, &span);
                debug!(parent: &span, "Reader exiting");
                let _ = done_tx.send(());
            })?;

        Ok(ReaderHandle { thread, done })
    }

    /// Stop the reader and release the device.
    ///
    /// Returns within `close_timeout`. A reader still stuck in a device call
    /// is detached; it drops the device when that call returns.
    pub fn close(&mut self, status: &mut dyn StatusSink) {
        let Some(mut device) = self.device.take() else {
            return;
        };

        device.running.store(false, Ordering::SeqCst);

        if let Some(reader) = device.reader.take() {
            match reader.done.recv_timeout(self.timing.close_timeout) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    let _ = reader.thread.join();
                }
                Err(RecvTimeoutError::Timeout) => {
                    drop(reader.thread);
                    warn!(parent: &device.span, "Reader did not stop within {:?}", self.timing.close_timeout);
                    status.set_status(&format!(
                        "Warning: reader did not stop within {} ms",
                        self.timing.close_timeout.as_millis()
                    ));
                }
            }
        }

        info!(parent: &device.span, "Disconnected");
        status.set_status("Disconnected");
    }

    /// React to a disconnect notice from a reader.
    ///
    /// Notices from a session that is no longer the open one are ignored.
    pub fn handle_disconnect(&mut self, session: u64, reason: &str, status: &mut dyn StatusSink) {
        if self.session() != Some(session) {
            debug!("Ignoring stale disconnect from session {}", session);
            return;
        }
        warn!("Session {} lost its device: {}", session, reason);
        self.close(status);
        status.set_status("Error: Serial port disconnected unexpectedly");
    }

    /// Write bytes to the device. Failures never change connection state.
    pub fn send(&mut self, data: &[u8], status: &mut dyn StatusSink) -> port::Result<()> {
        let result = match self.device.as_mut() {
            Some(device) => device.sink.write(data),
            None => Err(PortError::NotConnected),
        };
        if let Err(e) = &result {
            status.set_status(&e.status_message());
        }
        result
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(device) = self.device.as_mut() {
            device.running.store(false, Ordering::SeqCst);
            if let Some(reader) = device.reader.take() {
                let _ = reader.done.recv_timeout(self.timing.close_timeout);
            }
        }
    }
}

/// Body of the reader thread
fn read_loop(
    running: &AtomicBool,
    mut source: Box<dyn ByteSource>,
    mut formatter: FrameFormatter,
    options: &DisplayOptions,
    dispatcher: &RenderDispatcher,
    poll_interval: Duration,
    span: &Span,
) {
    debug!(parent: span, "Reader started");

    while running.load(Ordering::SeqCst) {
        let chunk = match source.bytes_available() {
            Ok(0) => Ok(None),
            Ok(n) => source.read(n).map(Some),
            Err(e) => Err(e),
        };
        if !running.load(Ordering::SeqCst) {
            break;
        }

        match chunk {
            Ok(Some(bytes)) if !bytes.is_empty() => {
                let frame = formatter.format_guarded(&bytes, options.timestamps(), options.hex_mode());
                if dispatcher.submit(frame).is_err() {
                    break;
                }
            }
            Ok(_) => thread::sleep(poll_interval),
            Err(e) => {
                warn!(parent: span, "Read failed: {}", e);
                let _ = dispatcher.report_disconnect(e.to_string());
                break;
            }
        }
    }
}
