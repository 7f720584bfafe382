use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use cnlink_frame::{Frame, FrameError, FrameReader, FrameWriter};
use cnlink_transport::{SerialConfig, SerialStream};
use crossbeam::channel::Receiver;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{LinkError, Result};
use crate::router::{Router, RouterStats, DEFAULT_COMMAND_TIMEOUT};

const READER_THREAD_NAME: &str = "cn-reader";

/// Link configuration.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub serial: SerialConfig,
    /// How long `send_command` waits for an answer.
    pub command_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

impl LinkConfig {
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

/// An open serial link to the control node.
///
/// Owns a background reader thread that decodes and routes every inbound
/// packet until [`ControlNodeLink::stop`] is called or the link drops.
pub struct ControlNodeLink {
    router: Arc<Router>,
    writer: Mutex<FrameWriter<SerialStream>>,
    running: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
    command_timeout: Duration,
    device: String,
}

impl ControlNodeLink {
    /// Open the serial device and start reading.
    pub fn open(path: impl AsRef<Path>, config: LinkConfig) -> Result<Self> {
        let stream = SerialStream::open(path, &config.serial)?;
        Self::from_stream(stream, config)
    }

    /// Start a link over an already opened stream.
    pub fn from_stream(stream: SerialStream, config: LinkConfig) -> Result<Self> {
        let device = stream.name();
        let read_half = stream.try_clone()?;
        let reader = FrameReader::with_poll_timeout(read_half, config.serial.poll_timeout)?;

        let router = Arc::new(Router::new());
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let router = Arc::clone(&router);
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name(READER_THREAD_NAME.to_string())
                .spawn(move || run_reader(reader, &router, &running))
                .map_err(LinkError::Spawn)?
        };

        info!(device = %device, timeout = ?config.command_timeout, "control node link started");

        Ok(Self {
            router,
            writer: Mutex::new(FrameWriter::new(stream)),
            running,
            reader: Mutex::new(Some(handle)),
            command_timeout: config.command_timeout,
            device,
        })
    }

    /// Send a command payload and wait for the control node's answer.
    ///
    /// Returns `None` when no answer arrives in time or the link is down.
    pub fn send_command(&self, payload: &[u8]) -> Option<Frame> {
        if !self.is_running() {
            warn!(command = ?payload, "link is not running, command not sent");
            return None;
        }
        self.router.send_and_wait(
            |wire| self.writer.lock().write_wire(wire),
            payload,
            self.command_timeout,
        )
    }

    /// Receiver on the measurement queue.
    pub fn measurements(&self) -> Receiver<Bytes> {
        self.router.measurements()
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn stats(&self) -> RouterStats {
        self.router.stats()
    }

    /// True until `stop` is called or the reader hits end-of-stream.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Stop the reader thread and wait for it to exit. Safe to call twice.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);

        let Some(handle) = self.reader.lock().take() else {
            return;
        };

        if let Err(err) = self.writer.lock().get_ref().shutdown() {
            debug!(error = %err, "transport shutdown failed");
        }
        if handle.join().is_err() {
            error!("reader thread panicked");
        }
        info!(device = %self.device, "control node link stopped");
    }
}

impl Drop for ControlNodeLink {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ControlNodeLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlNodeLink")
            .field("device", &self.device)
            .field("running", &self.is_running())
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

fn run_reader(mut reader: FrameReader<SerialStream>, router: &Router, running: &AtomicBool) {
    debug!("reader thread started");

    while running.load(Ordering::Acquire) {
        match reader.read_frame() {
            Ok(Some(frame)) => router.route(frame.into_payload()),
            Ok(None) => {}
            Err(FrameError::ConnectionClosed) => {
                info!("control node link reached end of stream");
                break;
            }
            Err(err) => {
                if running.load(Ordering::Acquire) {
                    error!(error = %err, "control node link read failed");
                }
                break;
            }
        }
    }

    running.store(false, Ordering::Release);
    let stats = reader.stats();
    debug!(
        frames = stats.frames,
        discarded_bytes = stats.discarded_bytes,
        zero_length = stats.zero_length,
        "reader thread exiting"
    );
}
