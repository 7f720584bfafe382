use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::SerialStream;

/// Control node UART speed.
pub const DEFAULT_BAUD_RATE: u32 = 500_000;

/// Read poll timeout. Short enough that a stopping reader notices promptly.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial device configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Baud rate. Default: 500000.
    pub baud_rate: u32,
    /// Blocking read timeout; a read that times out is a poll, not a failure.
    pub poll_timeout: Duration,
    /// Discard bytes already buffered by the OS when the device is opened.
    pub clear_on_open: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            clear_on_open: true,
        }
    }
}

impl SerialConfig {
    /// Override the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Override the read poll timeout.
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }
}

impl SerialStream {
    /// Open a serial tty (e.g. `/dev/ttyCN`) with the given configuration.
    ///
    /// Failure to open the device is reported as [`TransportError::Open`].
    pub fn open(path: impl AsRef<Path>, config: &SerialConfig) -> Result<Self> {
        let path = path.as_ref();
        let name = path.to_string_lossy().into_owned();

        let port = serialport::new(name, config.baud_rate)
            .timeout(config.poll_timeout)
            .open()
            .map_err(|source| TransportError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        if config.clear_on_open {
            port.clear(serialport::ClearBuffer::Input)
                .map_err(TransportError::Configure)?;
            debug!(?path, "cleared serial input buffer");
        }

        info!(?path, baud = config.baud_rate, "opened serial device");
        Ok(Self::from_tty(port))
    }
}

/// Names of the serial devices present on this host.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports().map_err(TransportError::Enumerate)?;
    Ok(ports.into_iter().map(|info| info.port_name).collect())
}
