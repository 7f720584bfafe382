use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use crate::error::{Result, TransportError};

/// A connected control node byte stream; implements Read + Write.
///
/// On real hardware this wraps a serial tty. For tests and tooling it can
/// wrap one end of a connected Unix stream pair.
pub struct SerialStream {
    inner: SerialStreamInner,
}

enum SerialStreamInner {
    Tty(Box<dyn serialport::SerialPort>),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for SerialStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            SerialStreamInner::Tty(port) => port.read(buf),
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for SerialStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            SerialStreamInner::Tty(port) => port.write(buf),
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            SerialStreamInner::Tty(port) => port.flush(),
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl SerialStream {
    pub(crate) fn from_tty(port: Box<dyn serialport::SerialPort>) -> Self {
        Self {
            inner: SerialStreamInner::Tty(port),
        }
    }

    /// Wrap one end of a connected Unix stream.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: SerialStreamInner::Unix(stream),
        }
    }

    /// Create a connected loopback pair: `(host side, device side)`.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (host, device) = std::os::unix::net::UnixStream::pair()?;
        Ok((Self::from_unix(host), Self::from_unix(device)))
    }

    /// Set the blocking read timeout on the underlying stream.
    pub fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        match &mut self.inner {
            SerialStreamInner::Tty(port) => {
                port.set_timeout(timeout).map_err(TransportError::Configure)
            }
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => {
                stream.set_read_timeout(Some(timeout)).map_err(Into::into)
            }
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            SerialStreamInner::Tty(port) => {
                let cloned = port.try_clone().map_err(TransportError::Configure)?;
                Ok(Self::from_tty(cloned))
            }
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => {
                let cloned = stream.try_clone()?;
                Ok(Self::from_unix(cloned))
            }
        }
    }

    /// Close the link for every handle sharing it.
    ///
    /// A Unix stream is shut down so blocked readers see end-of-stream. A tty
    /// has no such operation; its readers are stopped through their poll
    /// timeout instead.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            SerialStreamInner::Tty(_) => Ok(()),
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => match stream.shutdown(std::net::Shutdown::Both) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
                Err(err) => Err(err.into()),
            },
        }
    }

    /// Device name for diagnostics.
    pub fn name(&self) -> String {
        match &self.inner {
            SerialStreamInner::Tty(port) => port.name().unwrap_or_else(|| "tty".to_string()),
            #[cfg(unix)]
            SerialStreamInner::Unix(_) => "loopback".to_string(),
        }
    }
}

/// Returns true if `err` is a read timeout rather than a link failure.
pub fn is_poll_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock)
}

impl std::fmt::Debug for SerialStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            SerialStreamInner::Tty(port) => f
                .debug_struct("SerialStream")
                .field("type", &"tty")
                .field("name", &port.name())
                .finish(),
            #[cfg(unix)]
            SerialStreamInner::Unix(_) => f
                .debug_struct("SerialStream")
                .field("type", &"unix")
                .finish(),
        }
    }
}
