use std::path::PathBuf;

/// Errors that can occur in serial transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the serial device.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: serialport::Error,
    },

    /// Failed to change a setting on an open device.
    #[error("failed to configure serial device: {0}")]
    Configure(serialport::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to enumerate serial devices.
    #[error("failed to list serial ports: {0}")]
    Enumerate(serialport::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
