/// Errors that can occur during frame encoding and stream I/O.
///
/// Malformed input never produces an error: the decoder absorbs it.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload does not fit in the one-byte length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A zero-length frame would be discarded by the receiver.
    #[error("payload is empty")]
    EmptyPayload,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link was closed.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
