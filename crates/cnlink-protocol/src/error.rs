/// Errors from a command exchange with the control node.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// No answer arrived before the link's command timeout.
    #[error("{command}: no answer from control node")]
    Timeout { command: &'static str },

    /// The control node refused the command.
    #[error("{command}: control node answered NACK")]
    Nack { command: &'static str },

    /// The answer does not belong to this command.
    #[error("{command}: unexpected answer {answer:02x?}")]
    AckMismatch {
        command: &'static str,
        answer: Vec<u8>,
    },

    /// The command arguments cannot be encoded.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Why a measurement packet could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Too short to hold the packet header.
    #[error("packet truncated ({len} bytes)")]
    Truncated { len: usize },

    /// The packet tag is not a measurement this decoder handles.
    #[error("unexpected packet tag 0x{0:02x}")]
    UnexpectedTag(u8),

    /// No consumption configuration has been acknowledged yet.
    #[error("no consumption configuration acknowledged")]
    NotConfigured,

    /// Packet length disagrees with the sample count and schema.
    #[error("invalid packet length {len}, expected {expected}")]
    LengthMismatch { len: usize, expected: usize },

    /// Samples carry device ticks but the time reference is not set.
    #[error("no time reference set")]
    NoTimeReference,
}

/// Errors from the measures reader worker.
#[derive(Debug, thiserror::Error)]
pub enum MeasuresError {
    #[error("measures reader already running")]
    AlreadyRunning,

    #[error("failed to spawn measures thread: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CommandError>;
