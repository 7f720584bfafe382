use std::fmt;
use std::io;

use cnlink_frame::FrameError;
use cnlink_protocol::{CommandError, MeasuresError};
use cnlink_router::LinkError;
use cnlink_transport::TransportError;

// sysexits-style exit codes.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } | FrameError::EmptyPayload => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn link_error(context: &str, err: LinkError) -> CliError {
    match err {
        LinkError::Transport(err) => transport_error(context, err),
        LinkError::Frame(err) => frame_error(context, err),
        LinkError::Spawn(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

pub fn command_error(err: CommandError) -> CliError {
    let code = match &err {
        CommandError::Timeout { .. } => TIMEOUT,
        CommandError::Nack { .. } => FAILURE,
        CommandError::AckMismatch { .. } => DATA_INVALID,
        CommandError::InvalidArgument(_) => USAGE,
    };
    CliError::new(code, err.to_string())
}

pub fn measures_error(err: MeasuresError) -> CliError {
    CliError::new(INTERNAL, format!("measures reader: {err}"))
}
