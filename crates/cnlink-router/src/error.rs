/// Errors that can occur while setting up the control node link.
///
/// Command exchanges never return these: a lost answer is reported as `None`.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] cnlink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] cnlink_frame::FrameError),

    /// The reader thread could not be started.
    #[error("failed to spawn reader thread: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;
