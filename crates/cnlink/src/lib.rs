//! Serial control link to an IoT-LAB control node.
//!
//! The gateway drives the control node over a 500 kbaud serial line: it
//! powers the open node on and off, resets the node clock and configures
//! consumption and radio measures, while the control node streams
//! measurements back on the same line.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial device access
//! - [`frame`]: sync-byte, length-prefixed framing
//! - [`router`]: reader thread, answer mailbox and measurement queue
//! - [`protocol`]: commands, acknowledgements and measure decoding

/// Re-export transport types.
pub mod transport {
    pub use cnlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use cnlink_frame::*;
}

/// Re-export router types.
pub mod router {
    pub use cnlink_router::*;
}

/// Re-export protocol types.
pub mod protocol {
    pub use cnlink_protocol::*;
}
