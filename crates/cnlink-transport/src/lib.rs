//! Serial transport for the control node link.
//!
//! Provides a unified byte stream over:
//! - A serial tty (the control node's USB/UART link)
//! - A connected Unix stream pair (loopback device for tests and tooling)
//!
//! This is the lowest layer of cnlink. Everything else builds on top of
//! the [`SerialStream`] type provided here.

pub mod error;
pub mod serial;
pub mod stream;

pub use error::{Result, TransportError};
pub use serial::{list_ports, SerialConfig, DEFAULT_BAUD_RATE, DEFAULT_POLL_TIMEOUT};
pub use stream::{is_poll_timeout, SerialStream};
