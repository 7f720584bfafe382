//! Packet routing for the control node link.
//!
//! One reader thread owns the inbound byte stream. Each decoded packet is
//! either queued for the measures consumer or delivered to the single
//! command waiting for an answer. At most one command is in flight.

pub mod error;
pub mod link;
pub mod router;

pub use error::{LinkError, Result};
pub use link::{ControlNodeLink, LinkConfig};
pub use router::{Router, RouterStats, DEFAULT_COMMAND_TIMEOUT};
