//! Framing for the control node serial link.
//!
//! Every packet travels on the wire as:
//! - A 1-byte sync marker (`0x80`)
//! - A 1-byte payload length (1..=255)
//! - The payload, whose first byte is the packet type tag
//!
//! The decoder is a resynchronizing state machine: stray bytes and
//! zero-length frames are dropped silently, and frames are reassembled
//! regardless of how the byte stream is chunked.

pub mod codec;
pub mod error;
pub mod kind;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod tokio_codec;

pub use codec::{encode, encode_frame, Frame, FrameDecoder, FrameStats, HEADER_SIZE, MAX_PAYLOAD, SYNC_BYTE};
pub use error::{FrameError, Result};
pub use kind::{classify, kind_name, PacketKind, ERROR_FRAME, MEASURE_MASK};
pub use reader::FrameReader;
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use tokio_codec::CnCodec;
