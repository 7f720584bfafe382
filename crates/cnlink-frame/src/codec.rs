use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::error::{FrameError, Result};

/// Frame header: sync (1) + length (1) = 2 bytes.
pub const HEADER_SIZE: usize = 2;

/// Sync marker preceding every length byte.
pub const SYNC_BYTE: u8 = 0x80;

/// Largest payload the one-byte length field can describe.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// A received control node packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The packet bytes; the first one is the type tag.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// The packet type tag, if the payload is not empty.
    pub fn tag(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Consume the frame and return its payload.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        self.payload.as_ref()
    }
}

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────────┬────────────┬─────────────────────┐
/// │ Sync (1B) │ Length     │ Payload             │
/// │ 0x80      │ (1B, 1-255)│ (Length bytes)      │
/// └───────────┴────────────┴─────────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    if payload.is_empty() {
        return Err(FrameError::EmptyPayload);
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u8(SYNC_BYTE);
    dst.put_u8(payload.len() as u8);
    dst.put_slice(payload);
    Ok(())
}

/// Encode a payload into a freshly allocated wire buffer.
pub fn encode(payload: &[u8]) -> Result<Bytes> {
    let mut dst = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    encode_frame(payload, &mut dst)?;
    Ok(dst.freeze())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    SeekSync,
    AwaitLength,
    AwaitPayload { len: usize },
}

/// Counters for bytes the decoder had to throw away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Complete frames emitted.
    pub frames: u64,
    /// Bytes dropped while looking for a sync marker.
    pub discarded_bytes: u64,
    /// Frames announced with a zero length.
    pub zero_length: u64,
}

/// Incremental byte-stream to frame decoder.
///
/// Bytes can be pushed in chunks of any size; the frames produced do not
/// depend on where the chunk boundaries fall.
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecodeState,
    buf: BytesMut,
    stats: FrameStats,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a decoder waiting for a sync marker.
    pub fn new() -> Self {
        Self {
            state: DecodeState::SeekSync,
            buf: BytesMut::with_capacity(HEADER_SIZE + MAX_PAYLOAD),
            stats: FrameStats::default(),
        }
    }

    /// Push bytes and return every frame they complete, in order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.push(bytes);
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame() {
            frames.push(frame);
        }
        frames
    }

    /// Append bytes without decoding them yet.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Decode the next complete frame from the buffered bytes, if any.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            match self.state {
                DecodeState::SeekSync => {
                    match self.buf.iter().position(|&b| b == SYNC_BYTE) {
                        Some(pos) => {
                            if pos > 0 {
                                self.discard(pos);
                            }
                            self.buf.advance(1);
                            self.state = DecodeState::AwaitLength;
                        }
                        None => {
                            let len = self.buf.len();
                            if len > 0 {
                                self.discard(len);
                            }
                            return None;
                        }
                    }
                }
                DecodeState::AwaitLength => {
                    if self.buf.is_empty() {
                        return None;
                    }
                    let len = self.buf.get_u8() as usize;
                    if len == 0 {
                        self.stats.zero_length += 1;
                        trace!("dropping zero-length frame");
                        self.state = DecodeState::SeekSync;
                    } else {
                        self.state = DecodeState::AwaitPayload { len };
                    }
                }
                DecodeState::AwaitPayload { len } => {
                    if self.buf.len() < len {
                        return None;
                    }
                    let payload = self.buf.split_to(len).freeze();
                    self.state = DecodeState::SeekSync;
                    self.stats.frames += 1;
                    return Some(Frame { payload });
                }
            }
        }
    }

    /// Drop any partial frame and wait for the next sync marker.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.state = DecodeState::SeekSync;
    }

    /// Decoder counters since creation.
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// True if no partial frame is buffered.
    pub fn is_idle(&self) -> bool {
        self.state == DecodeState::SeekSync && self.buf.is_empty()
    }

    fn discard(&mut self, count: usize) {
        trace!(count, "dropping bytes outside of a frame");
        self.stats.discarded_bytes += count as u64;
        self.buf.advance(count);
    }
}
