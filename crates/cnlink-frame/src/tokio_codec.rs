//! `tokio_util::codec` adapter over [`FrameDecoder`].

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, Frame, FrameDecoder, FrameStats};
use crate::error::FrameError;

/// Framed codec for async serial streams.
#[derive(Debug, Default)]
pub struct CnCodec {
    decoder: FrameDecoder,
}

impl CnCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder counters since creation.
    pub fn stats(&self) -> FrameStats {
        self.decoder.stats()
    }
}

impl Decoder for CnCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        if !src.is_empty() {
            let chunk = src.split();
            self.decoder.push(&chunk);
        }
        Ok(self.decoder.next_frame())
    }
}

impl Encoder<&[u8]> for CnCodec {
    type Error = FrameError;

    fn encode(&mut self, payload: &[u8], dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_frame(payload, dst)
    }
}

impl Encoder<Bytes> for CnCodec {
    type Error = FrameError;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_frame(&payload, dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;

    #[tokio::test]
    async fn framed_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(64);
        let mut sink = FramedWrite::new(client, CnCodec::new());
        let mut stream = FramedRead::new(server, CnCodec::new());

        sink.send(Bytes::from_static(b"\x70\x0a")).await.unwrap();
        sink.send(Bytes::from_static(b"\xfa\x72")).await.unwrap();

        let first = stream.next().await.unwrap().unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(first.payload.as_ref(), b"\x70\x0a");
        assert_eq!(second.payload.as_ref(), b"\xfa\x72");
    }

    #[tokio::test]
    async fn framed_read_skips_noise_and_split_writes() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut stream = FramedRead::new(server, CnCodec::new());

        client.write_all(b"DDEKK\x80").await.unwrap();
        client.write_all(b"\x03ab").await.unwrap();
        client.write_all(b"c\x80\x00").await.unwrap();
        drop(client);

        let frame = stream.next().await.unwrap().unwrap();
        assert_eq!(frame.payload.as_ref(), b"abc");
        assert!(stream.next().await.is_none());
        assert_eq!(stream.decoder().stats().discarded_bytes, 5);
    }

    #[test]
    fn decode_drains_source_buffer() {
        let mut codec = CnCodec::new();
        let mut src = BytesMut::from(&[0x80, 0x01, 0x71, 0x80, 0x01, 0x70][..]);

        let first = codec.decode(&mut src).unwrap().unwrap();
        assert!(src.is_empty());
        let second = codec.decode(&mut src).unwrap().unwrap();
        assert_eq!(first.tag(), Some(0x71));
        assert_eq!(second.tag(), Some(0x70));
        assert!(codec.decode(&mut src).unwrap().is_none());
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let mut codec = CnCodec::new();
        let mut dst = BytesMut::new();
        let payload = vec![0u8; 256];
        let err = codec.encode(payload.as_slice(), &mut dst).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }
}
