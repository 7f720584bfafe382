use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_frame, Frame, HEADER_SIZE, MAX_PAYLOAD};
use crate::error::{FrameError, Result};

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(HEADER_SIZE + MAX_PAYLOAD),
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.payload.as_ref())
    }

    /// Encode and send a payload.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.buf.clear();
        encode_frame(payload, &mut self.buf)?;
        write_all_retrying(&mut self.inner, &self.buf)?;
        self.flush()
    }

    /// Send bytes that are already in wire format.
    pub fn write_wire(&mut self, wire: &[u8]) -> Result<()> {
        write_all_retrying(&mut self.inner, wire)?;
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

fn write_all_retrying<T: Write>(inner: &mut T, bytes: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match inner.write(&bytes[offset..]) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::codec::FrameDecoder;

    fn written(writer: FrameWriter<Cursor<Vec<u8>>>) -> Vec<u8> {
        writer.into_inner().into_inner()
    }

    #[test]
    fn write_single_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(&[0x70, 0x01]).unwrap();
        assert_eq!(written(writer), vec![0x80, 0x02, 0x70, 0x01]);
    }

    #[test]
    fn write_multiple_frames() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send(b"one").unwrap();
        writer.write_frame(&Frame::new(&b"two"[..])).unwrap();
        writer.send(b"three").unwrap();

        let frames = FrameDecoder::new().feed(&written(writer));
        let payloads: Vec<_> = frames.iter().map(|f| f.payload.as_ref()).collect();
        assert_eq!(payloads, vec![&b"one"[..], b"two", b"three"]);
    }

    #[test]
    fn write_wire_passes_bytes_through() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.write_wire(&[0x80, 0x01, 0x72]).unwrap();
        assert_eq!(written(writer), vec![0x80, 0x01, 0x72]);
    }

    #[test]
    fn payload_too_large_rejected() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let err = writer.send(&[0u8; 300]).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 300, .. }));
        assert!(written(writer).is_empty());
    }

    #[test]
    fn empty_payload_rejected() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        assert!(matches!(writer.send(b""), Err(FrameError::EmptyPayload)));
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.send(b"x").unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_write_and_flush() {
        let writer_impl = InterruptedWriteThenFlush {
            wrote_once: false,
            flush_interrupted: false,
            data: Vec::new(),
        };

        let mut writer = FrameWriter::new(writer_impl);
        writer.send(b"retry").unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.data, vec![0x80, 0x05, b'r', b'e', b't', b'r', b'y']);
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct InterruptedWriteThenFlush {
        wrote_once: bool,
        flush_interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedWriteThenFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_interrupted {
                self.flush_interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
