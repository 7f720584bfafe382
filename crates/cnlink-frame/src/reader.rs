use std::io::{ErrorKind, Read};
use std::time::Duration;

use cnlink_transport::{is_poll_timeout, SerialStream};

use crate::codec::{Frame, FrameDecoder, FrameStats};
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 512;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads and resynchronization internally; callers always
/// get complete frames.
pub struct FrameReader<T> {
    inner: T,
    decoder: FrameDecoder,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader waiting for a sync marker.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            decoder: FrameDecoder::new(),
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Ok(None)` when the stream's read timeout expires before a
    /// frame completes; partial frames are kept for the next call.
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.decoder.next_frame() {
                return Ok(Some(frame));
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_poll_timeout(&err) => return Ok(None),
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.decoder.push(&chunk[..read]);
        }
    }

    /// Drop any partial frame, e.g. after reopening the device.
    pub fn reset(&mut self) {
        self.decoder.reset();
    }

    /// Decoder counters.
    pub fn stats(&self) -> FrameStats {
        self.decoder.stats()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl FrameReader<SerialStream> {
    /// Create a frame reader for `SerialStream` and apply the poll timeout.
    pub fn with_poll_timeout(mut inner: SerialStream, poll_timeout: Duration) -> Result<Self> {
        inner
            .set_read_timeout(poll_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::new(inner))
    }
}

pub(crate) fn transport_to_frame_error(err: cnlink_transport::TransportError) -> FrameError {
    match err {
        cnlink_transport::TransportError::Io(io) => FrameError::Io(io),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use super::*;
    use crate::codec::encode;

    fn wire(payloads: &[&[u8]]) -> Vec<u8> {
        payloads
            .iter()
            .flat_map(|p| encode(p).unwrap().to_vec())
            .collect()
    }

    #[test]
    fn read_single_frame() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[b"\x70\x0a"])));
        let frame = reader.read_frame().unwrap().unwrap();
        assert_eq!(frame.payload.as_ref(), b"\x70\x0a");
    }

    #[test]
    fn read_multiple_frames() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[b"one", b"two", b"three"])));

        let f1 = reader.read_frame().unwrap().unwrap();
        let f2 = reader.read_frame().unwrap().unwrap();
        let f3 = reader.read_frame().unwrap().unwrap();

        assert_eq!(f1.payload.as_ref(), b"one");
        assert_eq!(f2.payload.as_ref(), b"two");
        assert_eq!(f3.payload.as_ref(), b"three");
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: wire(&[b"slow", b"frames"]),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        assert_eq!(reader.read_frame().unwrap().unwrap().payload.as_ref(), b"slow");
        assert_eq!(reader.read_frame().unwrap().unwrap().payload.as_ref(), b"frames");
    }

    #[test]
    fn garbage_between_frames_is_skipped() {
        let mut bytes = b"DDEKK".to_vec();
        bytes.extend(wire(&[b"abc"]));
        bytes.extend_from_slice(&[0x80, 0x00, 0x13]);
        bytes.extend(wire(&[b"x"]));

        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_frame().unwrap().unwrap().payload.as_ref(), b"abc");
        assert_eq!(reader.read_frame().unwrap().unwrap().payload.as_ref(), b"x");
        assert!(matches!(reader.read_frame(), Err(FrameError::ConnectionClosed)));

        let stats = reader.stats();
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.zero_length, 1);
        assert_eq!(stats.discarded_bytes, 6);
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut reader = FrameReader::new(Cursor::new(vec![0x80, 0x10, b'p', b'a']));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn timeout_is_a_poll_and_keeps_partial_frame() {
        let reader = TimeoutBetween {
            chunks: vec![vec![0x80, 0x03, b'a'], vec![b'b', b'c']],
            timed_out: false,
        };
        let mut framed = FrameReader::new(reader);

        assert!(framed.read_frame().unwrap().is_none());
        let frame = framed.read_frame().unwrap().unwrap();
        assert_eq!(frame.payload.as_ref(), b"abc");
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            state: 0,
            bytes: wire(&[b"ok"]),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        let frame = framed.read_frame().unwrap().unwrap();
        assert_eq!(frame.payload.as_ref(), b"ok");
    }

    #[test]
    fn other_io_errors_propagate() {
        let mut framed = FrameReader::new(BrokenReader);
        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn accessors_and_into_inner() {
        let cursor = Cursor::new(Vec::<u8>::new());
        let mut reader = FrameReader::new(cursor);

        let _ = reader.get_ref();
        let _ = reader.get_mut();
        reader.reset();
        let _inner = reader.into_inner();
    }

    #[test]
    #[cfg(unix)]
    fn reads_over_serial_stream_pair() {
        let (host, mut device) = SerialStream::pair().unwrap();
        let mut reader = FrameReader::with_poll_timeout(host, Duration::from_millis(20)).unwrap();

        assert!(reader.read_frame().unwrap().is_none());

        device.write_all(&wire(&[b"\xff\x00\x00"])).unwrap();
        let frame = loop {
            if let Some(frame) = reader.read_frame().unwrap() {
                break frame;
            }
        };
        assert_eq!(frame.payload.as_ref(), b"\xff\x00\x00");

        drop(device);
        let err = loop {
            match reader.read_frame() {
                Ok(None) => continue,
                Ok(Some(_)) => panic!("no more frames expected"),
                Err(err) => break err,
            }
        };
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct TimeoutBetween {
        chunks: Vec<Vec<u8>>,
        timed_out: bool,
    }

    impl Read for TimeoutBetween {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.chunks.len() == 1 && !self.timed_out {
                self.timed_out = true;
                return Err(std::io::Error::from(ErrorKind::TimedOut));
            }
            if self.chunks.is_empty() {
                return Ok(0);
            }
            let chunk = self.chunks.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    struct InterruptedThenData {
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let remaining = self.bytes.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }
    }
}
