use std::io::{ErrorKind, Read, Write};

use bytes::{Buf, BytesMut};

use crate::error::{Result, TransportError};

const READ_CHUNK_SIZE: usize = 512;

/// A blocking byte channel between two link endpoints.
///
/// This is the only shape of I/O the protocol core relies on: the parser is
/// fed one byte at a time and the encoder hands over whole frames.
pub trait LinkTransport {
    /// Block until the next byte arrives.
    ///
    /// Returns `Err(TransportError::Closed)` when the stream reaches EOF.
    fn read_byte(&mut self) -> Result<u8>;

    /// Write every byte of `bytes` (blocking until fully handed to the link).
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    /// Block until everything written so far has left the local buffers.
    fn flush_until_drained(&mut self) -> Result<()>;
}

impl<T: LinkTransport + ?Sized> LinkTransport for Box<T> {
    fn read_byte(&mut self) -> Result<u8> {
        (**self).read_byte()
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_bytes(bytes)
    }

    fn flush_until_drained(&mut self) -> Result<()> {
        (**self).flush_until_drained()
    }
}

impl<T: LinkTransport + ?Sized> LinkTransport for &mut T {
    fn read_byte(&mut self) -> Result<u8> {
        (**self).read_byte()
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_bytes(bytes)
    }

    fn flush_until_drained(&mut self) -> Result<()> {
        (**self).flush_until_drained()
    }
}

/// Adapts any `Read + Write` stream into a [`LinkTransport`].
///
/// Reads are pulled from the stream in small chunks and handed out one byte
/// at a time, so a byte-oriented parser does not pay a syscall per byte.
pub struct StreamTransport<T> {
    inner: T,
    rx: BytesMut,
}

impl<T> StreamTransport<T> {
    /// Wrap a stream.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            rx: BytesMut::with_capacity(READ_CHUNK_SIZE),
        }
    }

    /// Number of bytes already read from the stream but not yet handed out.
    pub fn buffered_len(&self) -> usize {
        self.rx.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the transport and return the inner stream.
    ///
    /// Bytes still sitting in the read buffer are lost.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read> StreamTransport<T> {
    fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => {
                    self.rx.extend_from_slice(&chunk[..n]);
                    return Ok(());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl<T: Read + Write> LinkTransport for StreamTransport<T> {
    fn read_byte(&mut self) -> Result<u8> {
        if self.rx.is_empty() {
            self.fill()?;
        }
        Ok(self.rx.get_u8())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        Ok(())
    }

    fn flush_until_drained(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl<T> std::fmt::Debug for StreamTransport<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("buffered", &self.rx.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn reads_bytes_in_order_then_reports_closed() {
        let mut transport = StreamTransport::new(Cursor::new(vec![0xFE, 0x01, 0x02]));

        assert_eq!(transport.read_byte().unwrap(), 0xFE);
        assert_eq!(transport.buffered_len(), 2);
        assert_eq!(transport.read_byte().unwrap(), 0x01);
        assert_eq!(transport.read_byte().unwrap(), 0x02);
        assert!(matches!(
            transport.read_byte(),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn write_bytes_writes_everything() {
        let mut transport = StreamTransport::new(Cursor::new(Vec::<u8>::new()));
        transport.write_bytes(b"abc").unwrap();
        transport.write_bytes(b"def").unwrap();
        transport.flush_until_drained().unwrap();

        assert_eq!(transport.into_inner().into_inner(), b"abcdef");
    }

    #[test]
    fn interrupted_read_retries() {
        let mut transport = StreamTransport::new(InterruptedThenData {
            interrupted: false,
            data: vec![7, 8],
        });

        assert_eq!(transport.read_byte().unwrap(), 7);
        assert_eq!(transport.read_byte().unwrap(), 8);
    }

    #[test]
    fn zero_length_write_is_closed() {
        let mut transport = StreamTransport::new(ClosedWriter);
        assert!(matches!(
            transport.write_bytes(b"x"),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn boxed_transport_delegates() {
        let mut boxed: Box<dyn LinkTransport> =
            Box::new(StreamTransport::new(Cursor::new(vec![42u8])));
        assert_eq!(boxed.read_byte().unwrap(), 42);
    }

    #[cfg(unix)]
    #[test]
    fn roundtrip_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut tx = StreamTransport::new(left);
        let mut rx = StreamTransport::new(right);

        tx.write_bytes(&[1, 2, 3]).unwrap();
        tx.flush_until_drained().unwrap();

        assert_eq!(rx.read_byte().unwrap(), 1);
        assert_eq!(rx.read_byte().unwrap(), 2);
        assert_eq!(rx.read_byte().unwrap(), 3);
    }

    struct InterruptedThenData {
        interrupted: bool,
        data: Vec<u8>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            let n = self.data.len().min(buf.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data.drain(..n);
            Ok(n)
        }
    }

    impl Write for InterruptedThenData {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ClosedWriter;

    impl Read for ClosedWriter {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Ok(0)
        }
    }

    impl Write for ClosedWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
