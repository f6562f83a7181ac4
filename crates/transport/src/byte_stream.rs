//! The `Transport` abstraction (C4, `spec.md` §4.4): a polymorphic byte
//! stream over serial or TCP, opened once by the runtime and loaned to
//! exactly one reader and one writer task at a time (`spec.md` §5).

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::TransportError;

/// Any async byte stream the transport can wrap. Blanket-implemented for
/// anything that's both halves plus `Unpin + Send`, so `TcpStream` and
/// `tokio_serial::SerialStream` both satisfy it without a wrapper type.
pub trait ByteStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> ByteStream for T {}

/// An open device-bus connection, serial or TCP (`spec.md` §6). Read/write
/// are the only operations exposed to callers (the framer reads, the
/// scheduler/control-ingress write); reconnection policy is the runtime's.
pub struct Transport {
    inner: Box<dyn ByteStream>,
    kind: &'static str,
}

impl Transport {
    pub fn new(inner: Box<dyn ByteStream>, kind: &'static str) -> Self {
        Transport { inner, kind }
    }

    /// The transport variant this connection was opened as, for logging.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Read up to `buf.len()` bytes, returning the number read. `0` means
    /// the peer closed the stream (`spec.md` §4.4 "surfaces disconnects").
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let n = self.inner.read(buf).await.map_err(TransportError::Read)?;
        if n == 0 {
            return Err(TransportError::Disconnected);
        }
        Ok(n)
    }

    /// Write the entire buffer, returning once every byte has been
    /// accepted by the OS (`spec.md` §4.4 "drains writes").
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        self.inner.write_all(buf).await.map_err(TransportError::Write)?;
        self.inner.flush().await.map_err(TransportError::Write)
    }

    /// Close the underlying stream. `spec.md` §5: "C4 is closed last."
    pub async fn close(mut self) -> Result<(), TransportError> {
        self.inner.shutdown().await.map_err(TransportError::Write)
    }

    /// Split into independent read/write halves so the runtime can drive
    /// the framer and the outbound write queue as two concurrent tasks
    /// over the same connection (`spec.md` §5: one reader, one writer).
    pub fn split(self) -> (ReadHalf, WriteHalf) {
        let (r, w) = tokio::io::split(self.inner);
        (ReadHalf(r), WriteHalf(w))
    }
}

pub struct ReadHalf(tokio::io::ReadHalf<Box<dyn ByteStream>>);

impl ReadHalf {
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let n = self.0.read(buf).await.map_err(TransportError::Read)?;
        if n == 0 {
            return Err(TransportError::Disconnected);
        }
        Ok(n)
    }
}

pub struct WriteHalf(tokio::io::WriteHalf<Box<dyn ByteStream>>);

impl WriteHalf {
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        self.0.write_all(buf).await.map_err(TransportError::Write)?;
        self.0.flush().await.map_err(TransportError::Write)
    }
}
