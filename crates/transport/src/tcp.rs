//! TCP transport variant (`spec.md` §4.4/§6): plain TCP to a configured
//! host/port, default port 4196, no framing beyond the bus frames
//! themselves.

use tokio::net::TcpStream;

use crate::byte_stream::Transport;
use crate::error::TransportError;

pub const DEFAULT_TCP_PORT: u16 = 4196;

/// Open a TCP transport to `(host, port)`.
pub async fn open(host: &str, port: u16) -> Result<Transport, TransportError> {
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|source| TransportError::Open { kind: "tcp", source })?;
    stream
        .set_nodelay(true)
        .map_err(|source| TransportError::Open { kind: "tcp", source })?;
    Ok(Transport::new(Box::new(stream), "tcp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn opens_and_exchanges_bytes() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"hello").await.unwrap();
        });

        let mut transport = open("127.0.0.1", addr.port()).await.unwrap();
        let mut buf = [0u8; 5];
        let n = transport.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");

        server.await.unwrap();
    }

    #[tokio::test]
    async fn open_failure_surfaces_transport_error() {
        // Port 0 connect always fails fast.
        let result = TcpStream::connect(("127.0.0.1", 1)).await;
        assert!(result.is_err());
    }
}
