//! An in-memory `Transport` backed by `tokio::io::duplex`, for driving the
//! framer/scheduler/control-ingress in tests without a real serial port or
//! socket. Modeled on the teacher's `rt-test-utils::MockWsClient` — a
//! test-only stand-in for the real transport, wired the same way a real one
//! would be.

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use transport::Transport;

/// Pairs a live `Transport` (handed to the code under test) with the other
/// end of the duplex pipe (held by the test, to play device bytes in and
/// capture frames written out).
pub struct MockDeviceBus {
    pub transport: Transport,
    pub device_end: DuplexStream,
}

/// Build a connected pair. `buffer` bounds how many bytes can be in flight
/// before a write blocks — large enough for any single test frame burst.
pub fn mock_transport_pair(buffer: usize) -> MockDeviceBus {
    let (gateway_side, device_side) = tokio::io::duplex(buffer);
    MockDeviceBus {
        transport: Transport::new(Box::new(gateway_side), "mock"),
        device_end: device_side,
    }
}

impl MockDeviceBus {
    /// Write bytes as if they arrived from the device.
    pub async fn push_from_device(&mut self, bytes: &[u8]) {
        self.device_end.write_all(bytes).await.expect("mock device write");
    }

    /// Read exactly `n` bytes the gateway wrote to the bus (a poll/write
    /// request frame, typically).
    pub async fn pull_written(&mut self, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        self.device_end.read_exact(&mut buf).await.expect("mock device read");
        buf
    }
}
