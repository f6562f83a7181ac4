//! Serial transport variant (`spec.md` §4.4/§6): 9600 baud (overridable), 8
//! data bits, even parity, 1 stop bit, hardware RTS/CTS flow control.

use tokio_serial::SerialPortBuilderExt;

use crate::byte_stream::Transport;
use crate::error::TransportError;

pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Open a serial transport on `path` (e.g. `/dev/ttyUSB0`) at `baud_rate`,
/// with the bus's fixed line settings: 8E1, hardware flow control.
pub fn open(path: &str, baud_rate: u32) -> Result<Transport, TransportError> {
    let port = tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::Even)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::Hardware)
        .open_native_async()
        .map_err(|source| TransportError::Open {
            kind: "serial",
            source: std::io::Error::other(source),
        })?;
    Ok(Transport::new(Box::new(port), "serial"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_device_path_fails_to_open() {
        let result = open("/dev/does-not-exist-ehs-gateway", DEFAULT_BAUD_RATE);
        assert!(result.is_err());
    }
}
