//! The `Frame` type and its wire codec (C3): one exchange on the bus —
//! header, an ordered sequence of `Message`s, and a trailer (§3, §6).

use crate::error::FrameError;
use crate::message::{FieldKind, Message};

pub const START_MARKER: u8 = 0x32;
pub const END_MARKER: u8 = 0x34;

/// Deterministic default used when serializing read/request frames
/// (`spec.md` §4.3, §9 open question 3): unclear whether the device
/// requires monotonicity, so it is treated as a constant until proven
/// otherwise.
pub const DEFAULT_PACKET_NUMBER: u8 = 166;

/// Source/destination address class (§6). `BadEnum` on any other value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressClass {
    Outdoor,
    Indoor,
    JIGTester,
    BroadcastSetLayer,
    BroadcastSelfLayer,
    WiFiKit,
}

impl AddressClass {
    fn from_wire(byte: u8) -> Result<Self, FrameError> {
        match byte {
            0x10 => Ok(AddressClass::Outdoor),
            0x20 => Ok(AddressClass::Indoor),
            0x50 => Ok(AddressClass::JIGTester),
            0xB0 => Ok(AddressClass::BroadcastSetLayer),
            0xB1 => Ok(AddressClass::BroadcastSelfLayer),
            0x80 => Ok(AddressClass::WiFiKit),
            other => Err(FrameError::BadEnum {
                field: "address_class",
                value: other,
            }),
        }
    }

    fn to_wire(self) -> u8 {
        match self {
            AddressClass::Outdoor => 0x10,
            AddressClass::Indoor => 0x20,
            AddressClass::JIGTester => 0x50,
            AddressClass::BroadcastSetLayer => 0xB0,
            AddressClass::BroadcastSelfLayer => 0xB1,
            AddressClass::WiFiKit => 0x80,
        }
    }
}

/// Packet type, the high nibble of offset 10 (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    Normal,
    Gateway,
    Extension,
}

impl PacketType {
    fn from_wire(nibble: u8) -> Result<Self, FrameError> {
        match nibble {
            0x1 => Ok(PacketType::Normal),
            0x2 => Ok(PacketType::Gateway),
            0x3 => Ok(PacketType::Extension),
            other => Err(FrameError::BadEnum {
                field: "packet_type",
                value: other,
            }),
        }
    }

    fn to_wire(self) -> u8 {
        match self {
            PacketType::Normal => 0x1,
            PacketType::Gateway => 0x2,
            PacketType::Extension => 0x3,
        }
    }
}

/// Data type, the low nibble of offset 10 (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Read,
    Write,
    Request,
    Notification,
    Response,
    Ack,
    Nack,
}

impl DataType {
    fn from_wire(nibble: u8) -> Result<Self, FrameError> {
        match nibble {
            0x0 => Ok(DataType::Notification),
            0x1 => Ok(DataType::Read),
            0x2 => Ok(DataType::Write),
            0x3 => Ok(DataType::Request),
            0x4 => Ok(DataType::Response),
            0x5 => Ok(DataType::Ack),
            0x6 => Ok(DataType::Nack),
            other => Err(FrameError::BadEnum {
                field: "data_type",
                value: other,
            }),
        }
    }

    fn to_wire(self) -> u8 {
        match self {
            DataType::Notification => 0x0,
            DataType::Read => 0x1,
            DataType::Write => 0x2,
            DataType::Request => 0x3,
            DataType::Response => 0x4,
            DataType::Ack => 0x5,
            DataType::Nack => 0x6,
        }
    }
}

/// One endpoint (address class, channel, address) on either side of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub class: AddressClass,
    pub channel: u8,
    pub address: u8,
}

/// A fully decoded (or not-yet-serialized) bus frame (§3, §6).
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub source: Endpoint,
    pub destination: Endpoint,
    pub information: bool,
    pub version: u8,
    pub retry_count: u8,
    pub packet_type: PacketType,
    pub data_type: DataType,
    pub packet_number: u8,
    pub messages: Vec<Message>,
}

impl Frame {
    /// Parse a byte slice the framer has already delimited as one candidate
    /// frame. Steps follow `spec.md` §4.3 in order.
    pub fn parse(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < 15 {
            return Err(FrameError::Truncated {
                declared: 15,
                actual: buf.len(),
            });
        }
        if buf[0] != START_MARKER {
            return Err(FrameError::BadMarker {
                start: buf[0],
                end: *buf.last().unwrap(),
            });
        }

        let declared_len = ((buf[1] as usize) << 8 | buf[2] as usize) + 2;
        if buf.len() < declared_len {
            return Err(FrameError::Truncated {
                declared: declared_len,
                actual: buf.len(),
            });
        }
        let buf = &buf[..declared_len];

        if buf[buf.len() - 1] != END_MARKER {
            return Err(FrameError::BadMarker {
                start: buf[0],
                end: buf[buf.len() - 1],
            });
        }

        let declared_checksum = buf[buf.len() - 2];
        let computed_checksum = checksum(&buf[..buf.len() - 2]);
        if declared_checksum != computed_checksum {
            return Err(FrameError::BadChecksum {
                expected: declared_checksum,
                computed: computed_checksum,
            });
        }

        let source = Endpoint {
            class: AddressClass::from_wire(buf[3])?,
            channel: buf[4],
            address: buf[5],
        };
        let destination = Endpoint {
            class: AddressClass::from_wire(buf[6])?,
            channel: buf[7],
            address: buf[8],
        };

        let flags = buf[9];
        let information = flags & 0x80 != 0;
        let version = (flags >> 5) & 0x03;
        let retry_count = (flags >> 3) & 0x03;

        let packet_type = PacketType::from_wire((buf[10] >> 4) & 0x0F)?;
        let data_type = DataType::from_wire(buf[10] & 0x0F)?;
        let packet_number = buf[11];
        let declared_count = buf[12] as usize;

        let mut messages = Vec::with_capacity(declared_count);
        let mut cursor = 13usize;
        let body_end = buf.len() - 2;
        for _ in 0..declared_count {
            if cursor + 3 > body_end {
                return Err(FrameError::BadLength(
                    "message record header runs past frame body".to_owned(),
                ));
            }
            let address = u16::from_be_bytes([buf[cursor], buf[cursor + 1]]);
            let kind = FieldKind::from_wire(buf[cursor + 2])?;
            cursor += 3;

            let width = match kind.fixed_width() {
                Some(w) => w,
                None => {
                    if cursor >= body_end {
                        return Err(FrameError::BadLength(
                            "STRING length preamble runs past frame body".to_owned(),
                        ));
                    }
                    let len = buf[cursor] as usize;
                    cursor += 1;
                    len
                }
            };
            if cursor + width > body_end {
                return Err(FrameError::BadLength(format!(
                    "message payload of width {width} runs past frame body"
                )));
            }
            let payload = buf[cursor..cursor + width].to_vec();
            cursor += width;
            messages.push(Message::new(address, kind, payload));
        }

        if messages.len() != declared_count {
            return Err(FrameError::BadLength(format!(
                "message count field ({declared_count}) disagrees with decoded count ({})",
                messages.len()
            )));
        }

        Ok(Frame {
            source,
            destination,
            information,
            version,
            retry_count,
            packet_type,
            data_type,
            packet_number,
            messages,
        })
    }

    /// Serialize back to wire bytes: length prefix, header, messages,
    /// checksum, end marker.
    pub fn serialize(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.push(self.source.class.to_wire());
        body.push(self.source.channel);
        body.push(self.source.address);
        body.push(self.destination.class.to_wire());
        body.push(self.destination.channel);
        body.push(self.destination.address);

        let flags = (u8::from(self.information) << 7)
            | ((self.version & 0x03) << 5)
            | ((self.retry_count & 0x03) << 3);
        body.push(flags);
        body.push((self.packet_type.to_wire() << 4) | self.data_type.to_wire());
        body.push(self.packet_number);
        body.push(self.messages.len() as u8);

        for msg in &self.messages {
            body.extend_from_slice(&msg.address.to_be_bytes());
            body.push(msg.field_kind.to_wire());
            if msg.field_kind.fixed_width().is_none() {
                body.push(msg.payload.len() as u8);
            }
            body.extend_from_slice(&msg.payload);
        }

        // total_length field = bytes from offset 3 onward, plus the checksum
        // and end marker that follow `body`; offset 1/2 encode (total - 2).
        let total_length = 3 + body.len() + 2;
        let mut out = Vec::with_capacity(total_length);
        out.push(START_MARKER);
        out.push((((total_length - 2) >> 8) & 0xFF) as u8);
        out.push(((total_length - 2) & 0xFF) as u8);
        out.extend_from_slice(&body);
        out.push(checksum(&out));
        out.push(END_MARKER);
        out
    }
}

/// Additive checksum over the declared range: the sum of every byte from
/// the start marker through the last message byte, truncated to `u8`. This
/// is the algorithm chosen to resolve `spec.md` §9 open question 1 (see
/// `DESIGN.md`); it matches the low-byte-of-sum convention used elsewhere in
/// this family of frame protocols.
fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> Frame {
        Frame {
            source: Endpoint {
                class: AddressClass::JIGTester,
                channel: 255,
                address: 0,
            },
            destination: Endpoint {
                class: AddressClass::BroadcastSetLayer,
                channel: 0,
                address: 32,
            },
            information: false,
            version: 2,
            retry_count: 0,
            packet_type: PacketType::Normal,
            data_type: DataType::Read,
            packet_number: DEFAULT_PACKET_NUMBER,
            messages: vec![Message::new(0x4203, FieldKind::I16, vec![0x00, 0xEB])],
        }
    }

    #[test]
    fn round_trip() {
        let frame = sample_frame();
        let bytes = frame.serialize();
        let decoded = Frame::parse(&bytes).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn bad_end_marker_rejected() {
        let frame = sample_frame();
        let mut bytes = frame.serialize();
        let last = bytes.len() - 1;
        bytes[last] = 0x33;
        assert!(matches!(
            Frame::parse(&bytes),
            Err(FrameError::BadMarker { .. })
        ));
    }

    #[test]
    fn bad_checksum_rejected() {
        let frame = sample_frame();
        let mut bytes = frame.serialize();
        let checksum_idx = bytes.len() - 2;
        bytes[checksum_idx] ^= 0xFF;
        assert!(matches!(
            Frame::parse(&bytes),
            Err(FrameError::BadChecksum { .. })
        ));
    }

    #[test]
    fn truncated_frame_rejected() {
        let frame = sample_frame();
        let bytes = frame.serialize();
        let short = &bytes[..bytes.len() - 3];
        assert!(matches!(
            Frame::parse(short),
            Err(FrameError::Truncated { .. })
        ));
    }

    #[test]
    fn message_count_matches_decoded_len() {
        let frame = sample_frame();
        let bytes = frame.serialize();
        let decoded = Frame::parse(&bytes).unwrap();
        assert_eq!(decoded.messages.len(), bytes[12] as usize);
    }

    #[test]
    fn string_message_round_trips_with_preamble() {
        let mut frame = sample_frame();
        frame.messages = vec![Message::new(
            0x9010,
            FieldKind::String,
            b"EHS".to_vec(),
        )];
        let bytes = frame.serialize();
        let decoded = Frame::parse(&bytes).unwrap();
        assert_eq!(decoded.messages[0].payload, b"EHS");
    }
}
