//! The `Message` type: one addressed field inside a `Frame` (§3, §6).

use crate::error::FrameError;

/// On-wire field kind tag. Numeric kinds also fix the payload width;
/// `String` carries its own length preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    U8,
    I16,
    I32,
    String,
}

impl FieldKind {
    pub fn from_wire(byte: u8) -> Result<Self, FrameError> {
        match byte {
            0 => Ok(FieldKind::U8),
            1 => Ok(FieldKind::I16),
            2 => Ok(FieldKind::I32),
            3 => Ok(FieldKind::String),
            other => Err(FrameError::BadFieldKind(other)),
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            FieldKind::U8 => 0,
            FieldKind::I16 => 1,
            FieldKind::I32 => 2,
            FieldKind::String => 3,
        }
    }

    /// Fixed payload width in bytes, or `None` for `String` (variable, carries
    /// its own length preamble).
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            FieldKind::U8 => Some(1),
            FieldKind::I16 => Some(2),
            FieldKind::I32 => Some(4),
            FieldKind::String => None,
        }
    }
}

/// One addressed field within a frame: a wire address, its declared kind,
/// and the raw (not-yet-converted) payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub address: u16,
    pub field_kind: FieldKind,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(address: u16, field_kind: FieldKind, payload: Vec<u8>) -> Self {
        Message {
            address,
            field_kind,
            payload,
        }
    }

    /// Interpret the payload as a big-endian integer: unsigned for `U8`,
    /// signed for `I16`/`I32`. Panics (via `unreachable!`) on `String`, since
    /// callers must special-case string decoding before reaching here — this
    /// mirrors the codec contract in `spec.md` §4.3 step 3, which only
    /// applies to "numeric kinds".
    pub fn raw_integer(&self) -> Result<i64, FrameError> {
        match self.field_kind {
            FieldKind::U8 => {
                let b = *self
                    .payload
                    .first()
                    .ok_or_else(|| FrameError::BadLength("U8 payload empty".to_owned()))?;
                Ok(b as i64)
            }
            FieldKind::I16 => {
                let bytes: [u8; 2] = self.payload.as_slice().try_into().map_err(|_| {
                    FrameError::BadLength(format!(
                        "I16 payload must be 2 bytes, got {}",
                        self.payload.len()
                    ))
                })?;
                Ok(i16::from_be_bytes(bytes) as i64)
            }
            FieldKind::I32 => {
                let bytes: [u8; 4] = self.payload.as_slice().try_into().map_err(|_| {
                    FrameError::BadLength(format!(
                        "I32 payload must be 4 bytes, got {}",
                        self.payload.len()
                    ))
                })?;
                Ok(i32::from_be_bytes(bytes) as i64)
            }
            FieldKind::String => Err(FrameError::BadLength(
                "raw_integer called on a STRING message".to_owned(),
            )),
        }
    }

    /// Pack a signed integer into the width implied by `kind`, clamping to
    /// zero on overflow per `spec.md` §4.3 step 3 ("on overflow, substitute
    /// 0 and mark the operation as degraded"). Returns whether the value was
    /// degraded.
    pub fn pack_numeric(kind: FieldKind, value: i64) -> (Vec<u8>, bool) {
        match kind {
            FieldKind::U8 => {
                if (0..=u8::MAX as i64).contains(&value) {
                    (vec![value as u8], false)
                } else {
                    (vec![0u8], true)
                }
            }
            FieldKind::I16 => {
                if (i16::MIN as i64..=i16::MAX as i64).contains(&value) {
                    ((value as i16).to_be_bytes().to_vec(), false)
                } else {
                    (0i16.to_be_bytes().to_vec(), true)
                }
            }
            FieldKind::I32 => {
                if (i32::MIN as i64..=i32::MAX as i64).contains(&value) {
                    ((value as i32).to_be_bytes().to_vec(), false)
                } else {
                    (0i32.to_be_bytes().to_vec(), true)
                }
            }
            FieldKind::String => {
                // Used only for read-request framing of string fields; true
                // string writes are not supported (spec.md §4.3 step 3).
                (vec![0, 0, 0, 0], false)
            }
        }
    }
}
