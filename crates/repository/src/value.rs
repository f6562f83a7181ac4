//! The decoded value type, replacing the original's dynamic dictionary-shaped
//! value store with an explicit tagged variant (`spec.md` §9 design note).

/// A decoded message value, after repository-driven conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    U8(u8),
    I16(i16),
    I32(i32),
    /// A converted numeric reading (after `forward_expr`, if any), rounded
    /// to 3 decimal places for publication per `spec.md` §4.3 step 3.
    Numeric(f64),
    Enum { id: i64, label: String },
    /// An enum id with no matching label — the miss is non-fatal per
    /// `spec.md` §4.3 step 4; the raw integer is carried forward.
    UnknownEnum(i64),
    Str(String),
    /// The address had no repository entry; the raw integer is carried
    /// forward per `spec.md` §4.3 step 1.
    Raw(i64),
}

impl Value {
    /// Render as a string suitable for a pub/sub payload.
    pub fn to_payload_string(&self) -> String {
        match self {
            Value::U8(v) => v.to_string(),
            Value::I16(v) => v.to_string(),
            Value::I32(v) => v.to_string(),
            Value::Numeric(v) => format!("{v}"),
            Value::Enum { label, .. } => label.clone(),
            Value::UnknownEnum(id) => id.to_string(),
            Value::Str(s) => s.clone(),
            Value::Raw(v) => v.to_string(),
        }
    }
}
