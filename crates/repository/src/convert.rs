//! Per-field value conversion (C3 "decode value" / "encode value",
//! `spec.md` §4.3), the half of the codec that needs the repository to give
//! an address meaning.

use bus_core::{FieldKind, Message};
use tracing::warn;

use crate::entry::{EntryKind, RepositoryEntry};
use crate::load::Repository;
use crate::value::Value;

/// Decode a parsed `Message` into a semantic `Value` using the repository.
/// Unknown addresses and unknown enum ids are non-fatal: the caller still
/// gets a usable `Value`, just a less specific one (`spec.md` §4.3 step 1/4).
pub fn decode_value(repo: &Repository, msg: &Message) -> Value {
    let Some(entry) = repo.by_address(msg.address) else {
        let raw = msg.raw_integer().unwrap_or(0);
        return Value::Raw(raw);
    };

    if msg.field_kind == FieldKind::String {
        return Value::Str(decode_string_field(&msg.payload));
    }

    let raw = match msg.raw_integer() {
        Ok(v) => v,
        Err(_) => return Value::Raw(0),
    };

    match &entry.kind {
        EntryKind::Enum(_) => match entry.label_of(raw) {
            Some(label) => Value::Enum {
                id: raw,
                label: label.to_owned(),
            },
            None => {
                warn!(variable = %entry.name, address = entry.address, raw, "enum value has no known label, publishing raw integer");
                Value::UnknownEnum(raw)
            }
        },
        EntryKind::U8 => match &entry.forward_expr {
            Some(expr) => Value::Numeric(round3(evaluate_or_raw(expr, raw))),
            None => Value::U8(raw as u8),
        },
        EntryKind::I16 => match &entry.forward_expr {
            Some(expr) => Value::Numeric(round3(evaluate_or_raw(expr, raw))),
            None => Value::I16(raw as i16),
        },
        EntryKind::I32 => match &entry.forward_expr {
            Some(expr) => Value::Numeric(round3(evaluate_or_raw(expr, raw))),
            None => Value::I32(raw as i32),
        },
        EntryKind::String => Value::Str(decode_string_field(&msg.payload)),
    }
}

/// `spec.md` §4.3 step 3: if `forward_expr` evaluation fails (e.g. an
/// identifier mismatch that validation somehow missed), fall back to the raw
/// integer rather than dropping the reading — this is the `BadExpression`
/// kind from the error taxonomy (§7): per-conversion, non-fatal.
fn evaluate_or_raw(expr: &bus_core::Expr, raw: i64) -> f64 {
    expr.eval_one("packed_value", raw as f64).unwrap_or(raw as f64)
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// STRING decoding per `spec.md` §4.3 step 2: printable ASCII `[0x20,0x7E]`
/// with `0x00`/`0xFF` mapped to space, trimmed; any other byte falls back to
/// a decimal-digit rendering of the raw bytes.
fn decode_string_field(payload: &[u8]) -> String {
    let printable = payload.iter().all(|&b| {
        (0x20..=0x7E).contains(&b) || b == 0x00 || b == 0xFF
    });
    if printable {
        let mapped: String = payload
            .iter()
            .map(|&b| if b == 0x00 || b == 0xFF { ' ' } else { b as char })
            .collect();
        mapped.trim().to_owned()
    } else {
        payload.iter().map(|b| b.to_string()).collect::<Vec<_>>().join("")
    }
}

/// The outcome of encoding a write value: the payload bytes, the wire kind
/// to tag the message with, and whether the value was degraded (clamped to
/// zero on overflow, per `spec.md` §4.3 step 3).
pub struct EncodedValue {
    pub field_kind: FieldKind,
    pub payload: Vec<u8>,
    pub degraded: bool,
}

#[derive(Debug, PartialEq)]
pub enum EncodeError {
    /// Neither an enum label match nor a parseable number.
    NotANumber(String),
    ExprError(bus_core::ExprError),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::NotANumber(s) => write!(f, "'{s}' is not a known enum label or number"),
            EncodeError::ExprError(e) => write!(f, "reverse_expr evaluation failed: {e}"),
        }
    }
}

impl std::error::Error for EncodeError {}

/// Encode a textual write value against a repository entry (`spec.md` §4.3
/// "Encode value").
pub fn encode_value(entry: &RepositoryEntry, text: &str) -> Result<EncodedValue, EncodeError> {
    // STRING writes use a minimal 4-byte zero payload; true string writes
    // are not supported (spec.md §4.3 step 3).
    if matches!(entry.kind, EntryKind::String) {
        return Ok(EncodedValue {
            field_kind: FieldKind::String,
            payload: vec![0, 0, 0, 0],
            degraded: false,
        });
    }

    let raw: i64 = if let EntryKind::Enum(_) = &entry.kind {
        if let Some(id) = entry.id_of(text) {
            id
        } else {
            parse_number(text)? as i64
        }
    } else if let Some(id) = entry.id_of(text) {
        id
    } else {
        let parsed = parse_number(text)?;
        match &entry.reverse_expr {
            Some(expr) => expr
                .eval_one("value", parsed)
                .map_err(EncodeError::ExprError)? as i64,
            None => parsed as i64,
        }
    };

    let (payload, degraded) = Message::pack_numeric(entry.kind.wire_kind(), raw);
    Ok(EncodedValue {
        field_kind: entry.kind.wire_kind(),
        payload,
        degraded,
    })
}

fn parse_number(text: &str) -> Result<f64, EncodeError> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| EncodeError::NotANumber(text.to_owned()))
}
