//! The repository entry schema (C2, `spec.md` §3).

use std::collections::BTreeMap;

use bus_core::FieldKind;

/// The declared kind of a repository entry. Distinct from `bus_core::FieldKind`:
/// this is the *semantic* kind (an `Enum` entry still rides on an integer
/// wire kind), where `FieldKind` is purely the wire tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    U8,
    I16,
    I32,
    String,
    /// An enum entry, with the wire-level integer kind it's packed as.
    Enum(FieldKind),
}

impl EntryKind {
    /// The wire-level `field_kind` tag this entry is encoded/decoded as.
    pub fn wire_kind(&self) -> FieldKind {
        match self {
            EntryKind::U8 => FieldKind::U8,
            EntryKind::I16 => FieldKind::I16,
            EntryKind::I32 => FieldKind::I32,
            EntryKind::String => FieldKind::String,
            EntryKind::Enum(k) => *k,
        }
    }
}

/// One immutable entry in the loaded repository (`spec.md` §3).
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryEntry {
    pub name: String,
    pub address: u16,
    pub kind: EntryKind,
    pub unit: Option<String>,
    pub forward_expr: Option<bus_core::Expr>,
    pub reverse_expr: Option<bus_core::Expr>,
    /// Bijection between small non-negative integers and labels, present
    /// only for `EntryKind::Enum`.
    pub enum_map: Option<BTreeMap<i64, String>>,
    pub writable: bool,
}

impl RepositoryEntry {
    /// Look up a label by its enum id, if this entry is an enum entry.
    pub fn label_of(&self, id: i64) -> Option<&str> {
        self.enum_map.as_ref()?.get(&id).map(String::as_str)
    }

    /// Look up an enum id by its label, if this entry is an enum entry.
    pub fn id_of(&self, label: &str) -> Option<i64> {
        self.enum_map
            .as_ref()?
            .iter()
            .find(|(_, v)| v.as_str() == label)
            .map(|(k, _)| *k)
    }
}
