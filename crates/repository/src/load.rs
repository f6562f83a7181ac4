//! Loading and validating the repository document (C2, `spec.md` §4.2).
//!
//! TOML is the ambient service-config format (see `GatewayConfig`), but the
//! repository itself is a large generated data table, so it is expressed as
//! YAML — the same shape as the original's `NasaRepository.yml`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use bus_core::{Expr, FieldKind};
use serde::Deserialize;

use crate::entry::{EntryKind, RepositoryEntry};

/// All repository entries, indexed for both lookup directions named in
/// `spec.md` §4.2: by symbolic name and by wire address.
#[derive(Debug)]
pub struct Repository {
    by_name: HashMap<String, RepositoryEntry>,
    by_address: HashMap<u16, String>,
}

impl Repository {
    pub fn load_from_path(path: &Path) -> Result<Self, RepositoryError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RepositoryError::Io(format!("reading '{}': {e}", path.display())))?;
        Self::load_from_str(&content)
    }

    pub fn load_from_str(yaml: &str) -> Result<Self, RepositoryError> {
        let raw: RawRepository =
            serde_yaml::from_str(yaml).map_err(|e| RepositoryError::Parse(e.to_string()))?;

        let mut by_name = HashMap::with_capacity(raw.entries.len());
        let mut by_address = HashMap::with_capacity(raw.entries.len());

        for raw_entry in raw.entries {
            let entry = validate_entry(raw_entry)?;
            if by_address.contains_key(&entry.address) {
                return Err(RepositoryError::ConfigInvalid(format!(
                    "duplicate address {:#06x} (entry '{}')",
                    entry.address, entry.name
                )));
            }
            by_address.insert(entry.address, entry.name.clone());
            by_name.insert(entry.name.clone(), entry);
        }

        Ok(Repository { by_name, by_address })
    }

    pub fn by_name(&self, name: &str) -> Option<&RepositoryEntry> {
        self.by_name.get(name)
    }

    pub fn by_address(&self, address: u16) -> Option<&RepositoryEntry> {
        self.by_address.get(&address).and_then(|n| self.by_name.get(n))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Raw (pre-validation) deserialization shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawRepository {
    entries: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    name: String,
    address: u16,
    kind: String,
    unit: Option<String>,
    forward_expr: Option<String>,
    reverse_expr: Option<String>,
    enum_map: Option<BTreeMap<i64, String>>,
    /// Wire width backing an `ENUM` entry: "U8", "I16", or "I32". Defaults
    /// to "U8", the narrowest width that fits the single-byte status codes
    /// the original repository's enum entries overwhelmingly use.
    enum_width: Option<String>,
    #[serde(default)]
    writable: bool,
}

fn validate_entry(raw: RawEntry) -> Result<RepositoryEntry, RepositoryError> {
    let kind = match raw.kind.as_str() {
        "U8" => EntryKind::U8,
        "I16" => EntryKind::I16,
        "I32" => EntryKind::I32,
        "STRING" => EntryKind::String,
        "ENUM" => {
            let width = match raw.enum_width.as_deref().unwrap_or("U8") {
                "U8" => FieldKind::U8,
                "I16" => FieldKind::I16,
                "I32" => FieldKind::I32,
                other => {
                    return Err(RepositoryError::ConfigInvalid(format!(
                        "entry '{}': invalid enum_width '{}'",
                        raw.name, other
                    )));
                }
            };
            EntryKind::Enum(width)
        }
        other => {
            return Err(RepositoryError::ConfigInvalid(format!(
                "entry '{}': unknown kind '{}'",
                raw.name, other
            )));
        }
    };

    if matches!(kind, EntryKind::Enum(_)) {
        let map = raw.enum_map.as_ref().ok_or_else(|| {
            RepositoryError::ConfigInvalid(format!(
                "entry '{}': ENUM kind requires enum_map",
                raw.name
            ))
        })?;
        if map.is_empty() {
            return Err(RepositoryError::ConfigInvalid(format!(
                "entry '{}': enum_map must not be empty",
                raw.name
            )));
        }
        let mut seen_labels = std::collections::HashSet::new();
        for (id, label) in map {
            if *id < 0 {
                return Err(RepositoryError::ConfigInvalid(format!(
                    "entry '{}': enum_map key {} must be non-negative",
                    raw.name, id
                )));
            }
            if !seen_labels.insert(label.as_str()) {
                return Err(RepositoryError::ConfigInvalid(format!(
                    "entry '{}': enum_map label '{}' is not unique",
                    raw.name, label
                )));
            }
        }
    }

    let forward_expr = raw
        .forward_expr
        .as_deref()
        .map(Expr::parse)
        .transpose()
        .map_err(|e| {
            RepositoryError::ConfigInvalid(format!(
                "entry '{}': forward_expr invalid: {e}",
                raw.name
            ))
        })?;
    let reverse_expr = raw
        .reverse_expr
        .as_deref()
        .map(Expr::parse)
        .transpose()
        .map_err(|e| {
            RepositoryError::ConfigInvalid(format!(
                "entry '{}': reverse_expr invalid: {e}",
                raw.name
            ))
        })?;

    Ok(RepositoryEntry {
        name: raw.name,
        address: raw.address,
        kind,
        unit: raw.unit,
        forward_expr,
        reverse_expr,
        enum_map: raw.enum_map,
        writable: raw.writable,
    })
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum RepositoryError {
    Io(String),
    Parse(String),
    ConfigInvalid(String),
}

impl std::fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepositoryError::Io(s) => write!(f, "repository IO error: {s}"),
            RepositoryError::Parse(s) => write!(f, "repository parse error: {s}"),
            RepositoryError::ConfigInvalid(s) => write!(f, "invalid repository: {s}"),
        }
    }
}

impl std::error::Error for RepositoryError {}
