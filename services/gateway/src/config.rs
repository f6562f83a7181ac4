//! Gateway configuration loading.
//!
//! TOML is the sole config source; no environment variable overrides beyond
//! the `--config`/`--dump`/`--dry-run`/`--verbose` CLI flags (`spec.md` §6).
//! Default config path: `/etc/ehs-gateway/gateway.toml`.
//!
//! # Required fields
//! - `repository_path`
//! - `transport.kind` (`"serial"` or `"tcp"`)
//! - at least one `[[polling_group]]`

use std::path::Path;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Config types (validated, with defaults applied)
// ---------------------------------------------------------------------------

/// Top-level gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub repository_path: String,
    pub transport: TransportConfig,
    pub pubsub: PubSubConfig,
    pub control: ControlConfig,
    pub quality: QualityConfig,
    pub polling_groups: Vec<PollingGroupConfig>,
}

#[derive(Debug, Clone)]
pub enum TransportConfig {
    Serial { path: String, baud_rate: u32 },
    Tcp { host: String, port: u16 },
}

#[derive(Debug, Clone)]
pub struct PubSubConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    /// Topic prefix for `<prefix>/entity/<name>` (`spec.md` §6).
    pub prefix: String,
    pub discovery_root: String,
    pub platform: String,
    pub device_id: String,
}

#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// `spec.md` §4.8: pending writes expire after this many seconds.
    pub command_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct QualityConfig {
    pub snapshot_path: String,
    /// `spec.md` §4.6: 0.15 default.
    pub alert_threshold: f64,
    /// `spec.md` §4.6: 0.05 default.
    pub report_threshold: f64,
}

#[derive(Debug, Clone)]
pub struct PollingGroupConfig {
    pub name: String,
    pub cadence_seconds: u64,
    pub variables: Vec<String>,
}

// ---------------------------------------------------------------------------
// Raw TOML deserialization types (all-`Option`, per `spec.md` ambient-stack note)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawConfig {
    repository_path: Option<String>,
    transport: Option<RawTransportConfig>,
    pubsub: Option<RawPubSubConfig>,
    control: Option<RawControlConfig>,
    quality: Option<RawQualityConfig>,
    #[serde(default, rename = "polling_group")]
    polling_groups: Vec<RawPollingGroupConfig>,
}

#[derive(Debug, Deserialize)]
struct RawTransportConfig {
    kind: Option<String>,
    serial_path: Option<String>,
    baud_rate: Option<u32>,
    tcp_host: Option<String>,
    tcp_port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct RawPubSubConfig {
    broker_host: Option<String>,
    broker_port: Option<u16>,
    client_id: Option<String>,
    prefix: Option<String>,
    discovery_root: Option<String>,
    platform: Option<String>,
    device_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawControlConfig {
    command_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawQualityConfig {
    snapshot_path: Option<String>,
    alert_threshold: Option<f64>,
    report_threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawPollingGroupConfig {
    name: Option<String>,
    cadence_seconds: Option<u64>,
    #[serde(default)]
    variables: Vec<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub const DEFAULT_CONFIG_PATH: &str = "/etc/ehs-gateway/gateway.toml";

pub fn load_config_from_path(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {e}", path.display())))?;
    load_config_from_str(&toml_str)
}

pub fn load_config() -> Result<GatewayConfig, ConfigError> {
    load_config_from_path(Path::new(DEFAULT_CONFIG_PATH))
}

pub fn load_config_from_str(toml_str: &str) -> Result<GatewayConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let repository_path = raw
        .repository_path
        .ok_or_else(|| ConfigError::MissingField("repository_path".to_owned()))?;

    let raw_transport = raw
        .transport
        .ok_or_else(|| ConfigError::MissingField("transport".to_owned()))?;
    let transport = match raw_transport.kind.as_deref() {
        Some("serial") => TransportConfig::Serial {
            path: raw_transport.serial_path.ok_or_else(|| {
                ConfigError::MissingField("transport.serial_path".to_owned())
            })?,
            baud_rate: raw_transport.baud_rate.unwrap_or(9600),
        },
        Some("tcp") => TransportConfig::Tcp {
            host: raw_transport
                .tcp_host
                .ok_or_else(|| ConfigError::MissingField("transport.tcp_host".to_owned()))?,
            port: raw_transport.tcp_port.unwrap_or(4196),
        },
        Some(other) => {
            return Err(ConfigError::InvalidValue(format!(
                "transport.kind must be 'serial' or 'tcp', got '{other}'"
            )));
        }
        None => return Err(ConfigError::MissingField("transport.kind".to_owned())),
    };

    let raw_pubsub = raw.pubsub.unwrap_or(RawPubSubConfig {
        broker_host: None,
        broker_port: None,
        client_id: None,
        prefix: None,
        discovery_root: None,
        platform: None,
        device_id: None,
    });
    let pubsub = PubSubConfig {
        broker_host: raw_pubsub.broker_host.unwrap_or_else(|| "localhost".to_owned()),
        broker_port: raw_pubsub.broker_port.unwrap_or(1883),
        client_id: raw_pubsub.client_id.unwrap_or_else(|| "ehs-gateway".to_owned()),
        prefix: raw_pubsub.prefix.unwrap_or_else(|| "ehsgateway".to_owned()),
        discovery_root: raw_pubsub
            .discovery_root
            .unwrap_or_else(|| "homeassistant".to_owned()),
        platform: raw_pubsub.platform.unwrap_or_else(|| "sensor".to_owned()),
        device_id: raw_pubsub.device_id.unwrap_or_else(|| "ehs".to_owned()),
    };

    let control = match raw.control {
        Some(c) => ControlConfig {
            command_timeout_secs: c.command_timeout_secs.unwrap_or(30),
        },
        None => ControlConfig {
            command_timeout_secs: 30,
        },
    };

    let quality = match raw.quality {
        Some(q) => QualityConfig {
            snapshot_path: q
                .snapshot_path
                .unwrap_or_else(|| "/var/lib/ehs-gateway/quality.json".to_owned()),
            alert_threshold: q.alert_threshold.unwrap_or(0.15),
            report_threshold: q.report_threshold.unwrap_or(0.05),
        },
        None => QualityConfig {
            snapshot_path: "/var/lib/ehs-gateway/quality.json".to_owned(),
            alert_threshold: 0.15,
            report_threshold: 0.05,
        },
    };

    if raw.polling_groups.is_empty() {
        return Err(ConfigError::InvalidValue(
            "at least one [[polling_group]] entry is required".to_owned(),
        ));
    }
    let mut polling_groups = Vec::with_capacity(raw.polling_groups.len());
    for (i, g) in raw.polling_groups.into_iter().enumerate() {
        let name = g
            .name
            .ok_or_else(|| ConfigError::MissingField(format!("polling_group[{i}].name")))?;
        let cadence_seconds = g.cadence_seconds.ok_or_else(|| {
            ConfigError::MissingField(format!("polling_group[{i}].cadence_seconds"))
        })?;
        if g.variables.is_empty() {
            return Err(ConfigError::InvalidValue(format!(
                "polling_group[{i}] ('{name}') has no variables"
            )));
        }
        polling_groups.push(PollingGroupConfig {
            name,
            cadence_seconds,
            variables: g.variables,
        });
    }

    Ok(GatewayConfig {
        repository_path,
        transport,
        pubsub,
        control,
        quality,
        polling_groups,
    })
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    MissingField(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(s) => write!(f, "IO error: {s}"),
            ConfigError::Parse(s) => write!(f, "parse error: {s}"),
            ConfigError::MissingField(s) => write!(f, "missing required field: {s}"),
            ConfigError::InvalidValue(s) => write!(f, "invalid config value: {s}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
repository_path = "/etc/ehs-gateway/repository.yml"

[transport]
kind = "tcp"
tcp_host = "192.168.1.50"

[[polling_group]]
name = "live_data"
cadence_seconds = 10
variables = ["NASA_OUTDOOR_TW1_TEMP", "NASA_OUTDOOR_TW2_TEMP"]

[[polling_group]]
name = "settings"
cadence_seconds = 300
variables = ["VAR_IN_FSV_1031"]
"#;

    #[test]
    fn loads_minimal_config_with_defaults() {
        let cfg = load_config_from_str(SAMPLE).unwrap();
        assert!(matches!(cfg.transport, TransportConfig::Tcp { port: 4196, .. }));
        assert_eq!(cfg.quality.alert_threshold, 0.15);
        assert_eq!(cfg.control.command_timeout_secs, 30);
        assert_eq!(cfg.polling_groups.len(), 2);
    }

    #[test]
    fn missing_repository_path_is_fatal() {
        let doc = r#"
[transport]
kind = "tcp"
tcp_host = "x"

[[polling_group]]
name = "g"
cadence_seconds = 1
variables = ["A"]
"#;
        assert!(matches!(
            load_config_from_str(doc),
            Err(ConfigError::MissingField(_))
        ));
    }

    #[test]
    fn unknown_transport_kind_is_fatal() {
        let doc = r#"
repository_path = "x"
[transport]
kind = "usb"

[[polling_group]]
name = "g"
cadence_seconds = 1
variables = ["A"]
"#;
        assert!(matches!(
            load_config_from_str(doc),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn empty_polling_groups_is_fatal() {
        let doc = r#"
repository_path = "x"
[transport]
kind = "tcp"
tcp_host = "x"
"#;
        assert!(matches!(
            load_config_from_str(doc),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn serial_transport_parses_with_default_baud() {
        let doc = r#"
repository_path = "x"
[transport]
kind = "serial"
serial_path = "/dev/ttyUSB0"

[[polling_group]]
name = "g"
cadence_seconds = 1
variables = ["A"]
"#;
        let cfg = load_config_from_str(doc).unwrap();
        assert!(matches!(
            cfg.transport,
            TransportConfig::Serial { baud_rate: 9600, .. }
        ));
    }
}
