//! TOML-based configuration for Reticulum nodes.
//!
//! ```toml
//! [transport]
//! enable_transport = true
//!
//! [node]
//! storage_path = "/var/lib/reticulum"
//! persist_interval = 300
//! tick_interval = 0.25
//!
//! [logging]
//! level = "debug"
//! json = false
//!
//! [[interfaces]]
//! name = "LoRa 868"
//! mode = "access_point"
//! bitrate = 1200
//! announce_rate_target = 3600
//! ```
//!
//! Interface drivers live outside the node. An `[[interfaces]]` entry is the
//! profile applied when a driver attaches under the same name.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use reticulum_transport::announce::ANNOUNCE_CAP;
use reticulum_transport::error::PathError;
use reticulum_transport::interface::AnnounceRateConfig;
use reticulum_transport::{InterfaceInfo, InterfaceMode, InterfaceRole, TransportConfig};

use crate::error::ConfigError;

/// Top-level node configuration loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub interfaces: Vec<InterfaceEntry>,
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let tick = self.node.tick_interval;
        if tick.is_nan() || tick <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "tick_interval must be positive, got {tick}"
            )));
        }
        let mut names = HashSet::new();
        for entry in &self.interfaces {
            if !names.insert(entry.name.as_str()) {
                return Err(entry.invalid("duplicate interface name"));
            }
            entry.to_info()?;
        }
        Ok(())
    }

    /// The profile for an interface attached as `name`.
    pub fn interface(&self, name: &str) -> Option<&InterfaceEntry> {
        self.interfaces.iter().find(|entry| entry.name == name)
    }
}

/// The `[node]` section.
#[derive(Debug, Deserialize)]
pub struct NodeSection {
    /// Custom storage directory path. Defaults to `~/.reticulum/storage`.
    pub storage_path: Option<String>,
    /// Whether to enable persistent storage. Default: true.
    #[serde(default = "default_enable_storage")]
    pub enable_storage: bool,
    /// Interval in seconds between periodic state persistence. 0 disables. Default: 300.
    #[serde(default = "default_persist_interval")]
    pub persist_interval: u64,
    /// Seconds between engine ticks. Default: 0.25.
    #[serde(default = "default_tick_interval")]
    pub tick_interval: f64,
}

fn default_enable_storage() -> bool {
    true
}

fn default_persist_interval() -> u64 {
    300
}

fn default_tick_interval() -> f64 {
    0.25
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            storage_path: None,
            enable_storage: default_enable_storage(),
            persist_interval: default_persist_interval(),
            tick_interval: default_tick_interval(),
        }
    }
}

impl NodeSection {
    /// Where state is kept, or `None` when storage is disabled or no home
    /// directory can be found.
    pub fn storage_dir(&self) -> Option<PathBuf> {
        if !self.enable_storage {
            return None;
        }
        match &self.storage_path {
            Some(path) => Some(PathBuf::from(path)),
            None => dirs::home_dir().map(|home| home.join(".reticulum").join("storage")),
        }
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(self.tick_interval)
    }

    pub fn persist_period(&self) -> Option<Duration> {
        (self.persist_interval > 0).then(|| Duration::from_secs(self.persist_interval))
    }
}

/// The `[logging]` section.
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// An `[[interfaces]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct InterfaceEntry {
    pub name: String,
    #[serde(default = "default_mode_str")]
    pub mode: String,
    #[serde(default)]
    pub role: InterfaceRole,
    /// Bits per second; enables the announce bandwidth cap.
    pub bitrate: Option<u64>,
    #[serde(default = "default_announce_cap")]
    pub announce_cap: f64,
    /// Minimum seconds between announces for one destination.
    pub announce_rate_target: Option<f64>,
    #[serde(default)]
    pub announce_rate_grace: u32,
    #[serde(default)]
    pub announce_rate_penalty: f64,
    #[serde(default = "default_true")]
    pub inbound: bool,
    #[serde(default = "default_true")]
    pub outbound: bool,
    /// Synthesize a tunnel when the interface attaches.
    #[serde(default)]
    pub tunnel: bool,
}

fn default_mode_str() -> String {
    "full".to_string()
}

fn default_announce_cap() -> f64 {
    ANNOUNCE_CAP
}

fn default_true() -> bool {
    true
}

impl InterfaceEntry {
    /// The engine-side description of this interface.
    pub fn to_info(&self) -> Result<InterfaceInfo, ConfigError> {
        let mode: InterfaceMode = self
            .mode
            .parse()
            .map_err(|e: PathError| self.invalid(&e.to_string()))?;
        let cap = self.announce_cap;
        if cap.is_nan() || cap <= 0.0 || cap > 1.0 {
            return Err(self.invalid("announce_cap must be in (0, 1]"));
        }
        if !self.inbound && !self.outbound {
            return Err(self.invalid("interface must be inbound, outbound or both"));
        }

        let mut info = InterfaceInfo::new(self.name.clone())
            .with_mode(mode)
            .with_role(self.role);
        if let Some(bitrate) = self.bitrate {
            info = info.with_bitrate(bitrate);
        }
        if let Some(target) = self.announce_rate_target {
            info = info.with_announce_rate(AnnounceRateConfig {
                target,
                grace: self.announce_rate_grace,
                penalty: self.announce_rate_penalty,
            });
        }
        info.announce_cap = self.announce_cap;
        info.inbound = self.inbound;
        info.outbound = self.outbound;
        info.wants_tunnel = self.tunnel;
        Ok(info)
    }

    fn invalid(&self, reason: &str) -> ConfigError {
        ConfigError::Interface {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let config = NodeConfig::parse("").unwrap();
        assert!(!config.transport.enable_transport);
        assert!(config.transport.use_implicit_proof);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        assert_eq!(config.node.persist_interval, 300);
        assert_eq!(config.node.tick_interval, 0.25);
        assert!(config.node.enable_storage);
        assert!(config.interfaces.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[transport]
enable_transport = true
path_table_max_size = 5000
use_implicit_proof = false

[node]
storage_path = "/tmp/rns"
persist_interval = 60
tick_interval = 0.5

[logging]
level = "debug"
json = true

[[interfaces]]
name = "LoRa"
mode = "access_point"
bitrate = 1200
announce_cap = 0.05
announce_rate_target = 3600
announce_rate_grace = 2
announce_rate_penalty = 7200

[[interfaces]]
name = "Client"
role = "local_client"

[[interfaces]]
name = "Uplink"
mode = "gw"
role = "shared_instance"
inbound = true
outbound = true
tunnel = true
"#;
        let config = NodeConfig::parse(toml).unwrap();
        assert!(config.transport.enable_transport);
        assert_eq!(config.transport.path_table_max_size, 5000);
        assert!(!config.transport.use_implicit_proof);
        assert_eq!(config.node.storage_dir(), Some(PathBuf::from("/tmp/rns")));
        assert_eq!(config.node.persist_period(), Some(Duration::from_secs(60)));
        assert_eq!(config.node.tick_period(), Duration::from_millis(500));
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(config.interfaces.len(), 3);

        let lora = config.interface("LoRa").unwrap().to_info().unwrap();
        assert_eq!(lora.mode, InterfaceMode::AccessPoint);
        assert_eq!(lora.bitrate, Some(1200));
        assert_eq!(lora.announce_cap, 0.05);
        let rate = lora.announce_rate.unwrap();
        assert_eq!(rate.target, 3600.0);
        assert_eq!(rate.grace, 2);
        assert_eq!(rate.penalty, 7200.0);

        let client = config.interface("Client").unwrap().to_info().unwrap();
        assert_eq!(client.role, InterfaceRole::LocalClient);
        assert_eq!(client.mode, InterfaceMode::Full);
        assert!(client.announce_rate.is_none());

        let uplink = config.interface("Uplink").unwrap().to_info().unwrap();
        assert_eq!(uplink.mode, InterfaceMode::Gateway);
        assert_eq!(uplink.role, InterfaceRole::SharedInstance);
        assert!(uplink.wants_tunnel);
    }

    #[test]
    fn interface_defaults() {
        let config = NodeConfig::parse("[[interfaces]]\nname = \"eth0\"\n").unwrap();
        let info = config.interface("eth0").unwrap().to_info().unwrap();
        assert_eq!(info, InterfaceInfo::new("eth0"));
        assert!(config.interface("eth1").is_none());
    }

    #[test]
    fn disabled_storage_has_no_dir() {
        let config = NodeConfig::parse("[node]\nenable_storage = false\n").unwrap();
        assert!(config.node.storage_dir().is_none());
    }

    #[test]
    fn zero_persist_interval_disables_persistence() {
        let config = NodeConfig::parse("[node]\npersist_interval = 0\n").unwrap();
        assert!(config.node.persist_period().is_none());
    }

    // ================================================================== //
    // Config parsing failure paths
    // ================================================================== //

    #[test]
    fn test_parse_malformed_toml() {
        assert!(matches!(NodeConfig::parse("[node"), Err(ConfigError::Parse(_))));
        assert!(NodeConfig::parse("[node]\npersist_interval = ").is_err());
        assert!(NodeConfig::parse("= value").is_err());
    }

    #[test]
    fn test_parse_wrong_field_types() {
        let toml = r#"
[transport]
enable_transport = "yes"
"#;
        assert!(NodeConfig::parse(toml).is_err());
    }

    #[test]
    fn test_unknown_interface_mode() {
        let toml = r#"
[[interfaces]]
name = "mesh0"
mode = "mesh"
"#;
        match NodeConfig::parse(toml) {
            Err(ConfigError::Interface { name, .. }) => assert_eq!(name, "mesh0"),
            other => panic!("expected interface error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_interface_role() {
        let toml = r#"
[[interfaces]]
name = "x"
role = "satellite"
"#;
        assert!(matches!(NodeConfig::parse(toml), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_duplicate_interface_names() {
        let toml = r#"
[[interfaces]]
name = "eth0"

[[interfaces]]
name = "eth0"
mode = "roaming"
"#;
        assert!(matches!(
            NodeConfig::parse(toml),
            Err(ConfigError::Interface { .. })
        ));
    }

    #[test]
    fn test_interface_without_direction() {
        let toml = r#"
[[interfaces]]
name = "dead"
inbound = false
outbound = false
"#;
        assert!(NodeConfig::parse(toml).is_err());
    }

    #[test]
    fn test_announce_cap_out_of_range() {
        assert!(NodeConfig::parse("[[interfaces]]\nname = \"a\"\nannounce_cap = 0.0\n").is_err());
        assert!(NodeConfig::parse("[[interfaces]]\nname = \"a\"\nannounce_cap = 1.5\n").is_err());
    }

    #[test]
    fn test_non_positive_tick_interval() {
        assert!(matches!(
            NodeConfig::parse("[node]\ntick_interval = 0.0\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        match NodeConfig::load(&path) {
            Err(ConfigError::Read { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected read error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[transport]\nenable_transport = true\n").unwrap();
        let config = NodeConfig::load(&path).unwrap();
        assert!(config.transport.enable_transport);
    }
}
