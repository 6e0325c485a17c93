//! TOML-based configuration for umesh nodes.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use umesh_core::constants::{EUI48_LEN, NETWORK_ID_LEN, UUID_LEN};
use umesh_core::types::{Eui48, MacAddress, NetworkId, Uuid};
use umesh_transport::AllocatorMode;

use crate::error::NodeError;
use crate::mesh::{MAX_CHILDREN, MeshConfig, WhitelistSeed};

/// Top-level node configuration loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub link: LinkSection,
    #[serde(default)]
    pub whitelist: WhitelistSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("failed to read config file: {e}")))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(format!("failed to parse config: {e}")))
    }

    /// Resolve the mesh-instance settings.
    ///
    /// A missing MAC is generated (locally administered, unicast); a missing
    /// UUID is derived from the MAC.
    pub fn mesh_config(&self) -> Result<MeshConfig, NodeError> {
        let mac = match &self.node.mac {
            Some(s) => Eui48::new(parse_hex::<EUI48_LEN>("node.mac", s)?),
            None => {
                let mac = random_mac();
                tracing::info!(%mac, "no MAC configured, generated one");
                mac
            }
        };
        let uuid = match &self.node.uuid {
            Some(s) => Uuid::new(parse_hex::<UUID_LEN>("node.uuid", s)?),
            None => uuid_from_mac(&mac),
        };
        let network_id = NetworkId::new(parse_hex::<NETWORK_ID_LEN>(
            "node.network_id",
            &self.node.network_id,
        )?);

        if !(1..=MAX_CHILDREN).contains(&self.node.max_children) {
            return Err(NodeError::Config(format!(
                "node.max_children must be 1..={MAX_CHILDREN}, got {}",
                self.node.max_children
            )));
        }

        let whitelist = self
            .whitelist
            .entries
            .iter()
            .map(|entry| -> Result<WhitelistSeed, NodeError> {
                let bytes = hex::decode(entry.mac.replace(':', "")).map_err(|e| {
                    NodeError::Config(format!("invalid whitelist mac '{}': {e}", entry.mac))
                })?;
                Ok(WhitelistSeed {
                    address: MacAddress::new(&bytes)?,
                    rssi: entry.rssi,
                })
            })
            .collect::<Result<Vec<_>, NodeError>>()?;

        Ok(MeshConfig {
            uuid,
            mac,
            network_id,
            leader: self.node.leader,
            allocator_mode: self.node.allocator_mode.into(),
            max_children: self.node.max_children,
            whitelist_enabled: self.whitelist.enabled,
            whitelist,
        })
    }
}

/// The `[node]` section.
#[derive(Debug, Deserialize)]
pub struct NodeSection {
    /// 8-byte hex UUID. Defaults to the MAC followed by two zero bytes.
    pub uuid: Option<String>,
    /// 6-byte hex MAC, colons allowed.
    pub mac: Option<String>,
    #[serde(default = "default_network_id")]
    pub network_id: String,
    /// Start as the mesh leader holding SID 0x0000.
    #[serde(default)]
    pub leader: bool,
    #[serde(default)]
    pub allocator_mode: AllocatorModeName,
    #[serde(default = "default_max_children")]
    pub max_children: u16,
    /// Directory for the persistent config record. Defaults to `<data_dir>/umesh`.
    pub storage_path: Option<String>,
}

fn default_network_id() -> String {
    "000000000001".to_string()
}

fn default_max_children() -> u16 {
    MAX_CHILDREN
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            uuid: None,
            mac: None,
            network_id: default_network_id(),
            leader: false,
            allocator_mode: AllocatorModeName::default(),
            max_children: default_max_children(),
            storage_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocatorModeName {
    #[default]
    Sequential,
    Random,
}

impl From<AllocatorModeName> for AllocatorMode {
    fn from(name: AllocatorModeName) -> Self {
        match name {
            AllocatorModeName::Sequential => AllocatorMode::Sequential,
            AllocatorModeName::Random => AllocatorMode::Random,
        }
    }
}

/// The `[link]` section: the UDP socket standing in for the radio.
#[derive(Debug, Deserialize)]
pub struct LinkSection {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_broadcast")]
    pub broadcast: String,
    /// Discovery beacon period. 0 disables beacons.
    #[serde(default = "default_beacon_interval")]
    pub beacon_interval_ms: u32,
}

fn default_bind() -> String {
    "0.0.0.0:4710".to_string()
}

fn default_broadcast() -> String {
    "255.255.255.255:4710".to_string()
}

fn default_beacon_interval() -> u32 {
    5000
}

impl Default for LinkSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            broadcast: default_broadcast(),
            beacon_interval_ms: default_beacon_interval(),
        }
    }
}

/// The `[whitelist]` section.
#[derive(Debug, Default, Deserialize)]
pub struct WhitelistSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub entries: Vec<WhitelistEntryConfig>,
}

/// A `[[whitelist.entries]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct WhitelistEntryConfig {
    pub mac: String,
    /// Fixed RSSI reported for this peer instead of the measured one.
    pub rssi: Option<i8>,
}

/// The `[logging]` section.
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Parse exactly `N` hex-encoded bytes. Colons are ignored.
pub fn parse_hex<const N: usize>(field: &str, s: &str) -> Result<[u8; N], NodeError> {
    let bytes = hex::decode(s.replace(':', ""))
        .map_err(|e| NodeError::Config(format!("invalid hex in {field} '{s}': {e}")))?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        NodeError::Config(format!(
            "{field} must be {N} bytes, got {}",
            bytes.len()
        ))
    })
}

/// Parse a socket address string like "0.0.0.0:4710".
pub fn parse_socket_addr(s: &str) -> Result<SocketAddr, NodeError> {
    s.parse()
        .map_err(|e| NodeError::Config(format!("invalid socket address '{s}': {e}")))
}

/// Parse a file path string.
pub fn parse_path(s: &str) -> PathBuf {
    PathBuf::from(s)
}

fn random_mac() -> Eui48 {
    let mut bytes: [u8; EUI48_LEN] = rand::random();
    // locally administered, unicast
    bytes[0] = (bytes[0] | 0x02) & !0x01;
    Eui48::new(bytes)
}

fn uuid_from_mac(mac: &Eui48) -> Uuid {
    let mut bytes = [0u8; UUID_LEN];
    bytes[..EUI48_LEN].copy_from_slice(mac.as_ref());
    Uuid::new(bytes)
}
