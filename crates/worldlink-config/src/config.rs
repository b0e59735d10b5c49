//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use worldlink_protocol::{ProtocolLimits, ScriptVersion, ServerHandshakePolicy, ServerInfo, VersionRange};

use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.ron";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Server identity and admission.
    pub server: ServerConfig,
    /// Wire limits and version negotiation.
    pub protocol: ProtocolConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Server identity, advertised in discovery replies and enforced at handshake.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Name shown in server listings.
    pub name: String,
    /// Listening port.
    pub port: u16,
    /// Maximum concurrent players.
    pub max_players: u16,
    /// Gamemode label shown in server listings.
    pub gamemode: String,
    /// Join password; empty for an open server.
    pub password: String,
    /// Advertise on the local network.
    pub lan: bool,
    /// Seconds of silence before a session is dropped.
    pub timeout_seconds: u32,
}

/// Wire limits and version negotiation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Largest envelope payload accepted, in bytes.
    pub max_packet_size: usize,
    /// Largest file a transfer may declare, in bytes.
    pub max_file_length: usize,
    /// Bytes per outgoing file chunk.
    pub file_chunk_size: usize,
    /// File transfers a peer may keep in flight at once.
    pub max_concurrent_transfers: usize,
    /// Oldest script version tag accepted.
    pub min_script_version: u8,
    /// Newest script version tag accepted.
    pub max_script_version: u8,
    /// Malformed packets tolerated before a peer is disconnected.
    pub malformed_strike_limit: u32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Also write JSON logs to the log directory.
    pub json_log_file: bool,
}

// --- Default implementations ---

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "worldlink server".to_string(),
            port: 4499,
            max_players: 32,
            gamemode: "freeroam".to_string(),
            password: String::new(),
            lan: true,
            timeout_seconds: 30,
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        let limits = ProtocolLimits::default();
        let versions = VersionRange::default();
        Self {
            max_packet_size: limits.max_payload_size,
            max_file_length: limits.max_file_length,
            file_chunk_size: limits.file_chunk_size,
            max_concurrent_transfers: limits.max_concurrent_transfers,
            min_script_version: versions.min,
            max_script_version: versions.max,
            malformed_strike_limit: 5,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_log_file: false,
        }
    }
}

// --- Protocol views ---

impl Config {
    /// Decode limits for the protocol layer.
    pub fn protocol_limits(&self) -> ProtocolLimits {
        ProtocolLimits {
            max_payload_size: self.protocol.max_packet_size,
            max_file_length: self.protocol.max_file_length,
            file_chunk_size: self.protocol.file_chunk_size,
            max_concurrent_transfers: self.protocol.max_concurrent_transfers,
        }
    }

    /// Admission rules for incoming connection requests.
    pub fn handshake_policy(&self) -> ServerHandshakePolicy {
        ServerHandshakePolicy {
            versions: VersionRange {
                min: self.protocol.min_script_version,
                max: self.protocol.max_script_version,
            },
            password: (!self.server.password.is_empty()).then(|| self.server.password.clone()),
            max_players: usize::from(self.server.max_players),
        }
    }

    /// Settings advertised in discovery replies.
    pub fn server_info(&self) -> ServerInfo {
        ServerInfo {
            name: self.server.name.clone(),
            max_players: usize::from(self.server.max_players),
            port: self.server.port,
            gamemode: self.server.gamemode.clone(),
            password_protected: !self.server.password.is_empty(),
            lan: self.server.lan,
        }
    }

    /// Idle time after which a session is dropped.
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.server.timeout_seconds))
    }

    /// Reject settings the protocol layer cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.protocol;
        if p.min_script_version > p.max_script_version {
            return Err(ConfigError::Invalid(format!(
                "min_script_version {} is above max_script_version {}",
                p.min_script_version, p.max_script_version
            )));
        }
        if ScriptVersion::from_tag(p.max_script_version).is_none() {
            return Err(ConfigError::Invalid(format!(
                "max_script_version {} is newer than this build ({})",
                p.max_script_version,
                ScriptVersion::LATEST.tag()
            )));
        }
        if p.file_chunk_size == 0 || p.file_chunk_size > p.max_packet_size {
            return Err(ConfigError::Invalid(format!(
                "file_chunk_size {} must be between 1 and max_packet_size {}",
                p.file_chunk_size, p.max_packet_size
            )));
        }
        if p.max_concurrent_transfers == 0 {
            return Err(ConfigError::Invalid("max_concurrent_transfers must be at least 1".into()));
        }
        if p.malformed_strike_limit == 0 {
            return Err(ConfigError::Invalid("malformed_strike_limit must be at least 1".into()));
        }
        Ok(())
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Per-user config directory, e.g. `~/.config/worldlink` on Linux.
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|d| d.join("worldlink"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            config.validate()?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized = ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
        new_config.validate()?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
