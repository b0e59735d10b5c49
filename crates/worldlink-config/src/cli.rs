//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// worldlink command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "worldlink", about = "Multiplayer world synchronization")]
pub struct CliArgs {
    /// Server name shown in listings.
    #[arg(long)]
    pub name: Option<String>,

    /// Listening port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Maximum concurrent players.
    #[arg(long)]
    pub max_players: Option<u16>,

    /// Join password.
    #[arg(long)]
    pub password: Option<String>,

    /// Largest accepted packet payload in bytes.
    #[arg(long)]
    pub max_packet_size: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref name) = args.name {
            self.server.name = name.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(max) = args.max_players {
            self.server.max_players = max;
        }
        if let Some(ref password) = args.password {
            self.server.password = password.clone();
        }
        if let Some(size) = args.max_packet_size {
            self.protocol.max_packet_size = size;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            port: Some(5000),
            password: Some("pw".to_string()),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.password, "pw");
        // Non-overridden fields retain defaults
        assert_eq!(config.server.max_players, 32);
        assert_eq!(config.debug.log_level, "info");
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = CliArgs::parse_from(["worldlink", "--port", "4500", "--log-level", "debug"]);
        assert_eq!(args.port, Some(4500));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.config.is_none());
    }
}
