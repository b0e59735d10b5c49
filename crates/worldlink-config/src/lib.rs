//! Configuration for worldlink servers and clients.
//!
//! Settings persist to disk as a RON file. Every section uses
//! `#[serde(default)]`, so files written by older or newer builds still load.
//! CLI flags parsed with clap override values read from disk.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, ProtocolConfig, ServerConfig};
pub use error::ConfigError;
