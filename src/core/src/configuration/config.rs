use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::data_capture::types::FilterSet;
use crate::error_handling::types::ConfigError;

pub const DEFAULT_CONTROL_PORT: u16 = 8750;
pub const DEFAULT_ARCHIVE_PREFIX: &str = "panima";

/// Application configuration, read from a TOML file.
///
/// ```toml
/// bind_address = "127.0.0.1"
/// control_port = 8750
/// output_dir = "./captures"
/// replay_log = "./session.ndjson"
///
/// [default_filters]
/// js = true
/// packets = true
/// ```
///
/// # Fields Overview
///
/// - `bind_address`: address the control surface listens on
/// - `control_port`: port of the control surface
/// - `output_dir`: directory receiving finished archives, created on demand
/// - `archive_prefix`: leading part of every archive file name
/// - `replay_log`: recorded DevTools event log fed to the replay inspector
/// - `default_filters`: filters used when a start request carries none
/// - `event_buffer`: capacity of the inbound event channel
///
/// Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_address: String,
    pub control_port: u16,
    pub output_dir: PathBuf,
    pub archive_prefix: String,
    pub replay_log: Option<PathBuf>,
    pub default_filters: FilterSet,
    pub event_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            control_port: DEFAULT_CONTROL_PORT,
            output_dir: PathBuf::from("./captures"),
            archive_prefix: DEFAULT_ARCHIVE_PREFIX.to_string(),
            replay_log: None,
            default_filters: FilterSet::default(),
            event_buffer: 1024,
        }
    }
}

impl Config {
    /// Reads and validates the configuration at `path`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading configuration from {}", path.display());
        let raw = fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(raw).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_address
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::BadAddress(format!("{}: {}", self.bind_address, e)))?;

        if self.archive_prefix.trim().is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "event_buffer must be at least 1".to_string(),
            ));
        }

        // output_dir itself is created on demand, its parent must exist
        if let Some(parent) = self.output_dir.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(ConfigError::DirectoryDoesNotExist(
                    parent.display().to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Socket address of the control surface.
    pub fn control_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|_| ConfigError::BadAddress(self.bind_address.clone()))?;
        Ok(SocketAddr::new(ip, self.control_port))
    }
}
