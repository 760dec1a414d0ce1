//! TOML configuration file loading
//!
//! Supports `~/.config/ptz-gateway/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::devices::DeviceRegistration;
use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub security: SecurityFileConfig,

    #[serde(default)]
    pub router: RouterFileConfig,

    #[serde(default)]
    pub discovery: DiscoveryFileConfig,

    #[serde(default)]
    pub network: NetworkFileConfig,

    /// Manually registered cameras
    #[serde(default)]
    pub devices: Vec<DeviceRegistration>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SecurityFileConfig {
    /// Per-room shared secret every inbound command must carry
    pub room_secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RouterFileConfig {
    /// Watchdog horizon in milliseconds
    pub watchdog_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DiscoveryFileConfig {
    pub enabled: Option<bool>,
    /// Listening window per family, in seconds
    pub timeout_secs: Option<u64>,
    /// Rediscovery period in seconds; 0 discovers once at startup
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NetworkFileConfig {
    pub http_timeout_ms: Option<u64>,
    /// Wait after each VISCA datagram, in milliseconds
    pub visca_settle_ms: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConfigFile {
    let Some(path) = config_file_path() else {
        return ConfigFile::default();
    };

    if !path.exists() {
        return ConfigFile::default();
    }

    match read_config_file(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            ConfigFile::default()
        }
    }
}

/// Read and parse a config file at an explicit path
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/ptz-gateway/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("ptz-gateway").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::Protocol;

    #[test]
    fn full_file_parses() {
        let content = r#"
            [security]
            room_secret = "hunter2"

            [router]
            watchdog_ms = 800

            [discovery]
            enabled = false
            interval_secs = 30

            [network]
            http_timeout_ms = 1500

            [[devices]]
            ip = "192.168.1.20"
            protocol = "visca"

            [[devices]]
            ip = "192.168.1.21"
            port = 8080
            username = "admin"
            password = "pw"
        "#;
        let config: ConfigFile = toml::from_str(content).unwrap();
        assert_eq!(config.security.room_secret.as_deref(), Some("hunter2"));
        assert_eq!(config.router.watchdog_ms, Some(800));
        assert_eq!(config.discovery.enabled, Some(false));
        assert_eq!(config.discovery.timeout_secs, None);
        assert_eq!(config.network.http_timeout_ms, Some(1500));
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[0].protocol, Some(Protocol::Visca));
        assert_eq!(config.devices[1].username.as_deref(), Some("admin"));
    }

    #[test]
    fn empty_file_is_default() {
        let config: ConfigFile = toml::from_str("").unwrap();
        assert!(config.security.room_secret.is_none());
        assert!(config.devices.is_empty());
    }

    #[test]
    fn missing_explicit_file_is_error() {
        let result = read_config_file(Path::new("/nonexistent/ptz-gateway.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
