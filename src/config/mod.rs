//! Configuration management for the PTZ gateway
//!
//! Every value resolves as env > TOML file > default.

pub mod file;

use std::path::Path;
use std::time::Duration;

use crate::devices::DeviceRegistration;
use crate::protocols::AdapterOptions;
use crate::router::DEFAULT_WATCHDOG;
use crate::security::RoomSecret;
use crate::{Error, Result};
use file::ConfigFile;

/// PTZ gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Room secret; commands are refused when absent
    pub room_secret: Option<RoomSecret>,

    /// Dead-man's switch horizon for continuous motion
    pub watchdog: Duration,

    pub discovery: DiscoveryConfig,

    pub network: NetworkConfig,

    /// Cameras registered at startup
    pub devices: Vec<DeviceRegistration>,
}

/// Discovery configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub enabled: bool,
    /// Listening window per family
    pub timeout: Duration,
    /// Rediscovery period; `None` discovers once at startup
    pub interval: Option<Duration>,
}

impl DiscoveryConfig {
    /// Upper bound on one whole discovery round
    #[must_use]
    pub const fn round_timeout(&self) -> Duration {
        self.timeout.saturating_mul(2)
    }
}

/// Network timing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkConfig {
    pub http_timeout: Duration,
    pub visca_settle: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self::resolve(ConfigFile::default(), |_| None)
    }
}

impl Config {
    /// Load configuration from environment and config file
    ///
    /// An explicit `path` must exist and parse; the default path is
    /// optional and silently skipped when missing.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config file cannot be loaded
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let fc = match path {
            Some(path) => file::read_config_file(path)?,
            None => file::load_config_file(),
        };
        Ok(Self::resolve(fc, |key| std::env::var(key).ok()))
    }

    /// Layer an environment lookup over a parsed config file
    pub fn resolve(fc: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let env_u64 = |key: &str| env(key).and_then(|v| v.trim().parse::<u64>().ok());

        let room_secret = env("PTZ_ROOM_SECRET")
            .or(fc.security.room_secret)
            .and_then(RoomSecret::new);

        let watchdog = env_u64("PTZ_WATCHDOG_MS")
            .or(fc.router.watchdog_ms)
            .map_or(DEFAULT_WATCHDOG, Duration::from_millis);

        let interval_secs = env_u64("PTZ_DISCOVERY_INTERVAL_SECS")
            .or(fc.discovery.interval_secs)
            .unwrap_or(0);
        let discovery = DiscoveryConfig {
            enabled: env("PTZ_DISCOVERY_ENABLED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .or(fc.discovery.enabled)
                .unwrap_or(true),
            timeout: Duration::from_secs(
                env_u64("PTZ_DISCOVERY_TIMEOUT_SECS")
                    .or(fc.discovery.timeout_secs)
                    .unwrap_or(3),
            ),
            interval: (interval_secs > 0).then(|| Duration::from_secs(interval_secs)),
        };

        let network = NetworkConfig {
            http_timeout: Duration::from_millis(
                env_u64("PTZ_HTTP_TIMEOUT_MS")
                    .or(fc.network.http_timeout_ms)
                    .unwrap_or(2000),
            ),
            visca_settle: Duration::from_millis(fc.network.visca_settle_ms.unwrap_or(50)),
        };

        Self {
            room_secret,
            watchdog,
            discovery,
            network,
            devices: fc.devices,
        }
    }

    /// Room secret, required to accept any command
    ///
    /// # Errors
    ///
    /// Returns error if no secret is configured
    pub fn require_secret(&self) -> Result<RoomSecret> {
        self.room_secret.clone().ok_or_else(|| {
            Error::Config("room secret not set (PTZ_ROOM_SECRET or [security] room_secret)".to_string())
        })
    }

    /// Timing knobs for the standard adapter set
    #[must_use]
    pub const fn adapter_options(&self) -> AdapterOptions {
        AdapterOptions {
            http_timeout: self.network.http_timeout,
            discovery_window: self.discovery.timeout,
            visca_settle: self.network.visca_settle,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(config.room_secret.is_none());
        assert_eq!(config.watchdog, Duration::from_millis(600));
        assert!(config.discovery.enabled);
        assert_eq!(config.discovery.timeout, Duration::from_secs(3));
        assert_eq!(config.discovery.interval, None);
        assert_eq!(config.network.http_timeout, Duration::from_secs(2));
        assert_eq!(config.network.visca_settle, Duration::from_millis(50));
        assert!(config.require_secret().is_err());
    }

    #[test]
    fn huge_discovery_timeout_saturates() {
        let config = Config::resolve(
            ConfigFile::default(),
            env(&[("PTZ_DISCOVERY_TIMEOUT_SECS", &u64::MAX.to_string())]),
        );
        assert_eq!(config.discovery.round_timeout(), Duration::MAX);
        assert_eq!(Config::default().discovery.round_timeout(), Duration::from_secs(6));
    }

    #[test]
    fn file_overrides_defaults() {
        let fc: ConfigFile = toml::from_str(
            r#"
            [security]
            room_secret = "from-file"
            [router]
            watchdog_ms = 900
            [discovery]
            interval_secs = 60
            "#,
        )
        .unwrap();
        let config = Config::resolve(fc, |_| None);
        assert!(config.room_secret.unwrap().verify("from-file"));
        assert_eq!(config.watchdog, Duration::from_millis(900));
        assert_eq!(config.discovery.interval, Some(Duration::from_secs(60)));
    }

    #[test]
    fn env_overrides_file() {
        let fc: ConfigFile = toml::from_str(
            r#"
            [security]
            room_secret = "from-file"
            [discovery]
            enabled = true
            "#,
        )
        .unwrap();
        let config = Config::resolve(
            fc,
            env(&[
                ("PTZ_ROOM_SECRET", "from-env"),
                ("PTZ_DISCOVERY_ENABLED", "false"),
                ("PTZ_WATCHDOG_MS", "250"),
                ("PTZ_HTTP_TIMEOUT_MS", "not-a-number"),
            ]),
        );
        assert!(config.room_secret.unwrap().verify("from-env"));
        assert!(!config.discovery.enabled);
        assert_eq!(config.watchdog, Duration::from_millis(250));
        // unparseable env values fall through to the default
        assert_eq!(config.network.http_timeout, Duration::from_secs(2));
    }

    #[test]
    fn empty_secret_is_unset() {
        let config = Config::resolve(ConfigFile::default(), env(&[("PTZ_ROOM_SECRET", "")]));
        assert!(config.room_secret.is_none());
    }
}
