//! Device descriptor types

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Camera control protocol family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Panasonic AW CGI over HTTP
    Panasonic,
    /// ONVIF SOAP over HTTP
    Onvif,
    /// Sony VISCA over UDP
    Visca,
    /// Generic HTTP/REST (NDI-style PTZ heads)
    #[serde(alias = "http")]
    Ndi,
}

impl Protocol {
    /// All families, in discovery order
    pub const ALL: [Self; 4] = [Self::Panasonic, Self::Onvif, Self::Visca, Self::Ndi];

    /// Control port used when a registration leaves it out
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Panasonic | Self::Onvif | Self::Ndi => 80,
            Self::Visca => crate::protocols::visca::VISCA_PORT,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Panasonic => "panasonic",
            Self::Onvif => "onvif",
            Self::Visca => "visca",
            Self::Ndi => "ndi",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "panasonic" | "aw" => Ok(Self::Panasonic),
            "onvif" => Ok(Self::Onvif),
            "visca" => Ok(Self::Visca),
            "ndi" | "http" => Ok(Self::Ndi),
            other => Err(format!("unknown protocol: {other}")),
        }
    }
}

/// Per-device login
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"**redacted**")
            .finish()
    }
}

/// A known camera
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    /// Stable identifier, derived from the address
    pub id: String,
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    #[serde(skip)]
    pub credentials: Option<Credentials>,
    /// Protocol session handle (e.g. an ONVIF profile token)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    pub name: String,
    pub last_seen: DateTime<Utc>,
}

impl Device {
    /// Build a descriptor seen just now, with an IP-derived identifier
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, protocol: Protocol) -> Self {
        let host = host.into();
        Self {
            id: device_id(&host),
            name: format!("{protocol} {host}"),
            host,
            port,
            protocol,
            credentials: None,
            session_token: None,
            last_seen: Utc::now(),
        }
    }

    /// `host:port`, bracketing IPv6 literals
    #[must_use]
    pub fn authority(&self) -> String {
        match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V6(v6)) => format!("[{v6}]:{}", self.port),
            _ => format!("{}:{}", self.host, self.port),
        }
    }

    /// Base HTTP URL for the control port
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.authority())
    }
}

/// Derive the registry identifier from a host
///
/// Every family keys by address, so configured and discovered entries for
/// one camera collapse. IP literals are canonicalized (`fe80::0001` and
/// `fe80::1` are the same camera); names are lower-cased.
#[must_use]
pub fn device_id(host: &str) -> String {
    let host = host.trim();
    host.parse::<IpAddr>()
        .map_or_else(|_| host.to_lowercase(), |ip| ip.to_string())
}

/// Manual registration request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceRegistration {
    pub ip: String,
    pub protocol: Option<Protocol>,
    pub port: Option<u16>,
    pub name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Result of merging discovered devices into the registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub inserted: usize,
    pub updated: usize,
}
