//! Error types for the PTZ gateway

use thiserror::Error;

use crate::security::Rejection;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the PTZ gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Manual device registration rejected
    #[error("registration error: {0}")]
    Registration(String),

    /// Discovery failed for a protocol family
    #[error("discovery error: {0}")]
    Discovery(String),

    /// Protocol-level fault (bad response, missing endpoint, etc)
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Inbound command dropped by the security gate
    #[error("command rejected: {0}")]
    Rejected(#[from] Rejection),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// XML parsing error
    #[error("xml error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// URL parsing error
    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
}
