//! Camera protocol adapters
//!
//! Each camera family implements [`ProtocolAdapter`] so the router can
//! move any device without knowing how its wire format looks.

pub mod ndi;
pub mod onvif;
pub mod panasonic;
pub mod probe;
pub mod visca;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

pub use ndi::NdiAdapter;
pub use onvif::OnvifAdapter;
pub use panasonic::PanasonicAdapter;
pub use visca::ViscaAdapter;

use crate::command::Action;
use crate::devices::{Device, Protocol};
use crate::{Error, Result};

/// Result of one adapter call
///
/// Transport failures are reported here instead of as errors so one
/// unreachable camera never aborts a multi-target command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The send was a duplicate of the previous one and was not transmitted
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
}

impl Outcome {
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            success: true,
            error: None,
            skipped: false,
        }
    }

    #[must_use]
    pub const fn skipped() -> Self {
        Self {
            success: true,
            error: None,
            skipped: true,
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            skipped: false,
        }
    }
}

impl<E: std::fmt::Display> From<std::result::Result<(), E>> for Outcome {
    fn from(result: std::result::Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

/// Uniform capability set of a camera family
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// Family this adapter speaks
    fn protocol(&self) -> Protocol;

    /// Translate an action into the family's wire encoding and transmit it
    ///
    /// Never fails on ordinary network errors; the outcome carries them.
    async fn send(&self, device: &Device, action: &Action, speed: u8) -> Outcome;

    /// Transmit the family's neutral (zero velocity) command
    ///
    /// Safe to call even if no motion was ever sent.
    async fn stop(&self, device: &Device) -> Outcome;

    /// Run the family's native discovery within a bounded window
    ///
    /// Families without discovery return an empty list.
    async fn discover(&self) -> Result<Vec<Device>>;
}

/// Adapter lookup by protocol family
#[derive(Clone, Default)]
pub struct AdapterSet {
    adapters: HashMap<Protocol, Arc<dyn ProtocolAdapter>>,
}

/// Timing knobs shared by the standard adapters
#[derive(Debug, Clone, Copy)]
pub struct AdapterOptions {
    /// Per-request HTTP timeout
    pub http_timeout: Duration,
    /// Discovery listening window
    pub discovery_window: Duration,
    /// Fixed wait after a VISCA datagram
    pub visca_settle: Duration,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(2),
            discovery_window: Duration::from_secs(3),
            visca_settle: Duration::from_millis(50),
        }
    }
}

impl AdapterSet {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the set of all four standard families
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn standard(options: AdapterOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.http_timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client build failed: {e}")))?;

        Ok(Self::new()
            .with(PanasonicAdapter::new(client.clone(), options.discovery_window))
            .with(OnvifAdapter::new(client.clone(), options.discovery_window))
            .with(ViscaAdapter::new(options.visca_settle))
            .with(NdiAdapter::new(client)))
    }

    /// Add (or replace) the adapter for its family
    #[must_use]
    pub fn with(mut self, adapter: impl ProtocolAdapter + 'static) -> Self {
        self.insert(Arc::new(adapter));
        self
    }

    /// Add (or replace) a shared adapter for its family
    pub fn insert(&mut self, adapter: Arc<dyn ProtocolAdapter>) {
        self.adapters.insert(adapter.protocol(), adapter);
    }

    /// Adapter for a family, if one is installed
    #[must_use]
    pub fn get(&self, protocol: Protocol) -> Option<Arc<dyn ProtocolAdapter>> {
        self.adapters.get(&protocol).cloned()
    }

    /// All installed adapters in stable family order
    #[must_use]
    pub fn all(&self) -> Vec<Arc<dyn ProtocolAdapter>> {
        Protocol::ALL
            .iter()
            .filter_map(|p| self.adapters.get(p).cloned())
            .collect()
    }

    /// Number of installed adapters
    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether no adapter is installed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

/// Map a speed in `0..=100` onto `0..=max` steps, rounding to nearest
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn scale_speed(speed: u8, max: u8) -> u8 {
    let scaled = (f64::from(speed.min(100)) / 100.0) * f64::from(max);
    scaled.round().clamp(0.0, f64::from(max)) as u8
}
