//! Registry of known cameras

use std::collections::HashMap;
use std::net::IpAddr;

use chrono::Utc;

use super::types::{Credentials, Device, DeviceRegistration, MergeSummary, Protocol, device_id};
use crate::protocols::visca::VISCA_PORT;
use crate::{Error, Result};

/// Mapping from device identifier to descriptor
///
/// Entries are replaced wholesale on every write, so a snapshot taken by
/// the router never observes a half-updated device.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<String, Device>,
}

impl DeviceRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a device, or refresh the entry with the same identifier
    ///
    /// Returns true when the identifier was new. Credentials and the
    /// session token survive a refresh that does not carry them.
    pub fn upsert(&mut self, mut device: Device) -> bool {
        device.last_seen = Utc::now();
        match self.devices.get(&device.id) {
            Some(existing) => {
                if device.credentials.is_none() {
                    device.credentials.clone_from(&existing.credentials);
                }
                if device.session_token.is_none() {
                    device.session_token.clone_from(&existing.session_token);
                }
                self.devices.insert(device.id.clone(), device);
                false
            }
            None => {
                self.devices.insert(device.id.clone(), device);
                true
            }
        }
    }

    /// Merge a batch of discovered devices
    pub fn merge(&mut self, devices: Vec<Device>) -> MergeSummary {
        let mut summary = MergeSummary::default();
        for device in devices {
            if self.upsert(device) {
                summary.inserted += 1;
            } else {
                summary.updated += 1;
            }
        }
        summary
    }

    /// Register a device from manual entry
    ///
    /// # Errors
    ///
    /// Returns error if the IP address does not parse
    pub fn register(&mut self, registration: DeviceRegistration) -> Result<Device> {
        let ip: IpAddr = registration
            .ip
            .trim()
            .parse()
            .map_err(|e| Error::Registration(format!("invalid ip '{}': {e}", registration.ip)))?;
        let host = ip.to_string();

        let protocol = registration.protocol.unwrap_or_else(|| {
            if registration.port == Some(VISCA_PORT) {
                Protocol::Visca
            } else {
                Protocol::Panasonic
            }
        });

        let credentials = registration.username.map(|username| Credentials {
            username,
            password: registration.password.unwrap_or_default(),
        });

        let device = Device {
            id: device_id(&host),
            name: registration
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| format!("{protocol} {host}")),
            port: registration.port.unwrap_or_else(|| protocol.default_port()),
            host,
            protocol,
            credentials,
            session_token: None,
            last_seen: Utc::now(),
        };

        let inserted = self.upsert(device.clone());
        tracing::info!(
            device_id = %device.id,
            protocol = %device.protocol,
            port = device.port,
            inserted,
            "device registered"
        );
        Ok(device)
    }

    /// Remove a device by identifier
    pub fn remove(&mut self, device_id: &str) -> Option<Device> {
        self.devices.remove(device_id)
    }

    /// Get a device by identifier
    #[must_use]
    pub fn get(&self, device_id: &str) -> Option<&Device> {
        self.devices.get(device_id)
    }

    /// Owned copy of every entry, sorted by identifier
    #[must_use]
    pub fn snapshot(&self) -> Vec<Device> {
        let mut devices: Vec<Device> = self.devices.values().cloned().collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        devices
    }

    /// Number of known devices
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
