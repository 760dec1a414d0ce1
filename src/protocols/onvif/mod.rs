//! ONVIF SOAP adapter
//!
//! A session (PTZ service address plus media profile token) is set up on
//! first use and cached per `host:port`. Any failed PTZ call evicts the
//! cached session so the next command reconnects from scratch.

pub mod discovery;
pub mod soap;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::probe::probe;
use super::{Outcome, ProtocolAdapter};
use crate::command::Action;
use crate::devices::{Device, Protocol};
use crate::{Error, Result};
use soap::Velocity;

/// Vectors with both axes under this magnitude halt pan/tilt
const DEADZONE: f64 = 0.02;

/// Device management service path every ONVIF camera exposes
const DEVICE_SERVICE_PATH: &str = "/onvif/device_service";

/// Connected PTZ session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub ptz_endpoint: String,
    pub profile_token: String,
}

/// ONVIF adapter with a per-address session cache
pub struct OnvifAdapter {
    client: Client,
    discovery_window: Duration,
    sessions: Mutex<HashMap<String, Session>>,
}

impl OnvifAdapter {
    #[must_use]
    pub fn new(client: Client, discovery_window: Duration) -> Self {
        Self {
            client,
            discovery_window,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Cached session for the device, connecting if needed
    async fn session(&self, device: &Device) -> Result<Session> {
        let key = device.authority();
        if let Some(session) = self.sessions.lock().await.get(&key).cloned() {
            return Ok(session);
        }

        let session = self.connect(device).await?;
        tracing::debug!(
            device_id = %device.id,
            endpoint = %session.ptz_endpoint,
            profile = %session.profile_token,
            "onvif session established"
        );
        self.sessions.lock().await.insert(key, session.clone());
        Ok(session)
    }

    async fn connect(&self, device: &Device) -> Result<Session> {
        let device_service = format!("{}{DEVICE_SERVICE_PATH}", device.base_url());
        let body = self.call(device, &device_service, &soap::get_capabilities()).await?;
        let capabilities = soap::parse_capabilities(&body)?;

        let profile_token = match &device.session_token {
            Some(token) => token.clone(),
            None => {
                let media = capabilities.media.as_deref().unwrap_or(&device_service);
                let body = self.call(device, media, &soap::get_profiles()).await?;
                soap::first_profile_token(&body)?
            }
        };

        Ok(Session {
            ptz_endpoint: capabilities.ptz.unwrap_or(device_service),
            profile_token,
        })
    }

    /// Post one SOAP request, returning the response body
    async fn call(&self, device: &Device, endpoint: &str, body: &str) -> Result<String> {
        let header = device
            .credentials
            .as_ref()
            .map(|creds| soap::wsse_header(&creds.username, &creds.password));

        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, soap::CONTENT_TYPE)
            .body(soap::envelope(header.as_deref(), body))
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if let Some(reason) = soap::fault_reason(&text) {
            return Err(Error::Protocol(format!("soap fault: {reason}")));
        }
        if !status.is_success() {
            return Err(Error::Protocol(format!("onvif endpoint answered {status}")));
        }
        Ok(text)
    }

    /// Run one PTZ operation against the cached session
    async fn invoke(&self, device: &Device, build: impl FnOnce(&str) -> String + Send) -> Result<()> {
        let session = self.session(device).await?;
        let body = build(&session.profile_token);

        if let Err(e) = self.call(device, &session.ptz_endpoint, &body).await {
            self.sessions.lock().await.remove(&device.authority());
            return Err(e);
        }
        Ok(())
    }

    #[cfg(test)]
    async fn cached(&self, device: &Device) -> Option<Session> {
        self.sessions.lock().await.get(&device.authority()).cloned()
    }
}

#[async_trait]
impl ProtocolAdapter for OnvifAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Onvif
    }

    async fn send(&self, device: &Device, action: &Action, speed: u8) -> Outcome {
        let result = match *action {
            Action::Stop => return self.stop(device).await,
            Action::PresetRecall(n) => self.invoke(device, |token| soap::goto_preset(token, n)).await,
            Action::PresetStore(n) => self.invoke(device, |token| soap::set_preset(token, n)).await,
            Action::Vector(v) if v.within_deadzone(DEADZONE) => {
                self.invoke(device, |token| soap::stop(token, true, false)).await
            }
            _ => match velocity(action, speed) {
                Some(velocity) => {
                    self.invoke(device, |token| soap::continuous_move(token, velocity))
                        .await
                }
                None => Ok(()),
            },
        };

        if let Err(e) = &result {
            tracing::warn!(device_id = %device.id, %action, error = %e, "onvif send failed");
        }
        result.into()
    }

    async fn stop(&self, device: &Device) -> Outcome {
        let result = self.invoke(device, |token| soap::stop(token, true, true)).await;
        if let Err(e) = &result {
            tracing::warn!(device_id = %device.id, error = %e, "onvif stop failed");
        }
        result.into()
    }

    async fn discover(&self) -> Result<Vec<Device>> {
        let message = discovery::probe_message(Uuid::new_v4());
        let replies = probe(discovery::MULTICAST_ADDR, message.as_bytes(), self.discovery_window)
            .await
            .map_err(|e| Error::Discovery(format!("ws-discovery probe failed: {e}")))?;

        let mut devices: Vec<Device> = Vec::new();
        for reply in replies {
            let body = String::from_utf8_lossy(&reply.payload);
            let matches = match discovery::parse_probe_matches(&body) {
                Ok(matches) => matches,
                Err(e) => {
                    tracing::debug!(from = %reply.from, error = %e, "unparseable ws-discovery reply");
                    continue;
                }
            };
            for device in matches.into_iter().filter_map(discovery::ProbeMatch::into_device) {
                if !devices.iter().any(|d| d.id == device.id) {
                    devices.push(device);
                }
            }
        }

        tracing::debug!(count = devices.len(), "onvif discovery finished");
        Ok(devices)
    }
}

/// Velocity for a motion action, scaled by speed
///
/// Positive tilt is up, matching the other families; not yet verified
/// against every camera vendor.
fn velocity(action: &Action, speed: u8) -> Option<Velocity> {
    let factor = f64::from(speed.min(100)) / 100.0;
    let (pan, tilt, zoom) = match action {
        Action::PanLeft => (-factor, 0.0, 0.0),
        Action::PanRight => (factor, 0.0, 0.0),
        Action::TiltUp => (0.0, factor, 0.0),
        Action::TiltDown => (0.0, -factor, 0.0),
        Action::ZoomIn => (0.0, 0.0, factor),
        Action::ZoomOut => (0.0, 0.0, -factor),
        Action::Vector(v) => (v.x * factor, v.y * factor, 0.0),
        Action::Stop | Action::PresetRecall(_) | Action::PresetStore(_) => return None,
    };
    Some(Velocity { pan, tilt, zoom })
}
