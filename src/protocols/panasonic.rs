//! Panasonic AW-series CGI adapter
//!
//! Commands are stateless HTTP GETs to `/cgi-bin/aw_ptz`. Pan and tilt
//! speeds are two-digit values centred on 50 (`01`–`99`), so `PTS5050`
//! is the neutral command.
//!
//! Codes used:
//! - `PTS{pp}{tt}`: pan/tilt speed (larger tilt value = up)
//! - `Z{zz}`: zoom speed (larger = tele)
//! - `R{nn}` / `M{nn}`: recall / store preset

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Mutex;

use super::probe::probe;
use super::{Outcome, ProtocolAdapter, scale_speed};
use crate::command::Action;
use crate::devices::{Device, Protocol};
use crate::{Error, Result};

/// UDP port Panasonic cameras answer discovery probes on
pub const DISCOVERY_PORT: u16 = 52000;

/// Fixed discovery probe datagram
const DISCOVERY_PROBE: &[u8] = b"\x00\x01\x00\x2aPTZ-DISCOVER\x00";

/// Centre value meaning "no motion" on a speed axis
const NEUTRAL: i32 = 50;

/// Largest offset from neutral
const SPEED_SPAN: u8 = 49;

/// Vectors with both axes under this magnitude map to the neutral command
const DEADZONE: f64 = 0.02;

/// Neutral pan/tilt command
const PAN_TILT_STOP: &str = "PTS5050";

/// Neutral zoom command
const ZOOM_STOP: &str = "Z50";

/// Duplicate-suppression memory for one device
#[derive(Debug, Default)]
struct Suppression {
    /// Last motion code transmitted
    last_sent: Option<String>,
    /// Bumped by every stop; a send that straddles a stop must not
    /// write its code back
    stop_epoch: u64,
}

/// Panasonic CGI adapter with per-device duplicate suppression
pub struct PanasonicAdapter {
    client: Client,
    discovery_window: Duration,
    memory: Mutex<HashMap<String, Suppression>>,
}

impl PanasonicAdapter {
    #[must_use]
    pub fn new(client: Client, discovery_window: Duration) -> Self {
        Self {
            client,
            discovery_window,
            memory: Mutex::new(HashMap::new()),
        }
    }

    /// Issue one CGI command
    async fn transmit(&self, device: &Device, code: &str) -> Result<()> {
        let url = command_url(device, code);
        let mut request = self.client.get(&url);
        if let Some(creds) = &device.credentials {
            request = request.basic_auth(&creds.username, Some(&creds.password));
        }

        let response = request.send().await?.error_for_status()?;
        let body = response.text().await.unwrap_or_default();

        // Cameras answer `ER1`..`ER3` for unsupported, busy and out-of-range
        if body.trim_start().starts_with("ER") {
            return Err(Error::Protocol(format!("camera answered {}", body.trim())));
        }

        tracing::trace!(device_id = %device.id, code, "panasonic command sent");
        Ok(())
    }
}

#[async_trait]
impl ProtocolAdapter for PanasonicAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Panasonic
    }

    async fn send(&self, device: &Device, action: &Action, speed: u8) -> Outcome {
        let Some(code) = encode(action, speed) else {
            return self.stop(device).await;
        };
        let is_motion = !matches!(action, Action::PresetRecall(_) | Action::PresetStore(_));

        let epoch = {
            let mut memory = self.memory.lock().await;
            let entry = memory.entry(device.id.clone()).or_default();
            if is_motion && entry.last_sent.as_deref() == Some(code.as_str()) {
                tracing::debug!(device_id = %device.id, code, "duplicate panasonic command suppressed");
                return Outcome::skipped();
            }
            entry.stop_epoch
        };

        let result = self.transmit(device, &code).await;

        let mut memory = self.memory.lock().await;
        let entry = memory.entry(device.id.clone()).or_default();
        if entry.stop_epoch != epoch {
            // A stop landed mid-send; the camera is halted, remember nothing
            tracing::debug!(device_id = %device.id, code, "panasonic send overtaken by stop");
        } else if result.is_ok() && is_motion {
            entry.last_sent = Some(code);
        } else {
            entry.last_sent = None;
        }
        drop(memory);

        if let Err(e) = &result {
            tracing::warn!(device_id = %device.id, error = %e, "panasonic send failed");
        }
        result.into()
    }

    async fn stop(&self, device: &Device) -> Outcome {
        // Clear first so the next motion is never swallowed, even if the stop fails
        {
            let mut memory = self.memory.lock().await;
            let entry = memory.entry(device.id.clone()).or_default();
            entry.last_sent = None;
            entry.stop_epoch = entry.stop_epoch.wrapping_add(1);
        }

        let pan_tilt = self.transmit(device, PAN_TILT_STOP).await;
        let zoom = self.transmit(device, ZOOM_STOP).await;

        match pan_tilt.and(zoom) {
            Ok(()) => Outcome::ok(),
            Err(e) => {
                tracing::warn!(device_id = %device.id, error = %e, "panasonic stop failed");
                Outcome::failed(e.to_string())
            }
        }
    }

    async fn discover(&self) -> Result<Vec<Device>> {
        let destination = SocketAddr::from((Ipv4Addr::BROADCAST, DISCOVERY_PORT));
        let replies = probe(destination, DISCOVERY_PROBE, self.discovery_window)
            .await
            .map_err(|e| Error::Discovery(format!("panasonic probe failed: {e}")))?;

        let mut devices: Vec<Device> = Vec::new();
        for reply in replies {
            let host = reply.from.ip().to_string();
            if devices.iter().any(|d| d.host == host) {
                continue;
            }
            let mut device = Device::new(host, Protocol::Panasonic.default_port(), Protocol::Panasonic);
            device.name = format!("Panasonic {}", device.host);
            devices.push(device);
        }

        tracing::debug!(count = devices.len(), "panasonic discovery finished");
        Ok(devices)
    }
}

/// Full CGI URL for a command code
#[must_use]
pub fn command_url(device: &Device, code: &str) -> String {
    format!("{}/cgi-bin/aw_ptz?cmd=%23{code}&res=1", device.base_url())
}

/// Encode an action as a Panasonic command code
///
/// Returns `None` for [`Action::Stop`], which needs two codes.
#[must_use]
pub fn encode(action: &Action, speed: u8) -> Option<String> {
    let step = i32::from(scale_speed(speed, SPEED_SPAN));
    let code = match action {
        Action::Stop => return None,
        Action::PanLeft => pan_tilt(NEUTRAL - step, NEUTRAL),
        Action::PanRight => pan_tilt(NEUTRAL + step, NEUTRAL),
        Action::TiltUp => pan_tilt(NEUTRAL, NEUTRAL + step),
        Action::TiltDown => pan_tilt(NEUTRAL, NEUTRAL - step),
        Action::ZoomIn => format!("Z{:02}", clamp_axis(NEUTRAL + step)),
        Action::ZoomOut => format!("Z{:02}", clamp_axis(NEUTRAL - step)),
        Action::PresetRecall(n) => format!("R{n:02}"),
        Action::PresetStore(n) => format!("M{n:02}"),
        Action::Vector(v) => {
            if v.within_deadzone(DEADZONE) {
                PAN_TILT_STOP.to_string()
            } else {
                let factor = (f64::from(speed.min(100)) / 100.0) * f64::from(SPEED_SPAN);
                pan_tilt(vector_axis(v.x, factor), vector_axis(v.y, factor))
            }
        }
    };
    Some(code)
}

fn pan_tilt(pan: i32, tilt: i32) -> String {
    format!("PTS{:02}{:02}", clamp_axis(pan), clamp_axis(tilt))
}

#[allow(clippy::cast_possible_truncation)]
fn vector_axis(axis: f64, factor: f64) -> i32 {
    NEUTRAL + (axis * factor).round() as i32
}

const fn clamp_axis(value: i32) -> i32 {
    if value < 1 {
        1
    } else if value > 99 {
        99
    } else {
        value
    }
}
