//! Generic HTTP adapter for NDI-style PTZ heads
//!
//! There is no single standard, so three request shapes are tried in
//! order until one succeeds:
//! 1. REST query parameters: `GET /api/ptz?action=pan_left&speed=50`
//! 2. Legacy CGI: `GET /cgi-bin/ptzctrl.cgi?ptzcmd&left&12&12`
//! 3. JSON body: `POST /api/ptz` with `{"action": .., "speed": ..}`

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::json;

use super::{Outcome, ProtocolAdapter, scale_speed};
use crate::command::{Action, Vector};
use crate::devices::{Device, Protocol};
use crate::Result;

/// Maximum legacy CGI pan/tilt speed
const CGI_MAX_DRIVE: u8 = 24;

/// Maximum legacy CGI zoom speed
const CGI_MAX_ZOOM: u8 = 7;

/// Vectors with both axes under this magnitude halt pan/tilt
const DEADZONE: f64 = 0.02;

/// Request shapes, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Rest,
    LegacyCgi,
    Json,
}

impl Shape {
    const CHAIN: [Self; 3] = [Self::Rest, Self::LegacyCgi, Self::Json];

    const fn label(self) -> &'static str {
        match self {
            Self::Rest => "rest",
            Self::LegacyCgi => "cgi",
            Self::Json => "json",
        }
    }
}

/// Best-effort HTTP adapter
pub struct NdiAdapter {
    client: Client,
}

impl NdiAdapter {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    fn authorize(device: &Device, request: RequestBuilder) -> RequestBuilder {
        match &device.credentials {
            Some(creds) => request.basic_auth(&creds.username, Some(&creds.password)),
            None => request,
        }
    }

    async fn attempt(&self, device: &Device, shape: Shape, action: &Action, speed: u8) -> Result<()> {
        let base = device.base_url();
        match shape {
            Shape::Rest => {
                let request = self
                    .client
                    .get(format!("{base}/api/ptz"))
                    .query(&rest_query(action, speed));
                Self::authorize(device, request).send().await?.error_for_status()?;
            }
            Shape::LegacyCgi => {
                for command in cgi_commands(action, speed) {
                    let request = self
                        .client
                        .get(format!("{base}/cgi-bin/ptzctrl.cgi?ptzcmd&{command}"));
                    Self::authorize(device, request).send().await?.error_for_status()?;
                }
            }
            Shape::Json => {
                let request = self.client.post(format!("{base}/api/ptz")).json(&json_body(action, speed));
                Self::authorize(device, request).send().await?.error_for_status()?;
            }
        }
        Ok(())
    }

    async fn send_chain(&self, device: &Device, action: &Action, speed: u8) -> Outcome {
        let mut last_error = String::new();
        for shape in Shape::CHAIN {
            match self.attempt(device, shape, action, speed).await {
                Ok(()) => {
                    tracing::trace!(device_id = %device.id, shape = shape.label(), %action, "http ptz command sent");
                    return Outcome::ok();
                }
                Err(e) => {
                    tracing::debug!(
                        device_id = %device.id,
                        shape = shape.label(),
                        error = %e,
                        "http ptz shape failed, trying next"
                    );
                    last_error = format!("{}: {e}", shape.label());
                }
            }
        }

        tracing::warn!(device_id = %device.id, error = %last_error, "all http ptz shapes failed");
        Outcome::failed(last_error)
    }
}

#[async_trait]
impl ProtocolAdapter for NdiAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Ndi
    }

    async fn send(&self, device: &Device, action: &Action, speed: u8) -> Outcome {
        self.send_chain(device, action, speed).await
    }

    async fn stop(&self, device: &Device) -> Outcome {
        self.send_chain(device, &Action::Stop, 0).await
    }

    async fn discover(&self) -> Result<Vec<Device>> {
        // No native discovery; heads are registered manually
        Ok(Vec::new())
    }
}

fn rest_query(action: &Action, speed: u8) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("action", action.name().to_lowercase()),
        ("speed", speed.to_string()),
    ];
    match action {
        Action::Vector(v) => {
            query.push(("x", format!("{:.3}", v.x)));
            query.push(("y", format!("{:.3}", v.y)));
        }
        Action::PresetRecall(n) | Action::PresetStore(n) => query.push(("preset", n.to_string())),
        _ => {}
    }
    query
}

fn json_body(action: &Action, speed: u8) -> serde_json::Value {
    let mut body = json!({
        "action": action.name().to_lowercase(),
        "speed": speed,
    });
    match action {
        Action::Vector(v) => {
            body["x"] = json!(v.x);
            body["y"] = json!(v.y);
        }
        Action::PresetRecall(n) | Action::PresetStore(n) => body["preset"] = json!(n),
        _ => {}
    }
    body
}

/// Legacy CGI command strings; stop halts pan/tilt and zoom separately
fn cgi_commands(action: &Action, speed: u8) -> Vec<String> {
    let drive = scale_speed(speed, CGI_MAX_DRIVE).max(1);
    let zoom = scale_speed(speed, CGI_MAX_ZOOM);
    match action {
        Action::Stop => vec!["ptzstop".to_string(), "zoomstop".to_string()],
        Action::PanLeft => vec![format!("left&{drive}&{drive}")],
        Action::PanRight => vec![format!("right&{drive}&{drive}")],
        Action::TiltUp => vec![format!("up&{drive}&{drive}")],
        Action::TiltDown => vec![format!("down&{drive}&{drive}")],
        Action::ZoomIn => vec![format!("zoomin&{zoom}")],
        Action::ZoomOut => vec![format!("zoomout&{zoom}")],
        Action::PresetRecall(n) => vec![format!("poscall&{n}")],
        Action::PresetStore(n) => vec![format!("posset&{n}")],
        Action::Vector(v) => match cgi_direction(v) {
            Some(direction) => vec![format!("{direction}&{drive}&{drive}")],
            None => vec!["ptzstop".to_string()],
        },
    }
}

fn cgi_direction(v: &Vector) -> Option<&'static str> {
    let horizontal = if v.x <= -DEADZONE {
        "left"
    } else if v.x >= DEADZONE {
        "right"
    } else {
        ""
    };
    let vertical = if v.y >= DEADZONE {
        "up"
    } else if v.y <= -DEADZONE {
        "down"
    } else {
        ""
    };
    match (horizontal, vertical) {
        ("", "") => None,
        (h, "") => Some(h),
        ("", vert) => Some(vert),
        ("left", "up") => Some("leftup"),
        ("left", _) => Some("leftdown"),
        (_, "up") => Some("rightup"),
        _ => Some("rightdown"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_query_includes_vector() {
        let query = rest_query(&Action::Vector(Vector::new(0.5, -0.25)), 80);
        assert_eq!(
            query,
            vec![
                ("action", "vector".to_string()),
                ("speed", "80".to_string()),
                ("x", "0.500".to_string()),
                ("y", "-0.250".to_string()),
            ]
        );
    }

    #[test]
    fn json_body_includes_preset() {
        let body = json_body(&Action::PresetRecall(4), 50);
        assert_eq!(body, json!({"action": "preset_recall", "speed": 50, "preset": 4}));
    }

    #[test]
    fn cgi_directional() {
        assert_eq!(cgi_commands(&Action::PanLeft, 100), vec!["left&24&24"]);
        assert_eq!(cgi_commands(&Action::ZoomIn, 100), vec!["zoomin&7"]);
        assert_eq!(cgi_commands(&Action::Stop, 0), vec!["ptzstop", "zoomstop"]);
    }

    #[test]
    fn cgi_vector_diagonals() {
        assert_eq!(cgi_direction(&Vector::new(-0.5, 0.5)), Some("leftup"));
        assert_eq!(cgi_direction(&Vector::new(0.5, -0.5)), Some("rightdown"));
        assert_eq!(cgi_direction(&Vector::new(0.0, -0.5)), Some("down"));
        assert_eq!(cgi_direction(&Vector::new(0.0, 0.0)), None);
    }
}
