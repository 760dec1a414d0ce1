//! VISCA over UDP adapter
//!
//! Each datagram is `[0x81, <command bytes>, 0xFF]` sent to port 52381.
//! The transport gives no reliable acknowledgement, so a send counts as
//! complete after a short fixed wait.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{UdpSocket, lookup_host};

use super::{Outcome, ProtocolAdapter, scale_speed};
use crate::command::Action;
use crate::devices::{Device, Protocol};
use crate::{Error, Result};

/// Standard VISCA-over-IP control port
pub const VISCA_PORT: u16 = 52381;

/// Address byte for camera 1
const HEADER: u8 = 0x81;

/// Message terminator
const TERMINATOR: u8 = 0xFF;

/// Maximum pan/tilt drive speed
const MAX_DRIVE_SPEED: u8 = 0x18;

/// Maximum variable zoom speed
const MAX_ZOOM_SPEED: u8 = 0x07;

/// Vectors with both axes under this magnitude stop pan/tilt
const DEADZONE: f64 = 0.02;

/// Pan/tilt direction byte pairs
const UP: [u8; 2] = [0x03, 0x01];
const DOWN: [u8; 2] = [0x03, 0x02];
const LEFT: [u8; 2] = [0x01, 0x03];
const RIGHT: [u8; 2] = [0x02, 0x03];
const HALT: [u8; 2] = [0x03, 0x03];

/// VISCA adapter
pub struct ViscaAdapter {
    settle: Duration,
}

impl ViscaAdapter {
    /// Create an adapter waiting `settle` after each datagram
    #[must_use]
    pub const fn new(settle: Duration) -> Self {
        Self { settle }
    }

    async fn transmit(&self, device: &Device, packets: &[Vec<u8>]) -> Result<()> {
        let target: SocketAddr = lookup_host(device.authority())
            .await?
            .next()
            .ok_or_else(|| Error::Protocol(format!("cannot resolve {}", device.authority())))?;

        let bind = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind).await?;

        for packet in packets {
            socket.send_to(packet, target).await?;
            tokio::time::sleep(self.settle).await;
        }

        tracing::trace!(device_id = %device.id, packets = packets.len(), "visca datagrams sent");
        Ok(())
    }
}

#[async_trait]
impl ProtocolAdapter for ViscaAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Visca
    }

    async fn send(&self, device: &Device, action: &Action, speed: u8) -> Outcome {
        let Some(packet) = encode(action, speed) else {
            return self.stop(device).await;
        };

        let result = self.transmit(device, &[packet]).await;
        if let Err(e) = &result {
            tracing::warn!(device_id = %device.id, error = %e, "visca send failed");
        }
        result.into()
    }

    async fn stop(&self, device: &Device) -> Outcome {
        // Pan/tilt and zoom are independent axes; both need halting
        let result = self.transmit(device, &stop_packets()).await;
        if let Err(e) = &result {
            tracing::warn!(device_id = %device.id, error = %e, "visca stop failed");
        }
        result.into()
    }

    async fn discover(&self) -> Result<Vec<Device>> {
        // No native discovery; VISCA heads are registered manually
        Ok(Vec::new())
    }
}

/// Encode an action as one VISCA datagram
///
/// Returns `None` for [`Action::Stop`], which needs two datagrams.
#[must_use]
pub fn encode(action: &Action, speed: u8) -> Option<Vec<u8>> {
    let drive = drive_speed(speed);
    let packet = match action {
        Action::Stop => return None,
        Action::PanLeft => pan_tilt(drive, LEFT),
        Action::PanRight => pan_tilt(drive, RIGHT),
        Action::TiltUp => pan_tilt(drive, UP),
        Action::TiltDown => pan_tilt(drive, DOWN),
        Action::ZoomIn => wrap(&[0x01, 0x04, 0x07, 0x20 | zoom_speed(speed)]),
        Action::ZoomOut => wrap(&[0x01, 0x04, 0x07, 0x30 | zoom_speed(speed)]),
        Action::PresetRecall(n) => wrap(&[0x01, 0x04, 0x3F, 0x02, *n]),
        Action::PresetStore(n) => wrap(&[0x01, 0x04, 0x3F, 0x01, *n]),
        Action::Vector(v) => {
            if v.within_deadzone(DEADZONE) {
                pan_tilt(drive, HALT)
            } else {
                let magnitude = v.x.abs().max(v.y.abs());
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let scaled = (f64::from(speed.min(100)) * magnitude).round() as u8;
                pan_tilt(drive_speed(scaled), vector_direction(v.x, v.y))
            }
        }
    };
    Some(packet)
}

/// Pan/tilt stop followed by zoom stop
#[must_use]
pub fn stop_packets() -> Vec<Vec<u8>> {
    vec![
        pan_tilt(1, HALT),
        wrap(&[0x01, 0x04, 0x07, 0x00]),
    ]
}

/// Pan/tilt drive speed, clamped to `1..=24`
fn drive_speed(speed: u8) -> u8 {
    scale_speed(speed, MAX_DRIVE_SPEED).max(1)
}

fn zoom_speed(speed: u8) -> u8 {
    scale_speed(speed, MAX_ZOOM_SPEED)
}

fn vector_direction(x: f64, y: f64) -> [u8; 2] {
    let pan = if x <= -DEADZONE {
        0x01
    } else if x >= DEADZONE {
        0x02
    } else {
        0x03
    };
    let tilt = if y >= DEADZONE {
        0x01
    } else if y <= -DEADZONE {
        0x02
    } else {
        0x03
    };
    [pan, tilt]
}

fn pan_tilt(speed: u8, direction: [u8; 2]) -> Vec<u8> {
    wrap(&[0x01, 0x06, 0x01, speed, speed, direction[0], direction[1]])
}

fn wrap(body: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(body.len() + 2);
    packet.push(HEADER);
    packet.extend_from_slice(body);
    packet.push(TERMINATOR);
    packet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Vector;

    #[test]
    fn pan_left_full_speed() {
        let packet = encode(&Action::PanLeft, 100).unwrap();
        assert_eq!(packet, vec![0x81, 0x01, 0x06, 0x01, 0x18, 0x18, 0x01, 0x03, 0xFF]);
    }

    #[test]
    fn speed_floor_is_one() {
        let packet = encode(&Action::TiltUp, 0).unwrap();
        assert_eq!(packet[4], 0x01);
        assert_eq!(&packet[6..8], &UP);
    }

    #[test]
    fn zoom_encoding() {
        assert_eq!(encode(&Action::ZoomIn, 100).unwrap(), vec![0x81, 0x01, 0x04, 0x07, 0x27, 0xFF]);
        assert_eq!(encode(&Action::ZoomOut, 0).unwrap(), vec![0x81, 0x01, 0x04, 0x07, 0x30, 0xFF]);
    }

    #[test]
    fn preset_encoding() {
        assert_eq!(
            encode(&Action::PresetRecall(5), 50).unwrap(),
            vec![0x81, 0x01, 0x04, 0x3F, 0x02, 0x05, 0xFF]
        );
        assert_eq!(
            encode(&Action::PresetStore(5), 50).unwrap(),
            vec![0x81, 0x01, 0x04, 0x3F, 0x01, 0x05, 0xFF]
        );
    }

    #[test]
    fn vector_diagonal() {
        let packet = encode(&Action::Vector(Vector::new(0.5, 0.5)), 100).unwrap();
        // up-right at half deflection
        assert_eq!(packet[4], 12);
        assert_eq!(&packet[6..8], &[0x02, 0x01]);
    }

    #[test]
    fn vector_deadzone_halts() {
        let packet = encode(&Action::Vector(Vector::new(0.0, 0.01)), 100).unwrap();
        assert_eq!(&packet[6..8], &HALT);
    }

    #[test]
    fn stop_is_two_datagrams() {
        let packets = stop_packets();
        assert_eq!(packets.len(), 2);
        assert_eq!(&packets[0][6..8], &HALT);
        assert_eq!(packets[1], vec![0x81, 0x01, 0x04, 0x07, 0x00, 0xFF]);
        assert!(encode(&Action::Stop, 50).is_none());
    }

    #[tokio::test]
    async fn stop_transmits_both_sequences() {
        let camera = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = camera.local_addr().unwrap().port();
        let device = Device::new("127.0.0.1", port, Protocol::Visca);

        let adapter = ViscaAdapter::new(Duration::from_millis(1));
        let outcome = adapter.stop(&device).await;
        assert!(outcome.success);

        let mut buf = [0u8; 32];
        let (n, _) = camera.recv_from(&mut buf).await.unwrap();
        assert_eq!(buf[..n].to_vec(), stop_packets()[0]);
        let (n, _) = camera.recv_from(&mut buf).await.unwrap();
        assert_eq!(buf[..n].to_vec(), stop_packets()[1]);
    }

    #[tokio::test]
    async fn discovery_is_empty() {
        let adapter = ViscaAdapter::new(Duration::from_millis(1));
        assert!(adapter.discover().await.unwrap().is_empty());
    }
}
