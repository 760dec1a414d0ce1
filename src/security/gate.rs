//! Security gate in front of the command router
//!
//! Reduces an arbitrary inbound JSON object to a well-typed [`Command`].
//! Anything that fails the secret check or the allow-list never reaches
//! the router.

use serde_json::Value;
use thiserror::Error;

use super::auth::RoomSecret;
use crate::command::{Action, Command, DEFAULT_SPEED, MAX_PRESET, MAX_SPEED, Target, Vector};

/// Why an inbound command was dropped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Missing or wrong room password
    #[error("room password mismatch")]
    Unauthorized,

    /// Inbound payload is not a JSON object
    #[error("payload is not an object")]
    NotAnObject,

    /// `action` absent, empty or not a string
    #[error("missing action")]
    MissingAction,

    /// `action` not in the allow-list
    #[error("action not allowed: {0}")]
    DisallowedAction(String),

    /// `VECTOR` without a numeric `{x, y}` direction
    #[error("vector action requires numeric x and y")]
    MalformedVector,
}

/// Verifies the room secret and sanitizes inbound commands
#[derive(Debug, Clone)]
pub struct SecurityGate {
    secret: RoomSecret,
}

impl SecurityGate {
    #[must_use]
    pub const fn new(secret: RoomSecret) -> Self {
        Self { secret }
    }

    /// Admit an inbound payload, or explain why it was dropped
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] when the password does not match or the
    /// payload fails the shape/allow-list check
    pub fn admit(&self, payload: &Value) -> Result<Command, Rejection> {
        let object = payload.as_object().ok_or(Rejection::NotAnObject)?;

        let password = object.get("password").and_then(Value::as_str).unwrap_or("");
        if !self.secret.verify(password) {
            tracing::warn!("dropping command: room password mismatch");
            return Err(Rejection::Unauthorized);
        }

        sanitize(payload).inspect_err(|e| {
            tracing::warn!(reason = %e, "dropping command: failed sanitization");
        })
    }
}

/// Reduce an inbound payload to a [`Command`] without checking the secret
///
/// - `action`: non-empty string, upper-cased with `-` mapped to `_`,
///   must be in the allow-list
/// - `speed`: numeric values clamped into `0..=100`, otherwise 50
/// - `target`: string selector, otherwise every device
/// - `preset`: numeric values clamped into `0..=99`, otherwise 0
///
/// # Errors
///
/// Returns a [`Rejection`] for a missing, disallowed or malformed action
pub fn sanitize(payload: &Value) -> Result<Command, Rejection> {
    let object = payload.as_object().ok_or(Rejection::NotAnObject)?;

    let raw_action = object
        .get("action")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or(Rejection::MissingAction)?;
    let name = raw_action.to_ascii_uppercase().replace('-', "_");

    let vector = object.get("vector").and_then(parse_vector);
    let preset = object
        .get("preset")
        .and_then(Value::as_f64)
        .filter(|p| p.is_finite())
        .map_or(0, |p| clamp_to_u8(p, MAX_PRESET));

    let action = match Action::from_name(&name, preset, vector) {
        Some(action) => action,
        None if name == "VECTOR" => return Err(Rejection::MalformedVector),
        None => return Err(Rejection::DisallowedAction(raw_action.to_string())),
    };

    let speed = object
        .get("speed")
        .and_then(Value::as_f64)
        .filter(|s| s.is_finite())
        .map_or(DEFAULT_SPEED, |s| clamp_to_u8(s, MAX_SPEED));

    let target = object
        .get("target")
        .and_then(Value::as_str)
        .map_or(Target::All, Target::parse);

    Ok(Command::new(action, target, speed))
}

fn parse_vector(value: &Value) -> Option<Vector> {
    let x = value.get("x").and_then(Value::as_f64)?;
    let y = value.get("y").and_then(Value::as_f64)?;
    if !x.is_finite() || !y.is_finite() {
        return None;
    }
    Some(Vector::new(x, y))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_to_u8(value: f64, max: u8) -> u8 {
    value.round().clamp(0.0, f64::from(max)) as u8
}
