//! Sanitized PTZ command model
//!
//! A [`Command`] is what the security gate hands to the router: a closed
//! action, a target selector and a speed already coerced into range.

use std::fmt;

use serde::Serialize;

/// Default speed when an inbound command carries none
pub const DEFAULT_SPEED: u8 = 50;

/// Upper bound for speed
pub const MAX_SPEED: u8 = 100;

/// Highest preset slot addressable across all families
pub const MAX_PRESET: u8 = 99;

/// Wire names accepted by the security gate, after normalization
pub const ALLOWED_ACTIONS: &[&str] = &[
    "PAN_LEFT",
    "PAN_RIGHT",
    "TILT_UP",
    "TILT_DOWN",
    "ZOOM_IN",
    "ZOOM_OUT",
    "STOP",
    "PRESET_RECALL",
    "PRESET_STORE",
    "VECTOR",
];

/// Continuous 2-D motion direction, each axis in `[-1, 1]`
///
/// Positive `x` pans right, positive `y` tilts up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

impl Vector {
    /// Build a vector, clamping both axes into `[-1, 1]`
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: x.clamp(-1.0, 1.0),
            y: y.clamp(-1.0, 1.0),
        }
    }

    /// Whether both axes sit inside the given deadzone
    #[must_use]
    pub fn within_deadzone(&self, deadzone: f64) -> bool {
        self.x.abs() < deadzone && self.y.abs() < deadzone
    }
}

/// PTZ action, one of a closed enumeration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    PanLeft,
    PanRight,
    TiltUp,
    TiltDown,
    ZoomIn,
    ZoomOut,
    Stop,
    /// Recall a stored preset slot
    PresetRecall(u8),
    /// Store the current position into a preset slot
    PresetStore(u8),
    /// Continuous joystick-style motion
    Vector(Vector),
}

impl Action {
    /// Build an action from its normalized wire name
    ///
    /// `preset` is used by the preset variants, `vector` by `VECTOR`.
    /// Returns `None` for names outside [`ALLOWED_ACTIONS`] or a `VECTOR`
    /// without a direction.
    #[must_use]
    pub fn from_name(name: &str, preset: u8, vector: Option<Vector>) -> Option<Self> {
        let action = match name {
            "PAN_LEFT" => Self::PanLeft,
            "PAN_RIGHT" => Self::PanRight,
            "TILT_UP" => Self::TiltUp,
            "TILT_DOWN" => Self::TiltDown,
            "ZOOM_IN" => Self::ZoomIn,
            "ZOOM_OUT" => Self::ZoomOut,
            "STOP" => Self::Stop,
            "PRESET_RECALL" => Self::PresetRecall(preset.min(MAX_PRESET)),
            "PRESET_STORE" => Self::PresetStore(preset.min(MAX_PRESET)),
            "VECTOR" => Self::Vector(vector?),
            _ => return None,
        };
        Some(action)
    }

    /// Normalized wire name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PanLeft => "PAN_LEFT",
            Self::PanRight => "PAN_RIGHT",
            Self::TiltUp => "TILT_UP",
            Self::TiltDown => "TILT_DOWN",
            Self::ZoomIn => "ZOOM_IN",
            Self::ZoomOut => "ZOOM_OUT",
            Self::Stop => "STOP",
            Self::PresetRecall(_) => "PRESET_RECALL",
            Self::PresetStore(_) => "PRESET_STORE",
            Self::Vector(_) => "VECTOR",
        }
    }

    #[must_use]
    pub const fn is_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }

    /// Continuous motion keeps the camera moving until told otherwise,
    /// so it must be fed by the operator or the watchdog stops it
    #[must_use]
    pub const fn is_continuous(&self) -> bool {
        matches!(
            self,
            Self::PanLeft
                | Self::PanRight
                | Self::TiltUp
                | Self::TiltDown
                | Self::ZoomIn
                | Self::ZoomOut
                | Self::Vector(_)
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PresetRecall(n) | Self::PresetStore(n) => write!(f, "{}({n})", self.name()),
            Self::Vector(v) => write!(f, "{}({:.2},{:.2})", self.name(), v.x, v.y),
            _ => f.write_str(self.name()),
        }
    }
}

/// Which devices a command addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every device in the registry
    All,
    /// A single device identifier
    Device(String),
}

impl Target {
    /// Parse a target selector; `"all"` (any case) or empty means every device
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Device(value.to_string())
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Device(id) => f.write_str(id),
        }
    }
}

/// A command that passed the security gate
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub action: Action,
    pub target: Target,
    /// Speed in `0..=100`
    pub speed: u8,
}

impl Command {
    #[must_use]
    pub fn new(action: Action, target: Target, speed: u8) -> Self {
        Self {
            action,
            target,
            speed: speed.min(MAX_SPEED),
        }
    }
}
