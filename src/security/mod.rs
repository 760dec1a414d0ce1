//! Inbound command security: room secret check and command sanitization

pub mod auth;
pub mod gate;

pub use auth::RoomSecret;
pub use gate::{Rejection, SecurityGate, sanitize};
