//! Device registry
//!
//! Devices are cameras reachable on the LAN. The registry is filled by
//! discovery and manual registration and read by the command router.

pub mod registry;
pub mod types;

pub use registry::DeviceRegistry;
pub use types::{Credentials, Device, DeviceRegistration, MergeSummary, Protocol, device_id};
