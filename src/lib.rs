//! PTZ Gateway - local command router for pan-tilt-zoom cameras
//!
//! Receives operator commands relayed from a hosted message bus and drives
//! cameras on the LAN across four control protocols:
//! - Panasonic AW CGI over HTTP
//! - ONVIF SOAP over HTTP, with WS-Discovery
//! - VISCA over UDP
//! - Generic HTTP/REST (NDI-style heads)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               Relay (inbound JSON lines)             │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │   Security Gate  │  room secret + allow-list         │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │   Command Router │ conflation │ watchdog │ STOP     │
//! └────────────────────┬────────────────────────────────┘
//!                      │                ▲
//! ┌────────────────────▼──────────┐ ┌───┴──────────────┐
//! │ Panasonic │ ONVIF │ VISCA │ HTTP │ │ Device Registry │◄── Discovery
//! └───────────────────────────────┘ └──────────────────┘
//! ```

pub mod command;
pub mod config;
pub mod daemon;
pub mod devices;
pub mod discovery;
pub mod error;
pub mod protocols;
pub mod relay;
pub mod router;
pub mod security;

pub use command::{Action, Command, Target, Vector};
pub use config::Config;
pub use daemon::Daemon;
pub use devices::{Device, DeviceRegistration, DeviceRegistry, Protocol};
pub use discovery::DiscoveryAggregator;
pub use error::{Error, Result};
pub use protocols::{AdapterOptions, AdapterSet, Outcome, ProtocolAdapter};
pub use router::{CommandRouter, DispatchOutcome, DispatchReport, DispatchSnapshot};
pub use security::{Rejection, RoomSecret, SecurityGate};
