//! Per-device dispatch state owned by the router

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::command::Action;
use crate::devices::Device;

/// Latest conflated intent waiting for the in-flight send to finish
#[derive(Debug, Clone)]
pub(crate) struct Pending {
    pub device: Device,
    pub action: Action,
    pub speed: u8,
}

/// Armed dead-man's switch
#[derive(Debug)]
pub(crate) struct Watchdog {
    /// Distinguishes this arming from any later one
    pub generation: u64,
    pub handle: JoinHandle<()>,
}

/// Dispatch state for one device, created lazily on its first command
#[derive(Debug, Default)]
pub(crate) struct DispatchState {
    pub busy: bool,
    pub pending: Option<Pending>,
    pub watchdog: Option<Watchdog>,
}

impl DispatchState {
    /// Abort and drop any armed watchdog
    pub fn cancel_watchdog(&mut self) {
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.handle.abort();
        }
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            busy: self.busy,
            pending: self.pending.as_ref().map(|p| p.action),
            watchdog_armed: self.watchdog.is_some(),
        }
    }
}

/// Read-only view of a device's dispatch state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchSnapshot {
    pub busy: bool,
    #[serde(serialize_with = "serialize_action")]
    pub pending: Option<Action>,
    pub watchdog_armed: bool,
}

impl DispatchSnapshot {
    /// Idle with nothing queued and no timer
    #[must_use]
    pub const fn is_quiescent(&self) -> bool {
        !self.busy && self.pending.is_none() && !self.watchdog_armed
    }
}

#[allow(clippy::ref_option)]
fn serialize_action<S: serde::Serializer>(action: &Option<Action>, serializer: S) -> Result<S::Ok, S::Error> {
    match action {
        Some(action) => serializer.serialize_some(&action.to_string()),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_aborts_task() {
        let handle = tokio::spawn(std::future::pending::<()>());
        let mut state = DispatchState {
            watchdog: Some(Watchdog { generation: 1, handle }),
            ..DispatchState::default()
        };
        assert!(state.snapshot().watchdog_armed);

        state.cancel_watchdog();
        assert!(state.snapshot().is_quiescent());
    }

    #[test]
    fn snapshot_reports_pending_action() {
        let state = DispatchState {
            busy: true,
            pending: Some(Pending {
                device: Device::new("10.0.0.1", 80, crate::devices::Protocol::Panasonic),
                action: Action::TiltUp,
                speed: 40,
            }),
            watchdog: None,
        };
        let snapshot = state.snapshot();
        assert_eq!(snapshot.pending, Some(Action::TiltUp));
        assert_eq!(
            serde_json::to_value(&snapshot).unwrap(),
            serde_json::json!({"busy": true, "pending": "TILT_UP", "watchdog_armed": false})
        );
    }
}
