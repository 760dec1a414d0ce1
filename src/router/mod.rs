//! Command router
//!
//! Turns a stream of sanitized commands into per-device wire sends:
//!
//! - STOP bypasses everything: it is sent at once, even while another send
//!   for the same device is in flight, and discards any pending motion.
//! - A command for a busy device replaces the pending one (latest wins).
//! - An idle device is marked busy, sent the command, then drained of
//!   whatever became pending meanwhile.
//! - Continuous motion arms a watchdog; unless renewed within the horizon
//!   the device is force-stopped.

mod state;

pub use state::DispatchSnapshot;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::command::{Action, Command, Target};
use crate::devices::Device;
use crate::protocols::{AdapterSet, Outcome, ProtocolAdapter};
use state::{DispatchState, Pending, Watchdog};

/// Default dead-man's switch horizon
pub const DEFAULT_WATCHDOG: Duration = Duration::from_millis(600);

/// What happened to a command for one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The adapter was called; its outcome is attached
    Sent(Outcome),
    /// The device was busy; the command replaced the pending one
    Conflated,
    /// No adapter is installed for the device's protocol
    NoHandler,
}

/// Per-device result of [`CommandRouter::route`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub device_id: String,
    #[serde(flatten)]
    pub outcome: DispatchOutcome,
}

/// Decision taken for one target while holding the state lock
enum Claim {
    /// Nothing to send
    Settled(String, DispatchOutcome),
    /// STOP bypass
    Stop(Device, Arc<dyn ProtocolAdapter>),
    /// Device was idle and is now marked busy
    Send(Device, Arc<dyn ProtocolAdapter>, Action, u8),
}

struct RouterInner {
    adapters: AdapterSet,
    horizon: Duration,
    states: Mutex<HashMap<String, DispatchState>>,
    generation: AtomicU64,
}

/// Per-device serialized dispatcher with conflation and watchdog
///
/// Cheap to clone; clones share dispatch state.
#[derive(Clone)]
pub struct CommandRouter {
    inner: Arc<RouterInner>,
}

impl CommandRouter {
    /// Create a router with the default watchdog horizon
    #[must_use]
    pub fn new(adapters: AdapterSet) -> Self {
        Self::with_watchdog(adapters, DEFAULT_WATCHDOG)
    }

    /// Create a router with a custom watchdog horizon
    #[must_use]
    pub fn with_watchdog(adapters: AdapterSet, horizon: Duration) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                adapters,
                horizon,
                states: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    #[must_use]
    pub fn horizon(&self) -> Duration {
        self.inner.horizon
    }

    /// Dispatch a command to every device it targets
    ///
    /// An unknown device identifier resolves to nothing and yields no
    /// report. Targets are dispatched concurrently.
    pub async fn route(&self, command: &Command, devices: &[Device]) -> Vec<DispatchReport> {
        let claims = self.claim(command, devices).await;
        self.execute(claims).await
    }

    /// Update dispatch state for a command, then send in the background
    ///
    /// State changes (conflation, watchdog, busy marking) are applied
    /// before this returns, so commands submitted one after another keep
    /// their order even though the sends run detached.
    pub async fn submit(&self, command: &Command, devices: &[Device]) -> JoinHandle<Vec<DispatchReport>> {
        let claims = self.claim(command, devices).await;
        let router = self.clone();
        tokio::spawn(async move { router.execute(claims).await })
    }

    /// Send STOP to every given device through the STOP bypass
    pub async fn stop_all(&self, devices: &[Device]) -> Vec<DispatchReport> {
        let stop = Command::new(Action::Stop, Target::All, 0);
        self.route(&stop, devices).await
    }

    /// Dispatch state of a device, if it was ever commanded
    pub async fn state(&self, device_id: &str) -> Option<DispatchSnapshot> {
        self.inner
            .states
            .lock()
            .await
            .get(device_id)
            .map(DispatchState::snapshot)
    }

    /// Apply the dispatch discipline to every target's state
    async fn claim(&self, command: &Command, devices: &[Device]) -> Vec<Claim> {
        let targets = resolve_targets(&command.target, devices);
        if targets.is_empty() {
            tracing::debug!(selector = %command.target, action = %command.action, "command matched no device");
            return Vec::new();
        }

        let action = command.action;
        let mut states = self.inner.states.lock().await;
        targets
            .into_iter()
            .map(|device| {
                let Some(adapter) = self.inner.adapters.get(device.protocol) else {
                    tracing::warn!(device_id = %device.id, protocol = %device.protocol, "no adapter for protocol");
                    return Claim::Settled(device.id.clone(), DispatchOutcome::NoHandler);
                };
                let state = states.entry(device.id.clone()).or_default();
                state.cancel_watchdog();

                if action.is_stop() {
                    state.pending = None;
                    return Claim::Stop(device.clone(), adapter);
                }

                if action.is_continuous() {
                    state.watchdog = Some(self.arm_watchdog(device.clone()));
                }
                if state.busy {
                    state.pending = Some(Pending {
                        device: device.clone(),
                        action,
                        speed: command.speed,
                    });
                    tracing::trace!(device_id = %device.id, %action, "command conflated");
                    return Claim::Settled(device.id.clone(), DispatchOutcome::Conflated);
                }
                state.busy = true;
                Claim::Send(device.clone(), adapter, action, command.speed)
            })
            .collect()
    }

    /// Perform the sends a claim pass decided on
    async fn execute(&self, claims: Vec<Claim>) -> Vec<DispatchReport> {
        let sends = claims.into_iter().map(|claim| async move {
            match claim {
                Claim::Settled(device_id, outcome) => DispatchReport { device_id, outcome },
                Claim::Stop(device, adapter) => {
                    tracing::debug!(device_id = %device.id, "stop dispatched");
                    let outcome = adapter.stop(&device).await;
                    log_failure(&device, &Action::Stop, &outcome);
                    DispatchReport {
                        device_id: device.id,
                        outcome: DispatchOutcome::Sent(outcome),
                    }
                }
                Claim::Send(device, adapter, action, speed) => {
                    let outcome = adapter.send(&device, &action, speed).await;
                    log_failure(&device, &action, &outcome);
                    self.drain(&device.id).await;
                    DispatchReport {
                        device_id: device.id,
                        outcome: DispatchOutcome::Sent(outcome),
                    }
                }
            }
        });
        join_all(sends).await
    }

    /// Execute pending commands until none remain, then mark idle
    async fn drain(&self, device_id: &str) {
        loop {
            let next = {
                let mut states = self.inner.states.lock().await;
                let Some(state) = states.get_mut(device_id) else {
                    return;
                };
                match state.pending.take() {
                    Some(pending) => pending,
                    None => {
                        state.busy = false;
                        return;
                    }
                }
            };

            let outcome = match self.inner.adapters.get(next.device.protocol) {
                Some(adapter) => adapter.send(&next.device, &next.action, next.speed).await,
                None => Outcome::failed(format!("no adapter for {}", next.device.protocol)),
            };
            log_failure(&next.device, &next.action, &outcome);
        }
    }

    fn arm_watchdog(&self, device: Device) -> Watchdog {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let router = self.clone();
        let horizon = self.inner.horizon;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(horizon).await;
            router.fire_watchdog(&device, generation).await;
        });
        Watchdog { generation, handle }
    }

    async fn fire_watchdog(&self, device: &Device, generation: u64) {
        {
            let mut states = self.inner.states.lock().await;
            let Some(state) = states.get_mut(&device.id) else {
                return;
            };
            if state.watchdog.as_ref().map(|w| w.generation) != Some(generation) {
                return;
            }
            // Dropping our own handle detaches it; aborting would kill this task
            state.watchdog = None;
            state.pending = None;
        }

        tracing::warn!(
            device_id = %device.id,
            horizon_ms = self.inner.horizon.as_millis(),
            "no renewing command, forcing stop"
        );
        if let Some(adapter) = self.inner.adapters.get(device.protocol) {
            let outcome = adapter.stop(device).await;
            log_failure(device, &Action::Stop, &outcome);
        }
    }
}

fn log_failure(device: &Device, action: &Action, outcome: &Outcome) {
    if !outcome.success {
        tracing::warn!(
            device_id = %device.id,
            %action,
            error = outcome.error.as_deref().unwrap_or("unknown"),
            "dispatch failed"
        );
    }
}

/// Devices a target selector addresses
fn resolve_targets<'a>(target: &Target, devices: &'a [Device]) -> Vec<&'a Device> {
    match target {
        Target::All => devices.iter().collect(),
        Target::Device(id) => devices.iter().filter(|d| d.id == *id).take(1).collect(),
    }
}
