//! Daemon - the local gateway service
//!
//! Registers configured cameras, runs discovery, then feeds every inbound
//! relay command through the security gate into the router until the
//! inbound stream closes or shutdown is requested.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tokio::io::AsyncBufRead;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::devices::{Device, DeviceRegistry};
use crate::discovery::DiscoveryAggregator;
use crate::protocols::AdapterSet;
use crate::relay::InboundStream;
use crate::router::{CommandRouter, DispatchReport};
use crate::security::SecurityGate;
use crate::{Config, Result};

/// The PTZ gateway daemon
pub struct Daemon {
    config: Config,
    registry: Arc<RwLock<DeviceRegistry>>,
    router: CommandRouter,
    gate: SecurityGate,
    discovery: DiscoveryAggregator,
}

impl Daemon {
    /// Create a daemon driving the four standard camera families
    ///
    /// # Errors
    ///
    /// Returns error if no room secret is configured or the HTTP client
    /// cannot be built
    pub fn new(config: Config) -> Result<Self> {
        let adapters = AdapterSet::standard(config.adapter_options())?;
        Self::with_adapters(config, adapters)
    }

    /// Create a daemon over an explicit adapter set
    ///
    /// Configured `[[devices]]` are registered immediately; an invalid
    /// entry is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns error if no room secret is configured
    pub fn with_adapters(config: Config, adapters: AdapterSet) -> Result<Self> {
        let gate = SecurityGate::new(config.require_secret()?);

        let mut registry = DeviceRegistry::new();
        for registration in config.devices.iter().cloned() {
            let ip = registration.ip.clone();
            if let Err(e) = registry.register(registration) {
                tracing::warn!(ip = %ip, error = %e, "skipping configured device");
            }
        }
        tracing::info!(devices = registry.len(), adapters = adapters.len(), "gateway initialized");

        let router = CommandRouter::with_watchdog(adapters.clone(), config.watchdog);
        let discovery = DiscoveryAggregator::new(adapters).with_timeout(config.discovery.round_timeout());

        Ok(Self {
            config,
            registry: Arc::new(RwLock::new(registry)),
            router,
            gate,
            discovery,
        })
    }

    /// Shared device registry
    #[must_use]
    pub fn registry(&self) -> Arc<RwLock<DeviceRegistry>> {
        Arc::clone(&self.registry)
    }

    #[must_use]
    pub const fn router(&self) -> &CommandRouter {
        &self.router
    }

    /// Current registry contents
    pub async fn devices(&self) -> Vec<Device> {
        self.registry.read().await.snapshot()
    }

    /// Run discovery once and merge the results into the registry
    pub async fn discover(&self) {
        self.discovery.refresh(&self.registry).await;
    }

    /// Gate one inbound payload and route it, waiting for the sends
    ///
    /// A rejected payload yields no reports.
    pub async fn handle(&self, payload: &Value) -> Vec<DispatchReport> {
        let Ok(command) = self.gate.admit(payload) else {
            return Vec::new();
        };
        let devices = self.devices().await;
        self.router.route(&command, &devices).await
    }

    /// Run against stdin until EOF or Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns error if reading stdin fails
    pub async fn run(self) -> Result<()> {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let shutdown = async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
            }
        };
        self.serve(stdin, shutdown).await
    }

    /// Serve inbound commands from `reader` until it closes or `shutdown` completes
    ///
    /// Every known device is sent STOP before returning.
    ///
    /// # Errors
    ///
    /// Returns error if reading the inbound stream fails
    pub async fn serve<R, S>(self, reader: R, shutdown: S) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        S: Future<Output = ()>,
    {
        if self.config.discovery.enabled {
            self.discover().await;
        }
        let rediscovery = match (self.config.discovery.enabled, self.config.discovery.interval) {
            (true, Some(interval)) => {
                tracing::info!(interval_secs = interval.as_secs(), "periodic discovery enabled");
                Some(self.discovery.spawn_periodic(self.registry(), interval))
            }
            _ => None,
        };

        let mut inbound = InboundStream::new(reader);
        let mut in_flight: Vec<JoinHandle<Vec<DispatchReport>>> = Vec::new();
        tokio::pin!(shutdown);
        tracing::info!("waiting for inbound commands");

        let result = loop {
            tokio::select! {
                () = &mut shutdown => break Ok(()),
                next = inbound.next_payload() => match next {
                    Ok(Some(payload)) => {
                        in_flight.retain(|handle| !handle.is_finished());
                        if let Some(handle) = self.accept(&payload).await {
                            in_flight.push(handle);
                        }
                    }
                    Ok(None) => {
                        tracing::info!("inbound stream closed");
                        break Ok(());
                    }
                    Err(e) => break Err(e),
                },
            }
        };

        if let Some(handle) = rediscovery {
            handle.abort();
        }
        // Sends still in flight must land before the final stop
        join_all(in_flight).await;
        let devices = self.devices().await;
        self.router.stop_all(&devices).await;
        tracing::info!(devices = devices.len(), "all cameras stopped");
        result
    }

    /// Gate a payload and hand it to the router without waiting for the sends
    async fn accept(&self, payload: &Value) -> Option<JoinHandle<Vec<DispatchReport>>> {
        let command = self.gate.admit(payload).ok()?;
        tracing::debug!(action = %command.action, selector = %command.target, "command admitted");
        let devices = self.devices().await;
        Some(self.router.submit(&command, &devices).await)
    }
}
