//! Discovery aggregator
//!
//! Runs every adapter's discovery as its own task so a panicking, failing
//! or hanging family only loses its own contribution.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::RwLock;

use crate::devices::{Device, DeviceRegistry, MergeSummary, Protocol};
use crate::protocols::{AdapterSet, ProtocolAdapter};
use crate::{Error, Result};

/// Fans discovery out across protocol families
#[derive(Clone)]
pub struct DiscoveryAggregator {
    adapters: AdapterSet,
    /// Upper bound on any single family's discovery
    timeout: Option<Duration>,
}

impl DiscoveryAggregator {
    #[must_use]
    pub const fn new(adapters: AdapterSet) -> Self {
        Self {
            adapters,
            timeout: None,
        }
    }

    /// Bound every family's discovery by `timeout`
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Discover across all families, returning the union of successes
    ///
    /// Failures are logged per family and otherwise ignored.
    pub async fn discover(&self) -> Vec<Device> {
        let tasks = self.adapters.all().into_iter().map(|adapter| {
            let protocol = adapter.protocol();
            let timeout = self.timeout;
            let handle = tokio::spawn(async move { run_one(adapter, timeout).await });
            async move { (protocol, handle.await) }
        });

        let mut devices = Vec::new();
        for (protocol, joined) in join_all(tasks).await {
            match joined {
                Ok(Ok(found)) => {
                    tracing::debug!(%protocol, count = found.len(), "discovery finished");
                    devices.extend(found);
                }
                Ok(Err(e)) => tracing::warn!(%protocol, error = %e, "discovery failed"),
                Err(e) => tracing::warn!(%protocol, error = %e, "discovery task aborted"),
            }
        }
        devices
    }

    /// Discover and merge the results into a shared registry
    pub async fn refresh(&self, registry: &RwLock<DeviceRegistry>) -> MergeSummary {
        let devices = self.discover().await;
        let summary = registry.write().await.merge(devices);
        tracing::info!(
            inserted = summary.inserted,
            updated = summary.updated,
            "discovery merged into registry"
        );
        summary
    }

    /// Re-run [`Self::refresh`] every `interval` until the task is aborted
    pub fn spawn_periodic(
        &self,
        registry: Arc<RwLock<DeviceRegistry>>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let aggregator = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // first tick completes immediately; startup discovery already ran
            ticker.tick().await;
            loop {
                ticker.tick().await;
                aggregator.refresh(&registry).await;
            }
        })
    }
}

async fn run_one(adapter: Arc<dyn ProtocolAdapter>, timeout: Option<Duration>) -> Result<Vec<Device>> {
    let protocol: Protocol = adapter.protocol();
    match timeout {
        Some(limit) => tokio::time::timeout(limit, adapter.discover())
            .await
            .map_err(|_| Error::Discovery(format!("{protocol} discovery timed out after {limit:?}")))?,
        None => adapter.discover().await,
    }
}
