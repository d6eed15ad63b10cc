//! Client entry point.

use crate::cache::CacheClient;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::marshal::{BincodeMarshaller, Marshaller};
use crate::metrics::RoutingMetrics;
use crate::network::{TcpTransport, Transport};
use crate::types::{CacheHandle, CacheId};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Connection to a cache cluster.
///
/// Holds the transport and the routing metrics shared by every
/// [`CacheClient`] it hands out. Each cache client keeps its own partition
/// table and must be refreshed on its own.
#[derive(Clone)]
pub struct ThinClient {
    transport: Arc<dyn Transport>,
    metrics: Arc<RoutingMetrics>,
    affinity_awareness: bool,
}

impl ThinClient {
    /// Create a client talking TCP to the configured endpoints.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let affinity_awareness = config.affinity_awareness;
        let transport = TcpTransport::new(config)?;

        info!(
            endpoints = transport.config().endpoints.len(),
            affinity_awareness,
            "Thin client created"
        );

        Ok(Self::with_transport(Arc::new(transport)).with_affinity_awareness(affinity_awareness))
    }

    /// Create a client over an existing transport.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            metrics: Arc::new(RoutingMetrics::new()),
            affinity_awareness: true,
        }
    }

    /// Enable or disable affinity routing for caches created afterwards.
    pub fn with_affinity_awareness(mut self, enabled: bool) -> Self {
        self.affinity_awareness = enabled;
        self
    }

    /// Client for the cache called `name`, with the id the cluster derives
    /// from the name.
    pub fn cache(&self, name: &str) -> CacheClient<BincodeMarshaller> {
        self.cache_with_handle(CacheHandle::from_name(name), Arc::new(BincodeMarshaller))
    }

    /// Client for a cache with an explicit id.
    pub fn cache_with_id(&self, name: &str, id: CacheId) -> CacheClient<BincodeMarshaller> {
        self.cache_with_handle(CacheHandle::new(name, id), Arc::new(BincodeMarshaller))
    }

    /// Client for a cache with a custom marshaller.
    pub fn cache_with_handle<M: Marshaller>(
        &self,
        handle: CacheHandle,
        marshaller: Arc<M>,
    ) -> CacheClient<M> {
        CacheClient::with_metrics(
            handle,
            self.transport.clone(),
            marshaller,
            self.metrics.clone(),
        )
        .with_affinity_awareness(self.affinity_awareness)
    }

    /// Metrics shared by all caches of this client.
    pub fn metrics(&self) -> &Arc<RoutingMetrics> {
        &self.metrics
    }
}

impl fmt::Debug for ThinClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThinClient")
            .field("affinity_awareness", &self.affinity_awareness)
            .field("requests_total", &self.metrics.requests_total.get())
            .finish_non_exhaustive()
    }
}
