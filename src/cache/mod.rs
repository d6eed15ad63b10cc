//! Cache operations with partition-aware routing.

pub mod router;

pub use router::{KeyRouter, RoutedKey, RoutingDecision};

use crate::error::{Error, Result};
use crate::marshal::{BincodeMarshaller, Marshaller};
use crate::metrics::RoutingMetrics;
use crate::network::rpc::{CacheRequest, ResponsePayload};
use crate::network::Transport;
use crate::partitioning::{PartitionSnapshot, PartitionTable};
use crate::types::{CacheHandle, Endpoint};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Lifecycle state of a cache client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No partition map has been loaded; keyed operations fail.
    Uninitialized,
    /// A partition map is installed.
    Ready,
}

/// Client for one named cache.
///
/// Every keyed operation is routed to the nodes owning the key's partition.
/// Call [`refresh_partitions`](Self::refresh_partitions) once before the
/// first keyed operation and again whenever the cluster topology changes.
pub struct CacheClient<M: Marshaller = BincodeMarshaller> {
    handle: CacheHandle,
    transport: Arc<dyn Transport>,
    router: KeyRouter<M>,
    /// Serializes refreshes so concurrent callers publish one after another.
    refresh_lock: Mutex<()>,
    metrics: Arc<RoutingMetrics>,
    affinity_awareness: bool,
}

impl CacheClient<BincodeMarshaller> {
    /// Create a client using the bincode marshaller.
    pub fn new(handle: CacheHandle, transport: Arc<dyn Transport>) -> Self {
        Self::with_marshaller(handle, transport, Arc::new(BincodeMarshaller))
    }
}

impl<M: Marshaller> CacheClient<M> {
    /// Create a client with a custom marshaller.
    pub fn with_marshaller(
        handle: CacheHandle,
        transport: Arc<dyn Transport>,
        marshaller: Arc<M>,
    ) -> Self {
        Self::with_metrics(handle, transport, marshaller, Arc::new(RoutingMetrics::new()))
    }

    /// Create a client reporting into shared metrics.
    pub fn with_metrics(
        handle: CacheHandle,
        transport: Arc<dyn Transport>,
        marshaller: Arc<M>,
        metrics: Arc<RoutingMetrics>,
    ) -> Self {
        let table = PartitionTable::with_metrics(metrics.clone());
        Self {
            handle,
            transport,
            router: KeyRouter::new(marshaller, table),
            refresh_lock: Mutex::new(()),
            metrics,
            affinity_awareness: true,
        }
    }

    /// Enable or disable affinity routing. When disabled, keyed requests go
    /// out with no endpoints, no partition map is needed and
    /// [`refresh_partitions`](Self::refresh_partitions) sends nothing.
    pub fn with_affinity_awareness(mut self, enabled: bool) -> Self {
        self.affinity_awareness = enabled;
        self
    }

    /// Whether keyed requests are routed to partition owners.
    pub fn affinity_awareness(&self) -> bool {
        self.affinity_awareness
    }

    /// The cache this client targets.
    pub fn handle(&self) -> &CacheHandle {
        &self.handle
    }

    /// The partition table.
    pub fn partition_table(&self) -> &PartitionTable {
        self.router.table()
    }

    /// Routing metrics.
    pub fn metrics(&self) -> &Arc<RoutingMetrics> {
        &self.metrics
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ClientState {
        if self.router.table().is_ready() {
            ClientState::Ready
        } else {
            ClientState::Uninitialized
        }
    }

    /// Compute where a key would be sent without sending anything.
    pub fn route<K: Serialize + ?Sized>(&self, key: &K) -> Result<RoutingDecision> {
        self.router.route(key).map(|routed| routed.decision)
    }

    /// Store a value under a key.
    pub async fn put<K, V>(&self, key: &K, value: &V) -> Result<()>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        let result = self.try_put(key, value).await;
        self.observe(result)
    }

    /// Fetch the value stored under a key.
    pub async fn get<K, V>(&self, key: &K) -> Result<Option<V>>
    where
        K: Serialize + ?Sized,
        V: DeserializeOwned,
    {
        let result = self.try_get(key).await;
        self.observe(result)
    }

    /// Check whether a key is present.
    pub async fn contains_key<K: Serialize + ?Sized>(&self, key: &K) -> Result<bool> {
        let result = self.try_contains_key(key).await;
        self.observe(result)
    }

    /// Fetch the partition map from the cluster and install it.
    ///
    /// On any failure the previously installed table stays in place.
    pub async fn refresh_partitions(&self) -> Result<()> {
        if !self.affinity_awareness {
            debug!(cache = %self.handle, "Affinity awareness disabled, skipping refresh");
            return Ok(());
        }

        let _guard = self.refresh_lock.lock().await;

        let result = self.fetch_partitions().await;
        self.metrics.record_refresh(result.is_ok());

        match &result {
            Ok(snapshot) => info!(
                cache = %self.handle,
                partitions = snapshot.partition_count(),
                version = snapshot.version(),
                "Partition map refreshed"
            ),
            Err(e) => warn!(cache = %self.handle, error = %e, "Partition map refresh failed"),
        }

        self.observe(result.map(|_| ()))
    }

    async fn try_put<K, V>(&self, key: &K, value: &V) -> Result<()>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        let (key, decision) = self.locate(key)?;
        let value = self.router.hasher().marshaller().marshal(value)?;
        let request = CacheRequest::put(self.handle.id(), self.handle.is_binary(), key, value);

        match self.dispatch(request, decision.as_ref()).await? {
            ResponsePayload::Empty => Ok(()),
            _ => Err(Error::UnexpectedResponse { expected: "empty" }),
        }
    }

    async fn try_get<K, V>(&self, key: &K) -> Result<Option<V>>
    where
        K: Serialize + ?Sized,
        V: DeserializeOwned,
    {
        let (key, decision) = self.locate(key)?;
        let request = CacheRequest::get(self.handle.id(), self.handle.is_binary(), key);

        match self.dispatch(request, decision.as_ref()).await? {
            ResponsePayload::Value(Some(bytes)) => {
                let value = self.router.hasher().marshaller().unmarshal(&bytes)?;
                Ok(Some(value))
            }
            ResponsePayload::Value(None) => Ok(None),
            _ => Err(Error::UnexpectedResponse { expected: "value" }),
        }
    }

    async fn try_contains_key<K: Serialize + ?Sized>(&self, key: &K) -> Result<bool> {
        let (key, decision) = self.locate(key)?;
        let request = CacheRequest::contains_key(self.handle.id(), self.handle.is_binary(), key);

        match self.dispatch(request, decision.as_ref()).await? {
            ResponsePayload::Bool(present) => Ok(present),
            _ => Err(Error::UnexpectedResponse { expected: "bool" }),
        }
    }

    /// Serialized key and, with affinity awareness on, its routing decision.
    fn locate<K>(&self, key: &K) -> Result<(Vec<u8>, Option<RoutingDecision>)>
    where
        K: Serialize + ?Sized,
    {
        if !self.affinity_awareness {
            let key = self.router.hasher().marshaller().marshal(key)?;
            return Ok((key, None));
        }

        let routed = self.router.route(key)?;
        Ok((routed.key, Some(routed.decision)))
    }

    async fn dispatch(
        &self,
        request: CacheRequest,
        decision: Option<&RoutingDecision>,
    ) -> Result<ResponsePayload> {
        let endpoints: &[Endpoint] = match decision {
            Some(decision) => {
                debug!(
                    cache = %self.handle,
                    partition = decision.partition,
                    hash = decision.key_hash,
                    endpoints = decision.endpoints.len(),
                    version = decision.table_version,
                    "Dispatching keyed request"
                );
                &decision.endpoints[..]
            }
            None => {
                debug!(cache = %self.handle, "Dispatching unrouted keyed request");
                &[]
            }
        };

        self.metrics.record_request(!endpoints.is_empty());

        self.transport
            .send(request, endpoints)
            .await?
            .into_result()
    }

    async fn fetch_partitions(&self) -> Result<Arc<PartitionSnapshot>> {
        let request = CacheRequest::node_partitions(self.handle.id(), self.handle.is_binary());
        let payload = self.transport.send_no_meta_update(request).await?.into_result()?;

        match payload {
            ResponsePayload::NodePartitions(groups) => self.router.table().update_from(&groups),
            _ => Err(Error::UnexpectedResponse {
                expected: "partition map",
            }),
        }
    }

    fn observe<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.metrics.record_error(e);
        }
        result
    }
}

impl<M: Marshaller> fmt::Debug for CacheClient<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheClient")
            .field("handle", &self.handle)
            .field("state", &self.state())
            .field("affinity_awareness", &self.affinity_awareness)
            .field("table_version", &self.router.table().version())
            .finish()
    }
}
