//! In-memory stand-ins for the transport and serialization capabilities.

use super::mock_server::RequestHandler;
use crate::error::{NetworkError, Result};
use crate::marshal::{BincodeMarshaller, Marshaller};
use crate::network::rpc::{
    CacheRequest, CacheResponse, RequestKind, ResponsePayload, ResponseStatus,
};
use crate::network::Transport;
use crate::partitioning::NodePartitions;
use crate::types::{CacheId, Endpoint};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A whole cluster in one map: serves cache operations and a settable
/// partition map.
#[derive(Debug, Default)]
pub struct InMemoryCluster {
    entries: Mutex<HashMap<(CacheId, Vec<u8>), Vec<u8>>>,
    partition_map: Mutex<Vec<NodePartitions>>,
    known_caches: Mutex<Option<HashSet<CacheId>>>,
}

impl InMemoryCluster {
    /// Create an empty cluster that accepts any cache id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the partition map returned to refreshes.
    pub fn set_partition_map(&self, groups: Vec<NodePartitions>) {
        *self.partition_map.lock() = groups;
    }

    /// Restrict the cluster to the given caches; others get
    /// [`ResponseStatus::CacheDoesNotExist`].
    pub fn with_caches(self, caches: impl IntoIterator<Item = CacheId>) -> Self {
        *self.known_caches.lock() = Some(caches.into_iter().collect());
        self
    }

    /// Number of stored entries across all caches.
    pub fn entry_count(&self) -> usize {
        self.entries.lock().len()
    }
}

impl RequestHandler for InMemoryCluster {
    fn handle(&self, request: CacheRequest) -> CacheResponse {
        if let Some(known) = self.known_caches.lock().as_ref() {
            if !known.contains(&request.cache_id) {
                return CacheResponse::error(
                    ResponseStatus::CacheDoesNotExist,
                    format!("Cache does not exist [cacheId={}]", request.cache_id),
                );
            }
        }

        let cache_id = request.cache_id;
        match request.kind {
            RequestKind::Put { key, value } => {
                self.entries.lock().insert((cache_id, key), value);
                CacheResponse::success(ResponsePayload::Empty)
            }
            RequestKind::Get { key } => {
                let value = self.entries.lock().get(&(cache_id, key)).cloned();
                CacheResponse::success(ResponsePayload::Value(value))
            }
            RequestKind::ContainsKey { key } => {
                let present = self.entries.lock().contains_key(&(cache_id, key));
                CacheResponse::success(ResponsePayload::Bool(present))
            }
            RequestKind::NodePartitions => CacheResponse::success(ResponsePayload::NodePartitions(
                self.partition_map.lock().clone(),
            )),
        }
    }
}

/// A request as seen by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct SentRequest {
    /// The request.
    pub request: CacheRequest,
    /// Endpoints it was addressed to; empty for metadata requests.
    pub endpoints: Vec<Endpoint>,
    /// Whether it went through the metadata path.
    pub metadata: bool,
}

/// Transport that records every request and answers from an
/// [`InMemoryCluster`].
#[derive(Debug)]
pub struct MockTransport {
    cluster: Arc<InMemoryCluster>,
    sent: Mutex<Vec<SentRequest>>,
    canned: Mutex<Vec<CacheResponse>>,
    fail_transport: Mutex<bool>,
    metadata_delay: Mutex<Option<Duration>>,
}

impl MockTransport {
    /// Create a transport over a fresh cluster.
    pub fn new() -> Self {
        Self::with_cluster(Arc::new(InMemoryCluster::new()))
    }

    /// Create a transport over an existing cluster.
    pub fn with_cluster(cluster: Arc<InMemoryCluster>) -> Self {
        Self {
            cluster,
            sent: Mutex::new(Vec::new()),
            canned: Mutex::new(Vec::new()),
            fail_transport: Mutex::new(false),
            metadata_delay: Mutex::new(None),
        }
    }

    /// The cluster behind this transport.
    pub fn cluster(&self) -> &Arc<InMemoryCluster> {
        &self.cluster
    }

    /// Answer the next request with `response` instead of asking the cluster.
    pub fn push_response(&self, response: CacheResponse) {
        self.canned.lock().push(response);
    }

    /// Make every request fail with a transport error.
    pub fn set_fail_transport(&self, fail: bool) {
        *self.fail_transport.lock() = fail;
    }

    /// Delay metadata responses, to widen race windows in tests.
    pub fn set_metadata_delay(&self, delay: Option<Duration>) {
        *self.metadata_delay.lock() = delay;
    }

    /// All requests sent so far.
    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().clone()
    }

    /// The most recent keyed (non-metadata) request.
    pub fn last_keyed(&self) -> Option<SentRequest> {
        self.sent.lock().iter().rev().find(|s| !s.metadata).cloned()
    }

    /// Number of metadata requests sent.
    pub fn metadata_requests(&self) -> usize {
        self.sent.lock().iter().filter(|s| s.metadata).count()
    }

    fn dispatch(
        &self,
        request: CacheRequest,
        endpoints: &[Endpoint],
        metadata: bool,
    ) -> Result<CacheResponse> {
        self.sent.lock().push(SentRequest {
            request: request.clone(),
            endpoints: endpoints.to_vec(),
            metadata,
        });

        if *self.fail_transport.lock() {
            return Err(NetworkError::AllEndpointsFailed {
                attempted: endpoints.len().max(1),
                last_error: "connection refused".to_string(),
            }
            .into());
        }

        let canned = {
            let mut canned = self.canned.lock();
            if canned.is_empty() {
                None
            } else {
                Some(canned.remove(0))
            }
        };

        Ok(canned.unwrap_or_else(|| self.cluster.handle(request)))
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: CacheRequest, endpoints: &[Endpoint]) -> Result<CacheResponse> {
        self.dispatch(request, endpoints, false)
    }

    async fn send_no_meta_update(&self, request: CacheRequest) -> Result<CacheResponse> {
        let delay = *self.metadata_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.dispatch(request, &[], true)
    }
}

/// Marshaller with bincode encoding and a settable constant hash.
#[derive(Debug, Default)]
pub struct StubMarshaller {
    hash: AtomicI32,
}

impl StubMarshaller {
    /// Create a marshaller hashing every key to `hash`.
    pub fn with_hash(hash: i32) -> Self {
        Self {
            hash: AtomicI32::new(hash),
        }
    }

    /// Change the hash returned for every key.
    pub fn set_hash(&self, hash: i32) {
        self.hash.store(hash, Ordering::SeqCst);
    }
}

impl Marshaller for StubMarshaller {
    fn marshal<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        BincodeMarshaller.marshal(value)
    }

    fn unmarshal<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        BincodeMarshaller.unmarshal(bytes)
    }

    fn hash_code(&self, _bytes: &[u8]) -> i32 {
        self.hash.load(Ordering::SeqCst)
    }
}
