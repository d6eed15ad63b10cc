//! Request dispatch to cluster nodes.
//!
//! [`Transport`] is the seam between routing and the network: the routing
//! layer hands it a request and the ordered endpoints that own the key, and
//! gets back exactly one response or one error. [`TcpTransport`] is the
//! reference implementation.

use super::rpc::{
    decode_message, frame_message, CacheRequest, CacheResponse, ClientRequest, Message,
};
use crate::config::ClientConfig;
use crate::error::{Error, NetworkError, Result};
use crate::types::Endpoint;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Delivers cache requests to cluster nodes.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send a request, trying `endpoints` in order until one answers.
    ///
    /// An empty list means the owner is unknown and any node may serve it.
    async fn send(&self, request: CacheRequest, endpoints: &[Endpoint]) -> Result<CacheResponse>;

    /// Send a metadata request to any node.
    ///
    /// Used for the partition map refresh itself, so implementations must not
    /// trigger another refresh from here.
    async fn send_no_meta_update(&self, request: CacheRequest) -> Result<CacheResponse>;
}

/// Transport opening one TCP connection per attempt.
///
/// Frames are a 4-byte big-endian length followed by a bincode [`Message`].
/// Owner endpoints are tried first, then the configured seed endpoints.
#[derive(Debug)]
pub struct TcpTransport {
    config: ClientConfig,
    next_request_id: AtomicU64,
}

impl TcpTransport {
    /// Create a transport over the configured seed endpoints.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            next_request_id: AtomicU64::new(1),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Owner endpoints followed by seed endpoints not already listed.
    fn candidates(&self, endpoints: &[Endpoint]) -> Vec<Endpoint> {
        let mut candidates = endpoints.to_vec();
        for seed in &self.config.endpoints {
            if !candidates.contains(seed) {
                candidates.push(seed.clone());
            }
        }
        candidates
    }

    async fn send_to_candidates(
        &self,
        request: &CacheRequest,
        candidates: &[Endpoint],
    ) -> Result<CacheResponse> {
        if candidates.is_empty() {
            return Err(NetworkError::NoEndpoints.into());
        }

        let mut last_error = None;

        for endpoint in candidates {
            match self.exchange(endpoint, request).await {
                Ok(response) => {
                    debug!(endpoint = %endpoint, status = ?response.status, "Request served");
                    return Ok(response);
                }
                Err(e) => {
                    warn!(endpoint = %endpoint, error = %e, "Request failed, trying next endpoint");
                    last_error = Some(e);
                }
            }
        }

        Err(NetworkError::AllEndpointsFailed {
            attempted: candidates.len(),
            last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        }
        .into())
    }

    /// One request/response exchange with one endpoint.
    async fn exchange(&self, endpoint: &Endpoint, request: &CacheRequest) -> Result<CacheResponse> {
        let addr = endpoint.to_string();

        let mut stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect(addr.as_str()),
        )
        .await
        .map_err(|_| NetworkError::ConnectionFailed {
            addr: addr.clone(),
            reason: "connection timeout".to_string(),
        })?
        .map_err(|e| NetworkError::ConnectionFailed {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;

        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let framed = frame_message(&Message::Request(ClientRequest {
            request_id,
            request: request.clone(),
        }))?;

        let reply = tokio::time::timeout(
            self.config.request_timeout,
            Self::round_trip(&mut stream, &framed, self.config.max_message_size),
        )
        .await
        .map_err(|_| NetworkError::ReceiveFailed(format!("request to {} timed out", addr)))??;

        match reply {
            Message::Response(rsp) if rsp.request_id == request_id => Ok(rsp.response),
            Message::Response(rsp) => Err(NetworkError::ReceiveFailed(format!(
                "response id {} does not match request id {}",
                rsp.request_id, request_id
            ))
            .into()),
            Message::Request(_) => {
                Err(NetworkError::ReceiveFailed("expected a response message".to_string()).into())
            }
        }
    }

    async fn round_trip(stream: &mut TcpStream, framed: &[u8], max_size: usize) -> Result<Message> {
        stream
            .write_all(framed)
            .await
            .map_err(|e| NetworkError::SendFailed(e.to_string()))?;

        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                NetworkError::ConnectionClosed
            } else {
                NetworkError::Io(e)
            }
        })?;

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > max_size {
            return Err(NetworkError::ReceiveFailed(format!(
                "message too large: {} bytes, limit {}",
                len, max_size
            ))
            .into());
        }

        let mut data = vec![0u8; len];
        stream.read_exact(&mut data).await.map_err(NetworkError::Io)?;

        decode_message(&data).map_err(|e| Error::from(NetworkError::ReceiveFailed(e.to_string())))
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, request: CacheRequest, endpoints: &[Endpoint]) -> Result<CacheResponse> {
        if endpoints.is_empty() {
            debug!("No owner endpoints, sending to seed endpoints");
        }
        let candidates = self.candidates(endpoints);
        self.send_to_candidates(&request, &candidates).await
    }

    async fn send_no_meta_update(&self, request: CacheRequest) -> Result<CacheResponse> {
        let candidates = self.config.endpoints.clone();
        self.send_to_candidates(&request, &candidates).await
    }
}
