//! Request and response payloads exchanged with cluster nodes.

use crate::error::{Error, Result};
use crate::partitioning::NodePartitions;
use crate::types::CacheId;
use serde::{Deserialize, Serialize};

/// A cache request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRequest {
    /// Target cache.
    pub cache_id: CacheId,

    /// Keep values in binary form on the server.
    pub binary: bool,

    /// Operation and its arguments.
    pub kind: RequestKind,
}

/// Operation carried by a [`CacheRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequestKind {
    /// Insert or update a key-value pair.
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Read the value of a key.
    Get { key: Vec<u8> },

    /// Check whether a key is present.
    ContainsKey { key: Vec<u8> },

    /// Fetch the cache's partition map.
    NodePartitions,
}

impl CacheRequest {
    /// Create a put request.
    pub fn put(cache_id: CacheId, binary: bool, key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            cache_id,
            binary,
            kind: RequestKind::Put { key, value },
        }
    }

    /// Create a get request.
    pub fn get(cache_id: CacheId, binary: bool, key: Vec<u8>) -> Self {
        Self {
            cache_id,
            binary,
            kind: RequestKind::Get { key },
        }
    }

    /// Create a contains-key request.
    pub fn contains_key(cache_id: CacheId, binary: bool, key: Vec<u8>) -> Self {
        Self {
            cache_id,
            binary,
            kind: RequestKind::ContainsKey { key },
        }
    }

    /// Create a partition map request.
    pub fn node_partitions(cache_id: CacheId, binary: bool) -> Self {
        Self {
            cache_id,
            binary,
            kind: RequestKind::NodePartitions,
        }
    }

    /// Serialized key, if the operation has one.
    pub fn key(&self) -> Option<&[u8]> {
        match &self.kind {
            RequestKind::Put { key, .. }
            | RequestKind::Get { key }
            | RequestKind::ContainsKey { key } => Some(key),
            RequestKind::NodePartitions => None,
        }
    }
}

/// Status of a cache response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    Success,
    Failed,
    InvalidOpCode,
    CacheDoesNotExist,
    CacheExists,
    ResourceDoesNotExist,
    SecurityViolation,
    AuthFailed,
}

impl ResponseStatus {
    /// Numeric status code used by the cluster.
    pub fn code(self) -> i32 {
        match self {
            ResponseStatus::Success => 0,
            ResponseStatus::Failed => 1,
            ResponseStatus::InvalidOpCode => 2,
            ResponseStatus::CacheDoesNotExist => 1000,
            ResponseStatus::CacheExists => 1001,
            ResponseStatus::ResourceDoesNotExist => 1011,
            ResponseStatus::SecurityViolation => 1012,
            ResponseStatus::AuthFailed => 2000,
        }
    }
}

/// Payload of a cache response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponsePayload {
    /// No payload (put, errors).
    Empty,

    /// Serialized value, `None` when the key is absent.
    Value(Option<Vec<u8>>),

    /// Boolean result.
    Bool(bool),

    /// Partition map.
    NodePartitions(Vec<NodePartitions>),
}

/// A cache response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheResponse {
    /// Response status.
    pub status: ResponseStatus,

    /// Server message when the status is not success.
    pub error: Option<String>,

    /// Operation result.
    pub payload: ResponsePayload,
}

impl CacheResponse {
    /// Create a success response.
    pub fn success(payload: ResponsePayload) -> Self {
        Self {
            status: ResponseStatus::Success,
            error: None,
            payload,
        }
    }

    /// Create an error response.
    pub fn error(status: ResponseStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            error: Some(message.into()),
            payload: ResponsePayload::Empty,
        }
    }

    /// Payload if the status is success, otherwise the server error.
    pub fn into_result(self) -> Result<ResponsePayload> {
        if self.status == ResponseStatus::Success {
            return Ok(self.payload);
        }

        Err(Error::CacheOperation {
            status: self.status,
            message: self.error.unwrap_or_default(),
        })
    }
}

/// Network message wrapper used by the TCP transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    /// Client request.
    Request(ClientRequest),

    /// Response to a client request.
    Response(ClientResponse),
}

/// A request with its correlation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRequest {
    /// Unique request ID for correlation.
    pub request_id: u64,

    /// The request.
    pub request: CacheRequest,
}

/// A response with the correlation id of its request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientResponse {
    /// The request ID this is responding to.
    pub request_id: u64,

    /// The response.
    pub response: CacheResponse,
}

/// Encode a message to bytes.
pub fn encode_message(msg: &Message) -> std::result::Result<Vec<u8>, bincode::Error> {
    bincode::serialize(msg)
}

/// Decode a message from bytes.
pub fn decode_message(data: &[u8]) -> std::result::Result<Message, bincode::Error> {
    bincode::deserialize(data)
}

/// Frame a message with length prefix for TCP transmission.
pub fn frame_message(msg: &Message) -> std::result::Result<Vec<u8>, bincode::Error> {
    let data = encode_message(msg)?;
    let len = data.len() as u32;

    let mut framed = Vec::with_capacity(4 + data.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(&data);

    Ok(framed)
}
