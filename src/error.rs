//! Error types for the affinity client.

use crate::network::rpc::ResponseStatus;
use std::io;
use thiserror::Error;

/// Result type alias for affinity client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the affinity client.
#[derive(Error, Debug)]
pub enum Error {
    /// A keyed operation was attempted before any successful partition refresh.
    #[error("partition table not ready: refresh partitions first")]
    PartitionTableNotReady,

    /// The partition map assigns one partition to more than one endpoint group.
    #[error("partition {partition} assigned more than once in partition map")]
    DuplicatePartitionAssignment { partition: i32 },

    /// The partition map contains a negative partition id.
    #[error("invalid partition id in partition map: {0}")]
    InvalidPartitionId(i32),

    /// The server answered with a non-success status.
    #[error("cache operation failed ({status:?}): {message}")]
    CacheOperation {
        status: ResponseStatus,
        message: String,
    },

    /// The server answered with a payload of the wrong kind.
    #[error("unexpected response payload, expected {expected}")]
    UnexpectedResponse { expected: &'static str },

    /// Network communication errors.
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    /// Key or value (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
}

/// Network communication errors.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Connection failed.
    #[error("connection failed to {addr}: {reason}")]
    ConnectionFailed { addr: String, reason: String },

    /// Connection was closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Failed to send message.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Failed to receive message.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// No endpoint to send the request to.
    #[error("no endpoints available")]
    NoEndpoints,

    /// Every endpoint in the list failed.
    #[error("all {attempted} endpoints failed, last error: {last_error}")]
    AllEndpointsFailed {
        attempted: usize,
        last_error: String,
    },

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl Error {
    /// Whether the error came from the server rather than from this client.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::CacheOperation { .. })
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::PartitionTableNotReady => "not_ready",
            Error::DuplicatePartitionAssignment { .. } => "duplicate_partition",
            Error::InvalidPartitionId(_) => "invalid_partition",
            Error::CacheOperation { .. } => "server",
            Error::UnexpectedResponse { .. } => "unexpected_response",
            Error::Network(_) => "network",
            Error::Serialization(_) => "serialization",
            Error::Config(_) => "config",
        }
    }
}
