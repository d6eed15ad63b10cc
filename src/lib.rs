//! Partition-affinity routing for a thin cache client.
//!
//! This crate sends every keyed cache operation straight to a node that owns
//! the key's partition, saving the extra hop through an arbitrary
//! coordinator node. It provides:
//! - **Hashing** of serialized keys with the hash the cluster itself uses
//! - **Partition tables** published as immutable snapshots
//! - **Affinity routing** from key hash to partition to owner endpoints
//! - **Cache operations** (`put`, `get`, `contains_key`) over a pluggable
//!   transport, with a TCP transport included
//!
//! # Example
//!
//! ```rust,no_run
//! use affinity_client::{ClientConfig, ThinClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::from_addrs(&["127.0.0.1:10800", "127.0.0.1:10801"])?;
//!     let client = ThinClient::new(config)?;
//!
//!     let cache = client.cache("users");
//!
//!     // Load the partition map before the first keyed operation.
//!     cache.refresh_partitions().await?;
//!
//!     cache.put("user:123", "Alice").await?;
//!
//!     if let Some(name) = cache.get::<_, String>("user:123").await? {
//!         println!("Found: {}", name);
//!     }
//!
//!     assert!(cache.contains_key("user:123").await?);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │            Application Layer                │
//! └─────────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────────┐
//! │              CacheClient API                │
//! │  • put(key, value) -> Result<()>            │
//! │  • get(key) -> Result<Option<Value>>        │
//! │  • contains_key(key) -> Result<bool>        │
//! │  • refresh_partitions() -> Result<()>       │
//! └─────────────────────────────────────────────┘
//!                     │
//!     ┌───────────────┼───────────────┐
//!     ▼               ▼               ▼
//! ┌──────────┐  ┌───────────┐  ┌───────────┐
//! │   Hash   │  │ Partition │  │ Transport │
//! │ Computer │  │   Table   │  │   (TCP)   │
//! └──────────┘  └───────────┘  └───────────┘
//! ```
//!
//! # Routing Model
//!
//! - **Hash**: computed over the key's serialized bytes
//! - **Partition**: bit-spread hash masked by `N - 1` when the partition
//!   count `N` is a power of two, `|hash mod N|` otherwise
//! - **Endpoints**: primary owner first, then backups; an empty list means
//!   the transport picks any seed node
//!
//! Routing is an optimization. A stale table only costs an extra hop on the
//! server side, which is why refreshes are explicit and never automatic.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod marshal;
pub mod metrics;
pub mod network;
pub mod partitioning;
pub mod testing;
pub mod types;

// Re-export main types for convenience
pub use cache::{CacheClient, ClientState, KeyRouter, RoutingDecision};
pub use client::ThinClient;
pub use config::ClientConfig;
pub use error::{Error, NetworkError, Result};
pub use marshal::{array_hash_code, BincodeMarshaller, Marshaller};
pub use types::{cache_id_for_name, CacheHandle, CacheId, Endpoint, PartitionId};

// Re-export partitioning types
pub use partitioning::{
    partition_of, routing_mask, HashComputer, NodePartitions, PartitionSnapshot, PartitionTable,
    MAX_PARTITIONS, NO_MASK,
};

// Re-export network types
pub use network::{
    CacheRequest, CacheResponse, ResponsePayload, ResponseStatus, TcpTransport, Transport,
};

// Re-export metrics types
pub use metrics::{Counter, Gauge, LabeledCounter, RoutingMetrics, RoutingMetricsSnapshot};
