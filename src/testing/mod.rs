//! Testing utilities for the affinity client.
//!
//! This module provides stand-ins for the parts of a cluster the routing
//! layer talks to:
//! - [`MockTransport`] records where each request was addressed and answers
//!   from an in-memory cluster, with knobs for injecting failures
//! - [`MockServer`] serves the real wire framing over TCP on a local port
//! - [`StubMarshaller`] pins the key hash so tests can aim at a partition
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   send(request, endpoints)   ┌────────────────┐
//! │ CacheClient  │ ───────────────────────────▶ │ MockTransport  │──┐
//! └──────────────┘                              └────────────────┘  │
//!        │                                                          ▼
//!        │ TcpTransport   ┌────────────┐                 ┌─────────────────┐
//!        └──────────────▶ │ MockServer │ ──────────────▶ │ InMemoryCluster │
//!                         └────────────┘                 └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use affinity_client::cache::CacheClient;
//! use affinity_client::partitioning::NodePartitions;
//! use affinity_client::testing::MockTransport;
//! use affinity_client::types::{CacheHandle, Endpoint};
//! use std::sync::Arc;
//!
//! # tokio_test_block_on(async {
//! let transport = Arc::new(MockTransport::new());
//! transport.cluster().set_partition_map(vec![NodePartitions::new(
//!     vec![Endpoint::new("node1", 10800)],
//!     vec![0, 1],
//! )]);
//!
//! let client = CacheClient::new(CacheHandle::from_name("users"), transport.clone());
//! client.refresh_partitions().await.unwrap();
//! client.put("alice", &1u32).await.unwrap();
//!
//! let sent = transport.last_keyed().unwrap();
//! assert_eq!(sent.endpoints, vec![Endpoint::new("node1", 10800)]);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

mod doubles;
mod mock_server;

mod tcp_client_tests;

pub use doubles::{InMemoryCluster, MockTransport, SentRequest, StubMarshaller};
pub use mock_server::{MockServer, RequestHandler};
