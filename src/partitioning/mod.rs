//! Partitioning module for routing keys to the nodes that own them.
//!
//! The cluster splits its key space into a fixed number of partitions and
//! assigns each partition to an ordered list of nodes (primary first, then
//! backups). This module mirrors that assignment on the client:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      PartitionTable                          │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │        PartitionSnapshot (immutable, swapped)        │  │
//! │  │  ┌──────┐ ┌──────┐ ┌──────┐ ┌──────┐                 │  │
//! │  │  │ P0   │ │ P1   │ │ P2   │ │ P3   │  mask = N-1     │  │
//! │  │  │[A,B] │ │ [C]  │ │[A,B] │ │ [C]  │  or NO_MASK     │  │
//! │  │  └──────┘ └──────┘ └──────┘ └──────┘                 │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! │                                                             │
//! │  key → HashComputer → hash → partition_of → P1 → [C]       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use affinity_client::partitioning::{NodePartitions, PartitionTable};
//! use affinity_client::Endpoint;
//!
//! let table = PartitionTable::new();
//! let snapshot = table
//!     .update_from(&[
//!         NodePartitions::new(vec![Endpoint::new("a", 10800)], vec![0, 2]),
//!         NodePartitions::new(vec![Endpoint::new("c", 10800)], vec![1, 3]),
//!     ])
//!     .unwrap();
//!
//! let partition = snapshot.partition_for_hash(5);
//! assert_eq!(partition, 1);
//! assert_eq!(table.lookup_endpoints(partition).unwrap()[0].host, "c");
//! ```

mod affinity;
mod hasher;
mod table;

pub use affinity::{partition_of, routing_mask, NO_MASK};
pub use hasher::HashComputer;
pub use table::{NodePartitions, PartitionSnapshot, PartitionTable, MAX_PARTITIONS};
