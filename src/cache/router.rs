//! Key routing for cache operations.
//!
//! Ties the hash computer to the partition table: a key is serialized,
//! hashed, mapped to a partition and resolved to that partition's endpoints,
//! all against one snapshot of the table.

use crate::error::Result;
use crate::marshal::Marshaller;
use crate::partitioning::{HashComputer, PartitionTable};
use crate::types::{Endpoint, PartitionId};
use serde::Serialize;
use std::sync::Arc;

/// Routing decision for a key.
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    /// Target partition.
    pub partition: PartitionId,

    /// Key hash used for routing.
    pub key_hash: i32,

    /// Owner endpoints, primary first. Empty when the partition has no owner.
    pub endpoints: Arc<[Endpoint]>,

    /// Version of the table the decision was made against.
    pub table_version: u64,
}

impl RoutingDecision {
    /// Whether an owner is known for the partition.
    pub fn is_routed(&self) -> bool {
        !self.endpoints.is_empty()
    }

    /// Primary owner of the partition.
    pub fn primary(&self) -> Option<&Endpoint> {
        self.endpoints.first()
    }
}

/// A serialized key with its routing decision.
#[derive(Debug, Clone)]
pub struct RoutedKey {
    /// Serialized key.
    pub key: Vec<u8>,

    /// Where to send it.
    pub decision: RoutingDecision,
}

/// Routes keys to the endpoints owning their partition.
#[derive(Debug)]
pub struct KeyRouter<M> {
    hasher: HashComputer<M>,
    table: PartitionTable,
}

impl<M: Marshaller> KeyRouter<M> {
    /// Create a router over a marshaller and a partition table.
    pub fn new(marshaller: Arc<M>, table: PartitionTable) -> Self {
        Self {
            hasher: HashComputer::new(marshaller),
            table,
        }
    }

    /// The partition table.
    pub fn table(&self) -> &PartitionTable {
        &self.table
    }

    /// The hash computer.
    pub fn hasher(&self) -> &HashComputer<M> {
        &self.hasher
    }

    /// Route a precomputed key hash.
    pub fn route_hash(&self, key_hash: i32) -> Result<RoutingDecision> {
        let snapshot = self.table.snapshot()?;
        let partition = snapshot.partition_for_hash(key_hash);

        Ok(RoutingDecision {
            partition,
            key_hash,
            endpoints: snapshot.endpoints(partition),
            table_version: snapshot.version(),
        })
    }

    /// Serialize and route a key.
    ///
    /// Fails with `PartitionTableNotReady` before serializing anything when
    /// no table has been published yet.
    pub fn route<K: Serialize + ?Sized>(&self, key: &K) -> Result<RoutedKey> {
        let snapshot = self.table.snapshot()?;
        let (key, key_hash) = self.hasher.serialize_and_hash(key)?;
        let partition = snapshot.partition_for_hash(key_hash);

        Ok(RoutedKey {
            key,
            decision: RoutingDecision {
                partition,
                key_hash,
                endpoints: snapshot.endpoints(partition),
                table_version: snapshot.version(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::partitioning::NodePartitions;
    use crate::testing::StubMarshaller;

    fn ep(name: &str) -> Endpoint {
        Endpoint::new(name, 10800)
    }

    fn router_with_hash(hash: i32) -> KeyRouter<StubMarshaller> {
        KeyRouter::new(Arc::new(StubMarshaller::with_hash(hash)), PartitionTable::new())
    }

    #[test]
    fn test_route_before_refresh() {
        let router = router_with_hash(5);
        assert!(matches!(router.route("key"), Err(Error::PartitionTableNotReady)));
        assert!(matches!(router.route_hash(5), Err(Error::PartitionTableNotReady)));
    }

    #[test]
    fn test_route_to_owner() {
        let router = router_with_hash(5);
        router
            .table()
            .update_from(&[
                NodePartitions::new(vec![ep("a"), ep("b")], vec![0, 2]),
                NodePartitions::new(vec![ep("c")], vec![1, 3]),
            ])
            .unwrap();

        let routed = router.route("key").unwrap();
        assert_eq!(routed.key, bincode::serialize("key").unwrap());
        assert_eq!(routed.decision.partition, 1);
        assert_eq!(routed.decision.key_hash, 5);
        assert_eq!(routed.decision.primary(), Some(&ep("c")));
        assert_eq!(routed.decision.table_version, 1);
        assert!(routed.decision.is_routed());
    }

    #[test]
    fn test_route_unassigned_partition() {
        let router = router_with_hash(1);
        router
            .table()
            .update_from(&[NodePartitions::new(vec![ep("a")], vec![0, 3])])
            .unwrap();

        let decision = router.route_hash(1).unwrap();
        assert_eq!(decision.partition, 1);
        assert!(!decision.is_routed());
        assert_eq!(decision.primary(), None);
    }
}
