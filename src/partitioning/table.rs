//! Partition table: partition id to ordered endpoint list.
//!
//! The table is an immutable [`PartitionSnapshot`] behind a pointer. A refresh
//! builds a complete new snapshot off to the side and swaps the pointer, so a
//! reader sees either the whole old table or the whole new one. The lock
//! guards only the pointer, never the build or the lookup itself.

use super::affinity::{partition_of, routing_mask};
use crate::error::{Error, Result};
use crate::metrics::RoutingMetrics;
use crate::types::{Endpoint, PartitionId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Upper bound on partition count accepted from a partition map, matching
/// the cluster's own limit.
pub const MAX_PARTITIONS: usize = 65_000;

/// One group of a partition map: the partitions served by an endpoint list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePartitions {
    /// Endpoints of the owning node, primary first.
    pub endpoints: Vec<Endpoint>,
    /// Partitions owned.
    pub partitions: Vec<PartitionId>,
}

impl NodePartitions {
    /// Create a new group.
    pub fn new(endpoints: Vec<Endpoint>, partitions: Vec<PartitionId>) -> Self {
        Self {
            endpoints,
            partitions,
        }
    }
}

/// An immutable, complete partition assignment.
#[derive(Debug)]
pub struct PartitionSnapshot {
    /// Index is the partition id. Partitions of one group share a list.
    assignment: Vec<Arc<[Endpoint]>>,

    /// Routing mask derived from the partition count.
    mask: i32,

    /// Publication sequence number, starting at 1.
    version: u64,
}

impl PartitionSnapshot {
    /// Build a snapshot from a partition map.
    ///
    /// Fails without side effects on a repeated partition id or one outside
    /// `[0, MAX_PARTITIONS)`.
    pub fn build(groups: &[NodePartitions], version: u64) -> Result<Self> {
        let mut slots: Vec<Option<Arc<[Endpoint]>>> = Vec::new();

        for group in groups {
            let endpoints: Arc<[Endpoint]> = Arc::from(group.endpoints.as_slice());

            for &partition in &group.partitions {
                let idx = match usize::try_from(partition) {
                    Ok(idx) if idx < MAX_PARTITIONS => idx,
                    _ => return Err(Error::InvalidPartitionId(partition)),
                };

                if idx >= slots.len() {
                    slots.resize(idx + 1, None);
                }

                if slots[idx].is_some() {
                    return Err(Error::DuplicatePartitionAssignment { partition });
                }
                slots[idx] = Some(endpoints.clone());
            }
        }

        let empty: Arc<[Endpoint]> = Arc::from(Vec::new());
        let assignment: Vec<Arc<[Endpoint]>> = slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| empty.clone()))
            .collect();
        let mask = routing_mask(assignment.len());

        Ok(Self {
            assignment,
            mask,
            version,
        })
    }

    /// Number of partitions.
    pub fn partition_count(&self) -> usize {
        self.assignment.len()
    }

    /// Routing mask, or [`super::NO_MASK`].
    pub fn mask(&self) -> i32 {
        self.mask
    }

    /// Publication sequence number.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Endpoints for a partition. Empty for partitions outside the table or
    /// not assigned by the last refresh.
    pub fn endpoints(&self, partition: PartitionId) -> Arc<[Endpoint]> {
        usize::try_from(partition)
            .ok()
            .and_then(|idx| self.assignment.get(idx))
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    /// Partition for a key hash under this snapshot.
    pub fn partition_for_hash(&self, hash: i32) -> PartitionId {
        partition_of(hash, self.assignment.len() as i32, self.mask)
    }

    /// Number of partitions with at least one endpoint.
    pub fn assigned_count(&self) -> usize {
        self.assignment.iter().filter(|e| !e.is_empty()).count()
    }
}

/// The current partition assignment of a cache.
#[derive(Debug, Default)]
pub struct PartitionTable {
    /// Current snapshot. `None` until the first successful update.
    current: RwLock<Option<Arc<PartitionSnapshot>>>,

    /// Optional observability hook.
    metrics: Option<Arc<RoutingMetrics>>,
}

impl PartitionTable {
    /// Create an empty, not yet ready table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table that reports rebuilds to `metrics`.
    pub fn with_metrics(metrics: Arc<RoutingMetrics>) -> Self {
        Self {
            metrics: Some(metrics),
            ..Self::default()
        }
    }

    /// Replace the table with one built from a partition map.
    ///
    /// On error the previous table stays in effect. The version is assigned
    /// under the write lock, so published versions follow publication order.
    pub fn update_from(&self, groups: &[NodePartitions]) -> Result<Arc<PartitionSnapshot>> {
        let mut snapshot = PartitionSnapshot::build(groups, 0)?;

        let snapshot = {
            let mut current = self.current.write();
            snapshot.version = current.as_ref().map_or(0, |s| s.version()) + 1;

            let snapshot = Arc::new(snapshot);
            *current = Some(snapshot.clone());

            if let Some(metrics) = &self.metrics {
                metrics.record_table(&snapshot);
            }
            snapshot
        };

        debug!(
            partitions = snapshot.partition_count(),
            assigned = snapshot.assigned_count(),
            mask = snapshot.mask(),
            groups = groups.len(),
            version = snapshot.version(),
            "Partition table replaced"
        );

        Ok(snapshot)
    }

    /// Endpoints for a partition under the current snapshot.
    pub fn lookup_endpoints(&self, partition: PartitionId) -> Result<Arc<[Endpoint]>> {
        Ok(self.snapshot()?.endpoints(partition))
    }

    /// The current snapshot, for reads that span several partitions.
    pub fn snapshot(&self) -> Result<Arc<PartitionSnapshot>> {
        self.current
            .read()
            .clone()
            .ok_or(Error::PartitionTableNotReady)
    }

    /// Whether at least one update has succeeded.
    pub fn is_ready(&self) -> bool {
        self.current.read().is_some()
    }

    /// Version of the current snapshot, 0 when not ready.
    pub fn version(&self) -> u64 {
        self.current.read().as_ref().map(|s| s.version()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partitioning::NO_MASK;

    fn ep(name: &str) -> Endpoint {
        Endpoint::new(name, 10800)
    }

    fn scenario_a() -> Vec<NodePartitions> {
        vec![
            NodePartitions::new(vec![ep("a"), ep("b")], vec![0, 2]),
            NodePartitions::new(vec![ep("c")], vec![1, 3]),
        ]
    }

    #[test]
    fn test_not_ready_before_update() {
        let table = PartitionTable::new();
        assert!(!table.is_ready());
        assert_eq!(table.version(), 0);
        assert!(matches!(
            table.lookup_endpoints(0),
            Err(Error::PartitionTableNotReady)
        ));
        assert!(matches!(table.snapshot(), Err(Error::PartitionTableNotReady)));
    }

    #[test]
    fn test_update_builds_assignment() {
        let table = PartitionTable::new();
        let snapshot = table.update_from(&scenario_a()).unwrap();

        assert!(table.is_ready());
        assert_eq!(snapshot.partition_count(), 4);
        assert_eq!(snapshot.mask(), 3);
        assert_eq!(snapshot.version(), 1);

        assert_eq!(&*table.lookup_endpoints(0).unwrap(), &[ep("a"), ep("b")]);
        assert_eq!(&*table.lookup_endpoints(1).unwrap(), &[ep("c")]);
        assert_eq!(&*table.lookup_endpoints(2).unwrap(), &[ep("a"), ep("b")]);
        assert_eq!(&*table.lookup_endpoints(3).unwrap(), &[ep("c")]);
    }

    #[test]
    fn test_scenario_a_routing() {
        let table = PartitionTable::new();
        let snapshot = table.update_from(&scenario_a()).unwrap();

        let partition = snapshot.partition_for_hash(5);
        assert_eq!(partition, 1);
        assert_eq!(&*snapshot.endpoints(partition), &[ep("c")]);
    }

    #[test]
    fn test_non_power_of_two_uses_modulo() {
        let table = PartitionTable::new();
        let snapshot = table
            .update_from(&[
                NodePartitions::new(vec![ep("a")], vec![0]),
                NodePartitions::new(vec![ep("b")], vec![1]),
                NodePartitions::new(vec![ep("c")], vec![2]),
            ])
            .unwrap();

        assert_eq!(snapshot.partition_count(), 3);
        assert_eq!(snapshot.mask(), NO_MASK);
        assert_eq!(snapshot.partition_for_hash(-7), 1);
        assert_eq!(&*snapshot.endpoints(1), &[ep("b")]);
    }

    #[test]
    fn test_gaps_map_to_empty_lists() {
        let table = PartitionTable::new();
        let snapshot = table
            .update_from(&[NodePartitions::new(vec![ep("a")], vec![0, 5])])
            .unwrap();

        assert_eq!(snapshot.partition_count(), 6);
        assert_eq!(snapshot.assigned_count(), 2);
        assert!(table.lookup_endpoints(3).unwrap().is_empty());
        assert!(table.lookup_endpoints(6).unwrap().is_empty());
        assert!(table.lookup_endpoints(-1).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_assignment_keeps_previous_table() {
        let table = PartitionTable::new();
        table.update_from(&scenario_a()).unwrap();

        let result = table.update_from(&[
            NodePartitions::new(vec![ep("x")], vec![0, 3]),
            NodePartitions::new(vec![ep("y")], vec![1, 2, 3, 4]),
        ]);

        assert!(matches!(
            result,
            Err(Error::DuplicatePartitionAssignment { partition: 3 })
        ));

        let snapshot = table.snapshot().unwrap();
        assert_eq!(snapshot.version(), 1);
        assert_eq!(snapshot.partition_count(), 4);
        assert_eq!(&*table.lookup_endpoints(3).unwrap(), &[ep("c")]);
        assert_eq!(&*table.lookup_endpoints(0).unwrap(), &[ep("a"), ep("b")]);
    }

    #[test]
    fn test_duplicate_within_group() {
        let table = PartitionTable::new();
        let result = table.update_from(&[NodePartitions::new(vec![ep("a")], vec![1, 1])]);

        assert!(matches!(
            result,
            Err(Error::DuplicatePartitionAssignment { partition: 1 })
        ));
        assert!(!table.is_ready());
    }

    #[test]
    fn test_negative_partition_rejected() {
        let table = PartitionTable::new();
        table.update_from(&scenario_a()).unwrap();

        let result = table.update_from(&[NodePartitions::new(vec![ep("a")], vec![0, -2])]);
        assert!(matches!(result, Err(Error::InvalidPartitionId(-2))));
        assert_eq!(table.snapshot().unwrap().partition_count(), 4);
    }

    #[test]
    fn test_oversized_partition_rejected() {
        let table = PartitionTable::new();
        table.update_from(&scenario_a()).unwrap();
        let before = table.snapshot().unwrap();

        for id in [i32::MAX, 1 << 28, MAX_PARTITIONS as i32] {
            let result = table.update_from(&[NodePartitions::new(vec![ep("a")], vec![0, id])]);
            assert!(matches!(result, Err(Error::InvalidPartitionId(bad)) if bad == id));
        }

        assert!(Arc::ptr_eq(&table.snapshot().unwrap(), &before));
        assert_eq!(table.version(), 1);

        // The last id below the limit is still accepted.
        let last = MAX_PARTITIONS as i32 - 1;
        let snapshot = table
            .update_from(&[NodePartitions::new(vec![ep("a")], vec![last])])
            .unwrap();
        assert_eq!(snapshot.partition_count(), MAX_PARTITIONS);
        assert_eq!(snapshot.version(), 2);
    }

    #[test]
    fn test_versions_follow_publication_order() {
        let metrics = Arc::new(RoutingMetrics::new());
        let table = Arc::new(PartitionTable::with_metrics(metrics.clone()));

        let writers: Vec<_> = (0..4)
            .map(|_| {
                let table = table.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        let published = table.update_from(&scenario_a()).unwrap();
                        assert!(table.version() >= published.version());
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(table.version(), 1_000);
        assert_eq!(metrics.snapshot().table_version, 1_000);
    }

    #[test]
    fn test_partition_count_can_change() {
        let table = PartitionTable::new();
        table.update_from(&scenario_a()).unwrap();

        let snapshot = table
            .update_from(&[NodePartitions::new(vec![ep("d")], (0..8).collect())])
            .unwrap();

        assert_eq!(snapshot.version(), 2);
        assert_eq!(snapshot.partition_count(), 8);
        assert_eq!(snapshot.mask(), 7);
        for partition in 0..8 {
            assert_eq!(&*table.lookup_endpoints(partition).unwrap(), &[ep("d")]);
        }
    }

    #[test]
    fn test_empty_map_is_ready_with_no_partitions() {
        let table = PartitionTable::new();
        let snapshot = table.update_from(&[]).unwrap();

        assert!(table.is_ready());
        assert_eq!(snapshot.partition_count(), 0);
        assert_eq!(snapshot.mask(), NO_MASK);
        assert_eq!(snapshot.partition_for_hash(42), 0);
        assert!(snapshot.endpoints(0).is_empty());
    }

    #[test]
    fn test_group_endpoints_are_shared() {
        let table = PartitionTable::new();
        let snapshot = table.update_from(&scenario_a()).unwrap();

        assert!(Arc::ptr_eq(&snapshot.endpoints(0), &snapshot.endpoints(2)));
        assert!(!Arc::ptr_eq(&snapshot.endpoints(0), &snapshot.endpoints(1)));
    }

    #[test]
    fn test_metrics_hook() {
        let metrics = Arc::new(RoutingMetrics::new());
        let table = PartitionTable::with_metrics(metrics.clone());
        table.update_from(&scenario_a()).unwrap();

        let snap = metrics.snapshot();
        assert_eq!(snap.partition_count, 4);
        assert_eq!(snap.table_version, 1);
    }
}
