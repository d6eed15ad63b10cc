//! Integration tests for the client over real TCP connections.
//!
//! Each test starts one or more mock nodes sharing an in-memory cluster,
//! points the client at a seed node and checks which node served what.

#[cfg(test)]
mod tests {
    use crate::client::ThinClient;
    use crate::config::ClientConfig;
    use crate::error::{Error, NetworkError};
    use crate::partitioning::NodePartitions;
    use crate::testing::{InMemoryCluster, MockServer, StubMarshaller};
    use crate::types::{CacheHandle, Endpoint};
    use std::sync::Arc;
    use std::time::Duration;
    use test_log::test;
    use tokio::net::TcpListener;

    async fn dead_endpoint() -> Endpoint {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        Endpoint::new("127.0.0.1", port)
    }

    fn config(seeds: Vec<Endpoint>) -> ClientConfig {
        ClientConfig::new(seeds)
            .with_connect_timeout(Duration::from_millis(500))
            .with_request_timeout(Duration::from_secs(2))
    }

    #[test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
    async fn test_requests_reach_partition_owners() {
        let cluster = Arc::new(InMemoryCluster::new());
        let node1 = MockServer::start(cluster.clone()).await.unwrap();
        let node2 = MockServer::start(cluster.clone()).await.unwrap();
        cluster.set_partition_map(vec![
            NodePartitions::new(vec![node1.endpoint()], vec![0, 2]),
            NodePartitions::new(vec![node2.endpoint()], vec![1, 3]),
        ]);

        let client = ThinClient::new(config(vec![node1.endpoint()])).unwrap();
        let marshaller = Arc::new(StubMarshaller::with_hash(1));
        let cache = client.cache_with_handle(CacheHandle::new("people", 11), marshaller.clone());

        cache.refresh_partitions().await.unwrap();
        assert_eq!(node1.request_count(), 1);
        assert_eq!(node2.request_count(), 0);

        // Hash 1 lands on partition 1, owned by node2.
        cache.put("alice", "engineer").await.unwrap();
        assert_eq!(node2.request_count(), 1);

        // Hash 2 lands on partition 2, owned by node1. Both nodes share storage.
        marshaller.set_hash(2);
        assert!(cache.contains_key("alice").await.unwrap());
        assert_eq!(node1.request_count(), 2);

        marshaller.set_hash(1);
        assert_eq!(
            cache.get::<_, String>("alice").await.unwrap().as_deref(),
            Some("engineer")
        );
        assert_eq!(node2.request_count(), 2);
        assert_eq!(client.metrics().snapshot().requests_routed, 3);

        node1.shutdown().await;
        node2.shutdown().await;
    }

    #[test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
    async fn test_backup_serves_when_primary_down() {
        let cluster = Arc::new(InMemoryCluster::new());
        let backup = MockServer::start(cluster.clone()).await.unwrap();
        let primary = dead_endpoint().await;
        cluster.set_partition_map(vec![NodePartitions::new(
            vec![primary, backup.endpoint()],
            vec![0, 1],
        )]);

        let client = ThinClient::new(config(vec![backup.endpoint()])).unwrap();
        let cache = client.cache_with_handle(
            CacheHandle::new("people", 11),
            Arc::new(StubMarshaller::with_hash(0)),
        );

        cache.refresh_partitions().await.unwrap();
        cache.put("bob", &7u32).await.unwrap();

        assert_eq!(backup.request_count(), 2);
        assert_eq!(cluster.entry_count(), 1);
        backup.shutdown().await;
    }

    #[test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
    async fn test_unowned_partition_falls_back_to_seed() {
        let cluster = Arc::new(InMemoryCluster::new());
        let seed = MockServer::start(cluster.clone()).await.unwrap();
        cluster.set_partition_map(vec![NodePartitions::new(vec![seed.endpoint()], vec![0, 3])]);

        let client = ThinClient::new(config(vec![seed.endpoint()])).unwrap();
        let cache = client.cache_with_handle(
            CacheHandle::new("people", 11),
            Arc::new(StubMarshaller::with_hash(1)),
        );
        cache.refresh_partitions().await.unwrap();

        let decision = cache.route("carol").unwrap();
        assert!(!decision.is_routed());

        cache.put("carol", "manager").await.unwrap();
        assert_eq!(seed.request_count(), 2);
        assert_eq!(client.metrics().snapshot().requests_unrouted, 1);
        seed.shutdown().await;
    }

    #[test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
    async fn test_disabled_affinity_sends_everything_to_seed() {
        let cluster = Arc::new(InMemoryCluster::new());
        let seed = MockServer::start(cluster.clone()).await.unwrap();
        let owner = MockServer::start(cluster.clone()).await.unwrap();
        cluster.set_partition_map(vec![NodePartitions::new(vec![owner.endpoint()], vec![0, 1])]);

        let config = config(vec![seed.endpoint()]).with_affinity_awareness(false);
        let client = ThinClient::new(config).unwrap();
        let cache = client.cache("people");

        // No partition map is fetched and none is needed.
        cache.refresh_partitions().await.unwrap();
        cache.put("dave", "analyst").await.unwrap();
        assert_eq!(
            cache.get::<_, String>("dave").await.unwrap().as_deref(),
            Some("analyst")
        );

        assert_eq!(seed.request_count(), 2);
        assert_eq!(owner.request_count(), 0);
        assert!(!cache.partition_table().is_ready());
        seed.shutdown().await;
        owner.shutdown().await;
    }

    #[test(tokio::test)]
    async fn test_refresh_fails_when_no_seed_answers() {
        let client = ThinClient::new(config(vec![dead_endpoint().await])).unwrap();
        let cache = client.cache("people");

        let result = cache.refresh_partitions().await;
        assert!(matches!(
            result,
            Err(Error::Network(NetworkError::AllEndpointsFailed { attempted: 1, .. }))
        ));
        assert!(!cache.partition_table().is_ready());
    }
}
