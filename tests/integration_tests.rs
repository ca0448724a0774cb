//! stripestore Integration Tests
//!
//! End-to-end store/recover scenarios over an in-memory cluster with
//! failure injection, plus wire-protocol round trips against running
//! node servers.

use std::sync::Arc;

use bytes::Bytes;

use stripestore::manager::metadata::METADATA_BLOB;
use stripestore::storage::{BlockStore, MemoryStore};
use stripestore::{Error, StripeManager, StripeManagerConfig};

// =============================================================================
// Cluster Helpers
// =============================================================================

fn cluster() -> (Vec<Arc<MemoryStore>>, Vec<Arc<dyn BlockStore>>) {
    let stores: Vec<Arc<MemoryStore>> = (0..8).map(|i| Arc::new(MemoryStore::new(i))).collect();
    let nodes: Vec<Arc<dyn BlockStore>> = stores
        .iter()
        .map(|store| Arc::clone(store) as Arc<dyn BlockStore>)
        .collect();
    (stores, nodes)
}

fn manager(nodes: Vec<Arc<dyn BlockStore>>) -> StripeManager {
    StripeManager::new(StripeManagerConfig::default(), nodes).unwrap()
}

/// Bytes 0..=255 repeated to `len`.
fn cyclic_payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}

// =============================================================================
// Store/Recover Scenarios
// =============================================================================

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn test_zero_payload() {
        let (stores, nodes) = cluster();
        let manager = manager(nodes);

        let report = manager.store(&[], "empty.bin", 1024).await.unwrap();
        assert_eq!(report.total_stripes, 0);

        // Metadata is on every node and nothing else is
        for store in &stores {
            assert_eq!(store.blob_count(), 1);
            assert!(store.get(METADATA_BLOB).await.unwrap().is_some());
        }

        let recovery = manager.recover().await.unwrap();
        assert!(recovery.payload.is_empty());
        assert_eq!(recovery.metadata.original_size, 0);
    }

    #[tokio::test]
    async fn test_short_payload_fragment_layout() {
        let (stores, nodes) = cluster();
        let manager = manager(nodes);

        manager.store(b"hello", "hello.txt", 4).await.unwrap();

        // One stripe: "hell" | "o\0\0\0" | zeros...
        let block0 = stores[0].get("stripe_0_block_0").await.unwrap().unwrap();
        assert_eq!(&block0[..], b"hell");
        let block1 = stores[1].get("stripe_0_block_1").await.unwrap().unwrap();
        assert_eq!(&block1[..], b"o\0\0\0");
        for (i, store) in stores.iter().enumerate().take(6).skip(2) {
            let block = store
                .get(&format!("stripe_0_block_{}", i))
                .await
                .unwrap()
                .unwrap();
            assert!(block.iter().all(|&b| b == 0), "block {} not zero", i);
        }

        let recovery = manager.recover().await.unwrap();
        assert_eq!(recovery.payload, b"hello");
        assert_eq!(recovery.metadata.total_stripes, 1);
    }

    #[tokio::test]
    async fn test_two_data_nodes_offline() {
        let (stores, nodes) = cluster();
        let manager = manager(nodes);

        let payload = cyclic_payload(4096);
        manager.store(&payload, "data.bin", 512).await.unwrap();

        stores[2].set_online(false);
        stores[4].set_online(false);

        let recovery = manager.recover().await.unwrap();
        assert_eq!(recovery.payload, payload);
        assert_eq!(recovery.report.online_nodes.len(), 6);
        assert!(recovery.report.unrecoverable_stripes.is_empty());
        // 4096 bytes over 6x512 = 2 stripes, both degraded
        assert_eq!(recovery.report.reconstructed_stripes, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_parity_nodes_offline() {
        let (stores, nodes) = cluster();
        let manager = manager(nodes);

        let payload = cyclic_payload(4096);
        manager.store(&payload, "data.bin", 512).await.unwrap();

        stores[6].set_online(false);
        stores[7].set_online(false);

        let recovery = manager.recover().await.unwrap();
        assert_eq!(recovery.payload, payload);
        assert!(recovery.report.unrecoverable_stripes.is_empty());
    }

    #[tokio::test]
    async fn test_reconstructed_parity_matches_original() {
        let (stores, nodes) = cluster();
        let config = StripeManagerConfig {
            writeback: true,
            ..Default::default()
        };
        let manager = StripeManager::new(config, nodes).unwrap();

        let payload = cyclic_payload(3072);
        manager.store(&payload, "data.bin", 512).await.unwrap();

        // Capture the parities, lose them while the nodes stay online
        let original_p = stores[6].get("stripe_0_parity_p").await.unwrap().unwrap();
        let original_q = stores[7].get("stripe_0_parity_q").await.unwrap().unwrap();
        stores[6].drop_blob("stripe_0_parity_p");
        stores[7].drop_blob("stripe_0_parity_q");

        let recovery = manager.recover().await.unwrap();
        assert_eq!(recovery.payload, payload);
        assert_eq!(recovery.report.fragments_written_back, 2);

        // Writeback restored byte-identical parities
        let restored_p = stores[6].get("stripe_0_parity_p").await.unwrap().unwrap();
        let restored_q = stores[7].get("stripe_0_parity_q").await.unwrap().unwrap();
        assert_eq!(restored_p, original_p);
        assert_eq!(restored_q, original_q);
    }

    #[tokio::test]
    async fn test_data_plus_parity_offline() {
        let (stores, nodes) = cluster();
        let manager = manager(nodes);

        let payload = cyclic_payload(4096);
        manager.store(&payload, "data.bin", 512).await.unwrap();

        stores[0].set_online(false);
        stores[7].set_online(false);

        let recovery = manager.recover().await.unwrap();
        assert_eq!(recovery.payload, payload);
    }

    #[tokio::test]
    async fn test_every_two_node_combination() {
        let payload = cyclic_payload(2048);

        for first in 0..8 {
            for second in (first + 1)..8 {
                let (stores, nodes) = cluster();
                let manager = manager(nodes);
                manager.store(&payload, "data.bin", 128).await.unwrap();

                stores[first].set_online(false);
                stores[second].set_online(false);

                let recovery = manager.recover().await.unwrap();
                assert_eq!(
                    recovery.payload, payload,
                    "loss of nodes {} and {} not recovered",
                    first, second
                );
            }
        }
    }

    #[tokio::test]
    async fn test_triple_loss_zero_fills() {
        let (stores, nodes) = cluster();
        let manager = manager(nodes);

        let payload = cyclic_payload(4096);
        manager.store(&payload, "data.bin", 512).await.unwrap();

        stores[0].set_online(false);
        stores[1].set_online(false);
        stores[2].set_online(false);

        let recovery = manager.recover().await.unwrap();

        // Correct length, all zeros, every stripe reported
        assert_eq!(recovery.payload.len(), payload.len());
        assert!(recovery.payload.iter().all(|&b| b == 0));
        assert_eq!(recovery.report.unrecoverable_stripes, vec![0, 1]);
        assert_eq!(recovery.report.stripe_errors.len(), 2);
    }

    #[tokio::test]
    async fn test_corrupted_fragment_demoted_to_missing() {
        let (stores, nodes) = cluster();
        let manager = manager(nodes);

        let payload = cyclic_payload(4096);
        manager.store(&payload, "data.bin", 512).await.unwrap();

        // Node 3 serves a fragment one byte short
        let truncated = {
            let full = stores[3].get("stripe_0_block_3").await.unwrap().unwrap();
            full.slice(..full.len() - 1)
        };
        stores[3].corrupt("stripe_0_block_3", truncated);

        let recovery = manager.recover().await.unwrap();
        assert_eq!(recovery.payload, payload);
        assert_eq!(
            recovery.report.corrupted_fragments,
            vec!["stripe_0_block_3".to_string()]
        );
        assert_eq!(recovery.report.reconstructed_stripes, vec![0]);
    }

    #[tokio::test]
    async fn test_metadata_survives_on_single_node() {
        let (stores, nodes) = cluster();
        let manager = manager(nodes);

        let payload = cyclic_payload(4096);
        manager.store(&payload, "data.bin", 512).await.unwrap();

        // Destroy every metadata replica except node 5's
        for (i, store) in stores.iter().enumerate() {
            if i != 5 {
                store.drop_blob(METADATA_BLOB);
            }
        }

        let recovery = manager.recover().await.unwrap();
        assert_eq!(recovery.payload, payload);
        assert_eq!(recovery.report.metadata_source, 5);
    }

    #[tokio::test]
    async fn test_no_metadata_anywhere() {
        let (stores, nodes) = cluster();
        let manager = manager(nodes);

        manager.store(&cyclic_payload(512), "f", 128).await.unwrap();
        for store in &stores {
            store.drop_blob(METADATA_BLOB);
        }

        let result = manager.recover().await;
        assert!(matches!(result, Err(Error::MetadataUnavailable)));
    }

    #[tokio::test]
    async fn test_corrupted_metadata_falls_back_to_next_node() {
        let (stores, nodes) = cluster();
        let manager = manager(nodes);

        let payload = cyclic_payload(1024);
        manager.store(&payload, "f", 128).await.unwrap();

        stores[0].corrupt(METADATA_BLOB, Bytes::from_static(b"{ not json"));

        let recovery = manager.recover().await.unwrap();
        assert_eq!(recovery.payload, payload);
        assert_eq!(recovery.report.metadata_source, 1);
    }
}

// =============================================================================
// Wire Protocol End-to-End
// =============================================================================

mod wire {
    use super::*;
    use std::time::Duration;
    use stripestore::storage::{DirectoryStore, RemoteStore};
    use stripestore::NodeServer;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    struct TestNode {
        addr: std::net::SocketAddr,
        handle: JoinHandle<()>,
        _dir: tempfile::TempDir,
    }

    async fn spawn_node() -> TestNode {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DirectoryStore::new(dir.path()).unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = NodeServer::new(store);
        let handle = tokio::spawn(async move {
            let _ = server.run_on(listener).await;
        });

        TestNode {
            addr,
            handle,
            _dir: dir,
        }
    }

    async fn spawn_cluster() -> (Vec<TestNode>, Vec<Arc<dyn BlockStore>>) {
        let mut servers = Vec::new();
        for _ in 0..8 {
            servers.push(spawn_node().await);
        }

        let nodes: Vec<Arc<dyn BlockStore>> = servers
            .iter()
            .enumerate()
            .map(|(index, node)| {
                let remote = RemoteStore::new(index, node.addr.to_string()).with_timeouts(
                    Duration::from_millis(500),
                    Duration::from_secs(5),
                );
                Arc::new(remote) as Arc<dyn BlockStore>
            })
            .collect();

        (servers, nodes)
    }

    #[tokio::test]
    async fn test_store_recover_over_tcp() {
        let (_servers, nodes) = spawn_cluster().await;
        let manager = manager(nodes);

        let payload = cyclic_payload(8192);
        let report = manager.store(&payload, "wire.bin", 256).await.unwrap();
        assert_eq!(report.metadata_replicas, 8);

        let recovery = manager.recover().await.unwrap();
        assert_eq!(recovery.payload, payload);
        assert!(recovery.report.reconstructed_stripes.is_empty());
    }

    #[tokio::test]
    async fn test_recover_with_killed_servers() {
        let (servers, nodes) = spawn_cluster().await;
        let manager = manager(nodes);

        let payload = cyclic_payload(8192);
        manager.store(&payload, "wire.bin", 256).await.unwrap();

        // Kill two node servers; their ports stop accepting
        servers[1].handle.abort();
        servers[6].handle.abort();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let recovery = manager.recover().await.unwrap();
        assert_eq!(recovery.payload, payload);
        assert_eq!(recovery.report.online_nodes.len(), 6);
    }

    #[tokio::test]
    async fn test_purge_over_tcp() {
        let (_servers, nodes) = spawn_cluster().await;
        let manager = manager(nodes);

        manager
            .store(&cyclic_payload(1536), "wire.bin", 256)
            .await
            .unwrap();

        // One stripe's 8 fragments plus 8 metadata replicas
        let deleted = manager.purge().await.unwrap();
        assert_eq!(deleted, 16);

        assert!(matches!(manager.recover().await, Err(Error::MetadataUnavailable)));
    }
}
