//! End-to-end tests for the TCP facade.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{BufMut, BytesMut};
use memkeep_common::{BlockId, ErrorCode, ManagerConfig};
use memkeep_core::MemoryManager;
use memkeep_server::protocol::frame::{self, FRAME_MAGIC};
use memkeep_server::{MemoryClient, MemoryServer, MemoryService, ProtocolError, Response};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct TestServer {
    addr: std::net::SocketAddr,
    manager: Arc<MemoryManager>,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TestServer {
    async fn start(config: ManagerConfig) -> Self {
        let manager = Arc::new(MemoryManager::new(config).unwrap());
        let server = MemoryServer::bind("127.0.0.1:0", MemoryService::new(Arc::clone(&manager)))
            .await
            .unwrap();
        let addr = server.local_addr();

        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            server
                .serve_until(async {
                    let _ = stopped.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            manager,
            stop: Some(stop),
            task,
        }
    }

    async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        tokio::time::timeout(Duration::from_secs(5), &mut self.task)
            .await
            .expect("server did not stop")
            .unwrap();
        self.manager.shutdown();
    }
}

fn manual(capacity: usize) -> ManagerConfig {
    ManagerConfig::new(capacity).with_collector(false)
}

#[tokio::test]
async fn test_remote_scenario() {
    let server = TestServer::start(
        ManagerConfig::new(1024).with_collector_interval(Duration::from_millis(20)),
    )
    .await;
    let mut client = MemoryClient::connect(server.addr).await.unwrap();

    let first = client.create(50).await.unwrap();
    let second = client.create(100).await.unwrap();
    assert_eq!((first, second), (BlockId::new(1), BlockId::new(2)));

    let payload: Vec<u8> = (0..100).rev().collect();
    client.set(second, &payload).await.unwrap();
    client.set(first, b"Hola\0").await.unwrap();
    assert_eq!(client.get(first, 5).await.unwrap(), b"Hola\0");

    client.decrease_ref_count(first).await.unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match client.get(first, 5).await {
            Err(e) if e.remote_code() == Some(ErrorCode::InvalidBlock) => break,
            Ok(_) if Instant::now() < deadline => {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            other => panic!("block was not reclaimed: {other:?}"),
        }
    }

    client.defragment().await.unwrap();
    assert_eq!(server.manager.block_info(second).unwrap().offset, 0);
    assert_eq!(client.get(second, 100).await.unwrap(), payload);

    let stats = client.stats().await.unwrap();
    assert_eq!(stats.usage.used, 100);
    assert_eq!(stats.counters.compactions, 1);

    server.stop().await;
}

#[tokio::test]
async fn test_remote_errors() {
    let server = TestServer::start(manual(64)).await;
    let mut client = MemoryClient::connect(server.addr).await.unwrap();

    let err = client.create(65).await.unwrap_err();
    assert_eq!(err.remote_code(), Some(ErrorCode::OutOfMemory));

    let id = client.create(4).await.unwrap();
    let err = client.set(id, &[0; 5]).await.unwrap_err();
    assert_eq!(err.remote_code(), Some(ErrorCode::SizeMismatch));
    let err = client.get(id, 8).await.unwrap_err();
    assert_eq!(err.remote_code(), Some(ErrorCode::SizeMismatch));

    let err = client.get(BlockId::new(99), 1).await.unwrap_err();
    assert!(matches!(err, ProtocolError::Remote { code: ErrorCode::InvalidBlock, .. }));

    // Reference count changes on unknown ids are silently ignored
    client.increase_ref_count(BlockId::new(99)).await.unwrap();
    client.decrease_ref_count(BlockId::new(99)).await.unwrap();

    server.stop().await;
}

#[tokio::test]
async fn test_oversized_read_keeps_connection() {
    const BLOCK: usize = 20 * 1024 * 1024;

    let server = TestServer::start(manual(64 * 1024 * 1024)).await;
    let mut client = MemoryClient::connect(server.addr).await.unwrap();

    let id = client.create(BLOCK).await.unwrap();
    let err = client.get(id, BLOCK).await.unwrap_err();
    assert_eq!(err.remote_code(), Some(ErrorCode::ResponseTooLarge));

    // The same connection keeps working
    let stats = client.stats().await.unwrap();
    assert_eq!(stats.usage.used, BLOCK);
    client.set(id, b"tail").await.unwrap();
    assert_eq!(client.get(id, 4).await.unwrap(), b"tail");

    server.stop().await;
}

#[tokio::test]
async fn test_concurrent_clients() {
    let server = TestServer::start(manual(64 * 1024)).await;

    let tasks: Vec<_> = (0..8u8)
        .map(|n| {
            let addr = server.addr;
            tokio::spawn(async move {
                let mut client = MemoryClient::connect(addr).await.unwrap();
                let mut ids = Vec::new();
                for _ in 0..20 {
                    let id = client.create(16).await.unwrap();
                    client.set(id, &[n; 16]).await.unwrap();
                    ids.push(id);
                }
                for id in &ids {
                    assert_eq!(client.get(*id, 16).await.unwrap(), vec![n; 16]);
                }
                ids.len()
            })
        })
        .collect();

    let mut total = 0;
    for task in tasks {
        total += task.await.unwrap();
    }
    assert_eq!(total, 160);
    assert_eq!(server.manager.usage().used, 160 * 16);

    server.stop().await;
}

#[tokio::test]
async fn test_malformed_frame_is_rejected() {
    let server = TestServer::start(manual(64)).await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    let mut bogus = BytesMut::new();
    bogus.put_u32(FRAME_MAGIC);
    bogus.put_u32(3);
    bogus.put_slice(&[0xFF, 0xFF, 0xFF]);
    stream.write_all(&bogus).await.unwrap();

    let mut reply = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut reply))
        .await
        .expect("server kept the connection open")
        .unwrap();

    let response: Response = frame::decode(reply.into()).unwrap();
    let Response::Error { code, .. } = response else {
        panic!("expected an error response, got {response:?}");
    };
    assert_eq!(ErrorCode::from_u16(code), ErrorCode::BadRequest);

    // The server keeps serving other connections
    let mut client = MemoryClient::connect(server.addr).await.unwrap();
    client.create(1).await.unwrap();

    server.stop().await;
}
