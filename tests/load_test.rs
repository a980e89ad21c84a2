//! Load testing for the server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use tether::protocol::encode;
use tether::net::ConnectionId;
use tether::{Message, MessageKind, Server};

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_clients_many_frames() {
    let received = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&received);
    let server = Server::new(common::test_config())
        .with_handler(move |_: ConnectionId, _: Message| {
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .start()
        .await
        .unwrap();
    let addr = server.local_addr();

    let concurrency = 50;
    let frames_per_client = 20;
    let start = Instant::now();

    let mut tasks = Vec::new();
    for client in 0..concurrency {
        tasks.push(tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            for i in 0..frames_per_client {
                let body = format!("client {client} frame {i}");
                stream.write_all(&encode(MessageKind::Heartbeat, &[])).await.unwrap();
                stream.write_all(&encode(MessageKind::Text, body.as_bytes())).await.unwrap();
            }
            stream
        }));
    }

    let mut streams = Vec::new();
    for task in tasks {
        streams.push(task.await.unwrap());
    }

    let total = concurrency * frames_per_client;
    let deadline = Instant::now() + Duration::from_secs(10);
    while received.load(Ordering::Relaxed) < total {
        assert!(
            Instant::now() < deadline,
            "received {} of {} frames",
            received.load(Ordering::Relaxed),
            total
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(server.registry().count().await, concurrency);

    println!("{} frames from {} clients in {:?}", total, concurrency, start.elapsed());

    drop(streams);
    let registry = server.registry().clone();
    assert!(common::wait_for_count(&registry, 0).await);

    server.stop().await;
}
