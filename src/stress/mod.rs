//! Internal stress tests for the connection pool.
//!
//! Many tasks share one client; the pool must never open more than
//! `max_connections` transports and every command must get its own reply.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::core::builder::ClientBuilder;
use crate::fake::FakeClient;
use crate::proto::codec::{Decoder, Encoder};
use crate::proto::frame::Frame;

/// Echo-style server counting live sockets. Replies `PONG` to PING and
/// echoes the first argument of anything else, after a short delay so
/// requests overlap.
async fn spawn_counting_server(live: Arc<AtomicUsize>, peak: Arc<AtomicUsize>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(s) => s,
                Err(_) => break,
            };
            let now = live.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            let live = Arc::clone(&live);

            tokio::spawn(async move {
                let mut decoder = Decoder::new();
                let mut encoder = Encoder::new();
                let mut buf = [0u8; 4096];

                'conn: loop {
                    let n = match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => n,
                    };
                    decoder.append(&buf[..n]);

                    while let Ok(Some(frame)) = decoder.decode() {
                        let response = match frame {
                            Frame::Array(args) => match args.as_slice() {
                                [Frame::BulkString(Some(cmd))] if cmd.eq_ignore_ascii_case(b"PING") => {
                                    Frame::simple("PONG")
                                }
                                [_, arg, ..] => arg.clone(),
                                _ => Frame::error("ERR unknown command"),
                            },
                            _ => Frame::error("ERR format"),
                        };
                        tokio::time::sleep(Duration::from_millis(1)).await;
                        encoder.encode(&response);
                        if socket.write_all(&encoder.take()).await.is_err() {
                            break 'conn;
                        }
                    }
                }
                live.fetch_sub(1, Ordering::SeqCst);
            });
        }
    });

    format!("redis://{addr}")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pool_bounded_under_load() {
    let live = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let address = spawn_counting_server(Arc::clone(&live), Arc::clone(&peak)).await;

    let client = ClientBuilder::new()
        .address(address)
        .max_connections(4)
        .acquire_timeout(Duration::from_secs(10))
        .build()
        .await
        .expect("Failed to connect");

    let mut handles = Vec::new();
    for i in 0..500 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            let msg = format!("msg-{i}");
            let reply = client.echo(msg.clone()).await.unwrap();
            assert_eq!(reply, msg.as_bytes());
            let status = client.pool_status();
            assert!(status.open <= status.max);
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 4);
    let status = client.pool_status();
    assert_eq!(status.leased(), 0);
    assert!(status.open <= 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cuckoo_adds_on_fake() {
    let client = FakeClient::from_config(crate::core::builder::ClientConfig {
        max_connections: 3,
        ..Default::default()
    })
    .await
    .unwrap();
    client.cf().create("stress", 10_000).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..200 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            let item = format!("item-{i}");
            assert!(client.cf().add("stress", &item).await.unwrap());
            assert!(client.cf().exists("stress", &item).await.unwrap());
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let info = client.cf().info("stress").await.unwrap();
    assert_eq!(info.inserted_num, 200);
    assert!(client.pool_status().open <= 3);
}
