//! Minimal RESP server for exercising the TCP path.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use valet::proto::codec::{Decoder, Encoder};
use valet::Frame;

/// Handle to a running mock server.
pub struct MockServer {
    pub host: String,
    pub port: u16,
    pub accepted: Arc<AtomicUsize>,
}

impl MockServer {
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

/// Spawns a server answering `PING` with `PONG` and echoing the first
/// argument of other commands. `HANG` never gets a reply and `QUIT` closes
/// the socket without answering.
pub async fn spawn() -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut decoder = Decoder::new();
                let mut encoder = Encoder::new();
                let mut buf = [0u8; 4096];
                loop {
                    let n = match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => n,
                    };
                    decoder.append(&buf[..n]);
                    while let Ok(Some(frame)) = decoder.decode() {
                        let Frame::Array(args) = frame else {
                            return;
                        };
                        let name = args
                            .first()
                            .and_then(Frame::as_bytes)
                            .map(|b| b.to_ascii_uppercase())
                            .unwrap_or_default();
                        let reply = match name.as_slice() {
                            b"PING" => Frame::simple("PONG"),
                            b"HANG" => continue,
                            b"QUIT" => return,
                            b"SET" => Frame::simple("OK"),
                            _ => args.get(1).cloned().unwrap_or(Frame::Null),
                        };
                        encoder.encode(&reply);
                        if socket.write_all(&encoder.take()).await.is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });

    MockServer {
        host: addr.ip().to_string(),
        port: addr.port(),
        accepted,
    }
}
