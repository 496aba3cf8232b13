//! CONNECT tunnel behavior end to end.

use std::time::Duration;

use forward_proxy::config::ProxyConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

mod common;

#[tokio::test]
async fn test_tunnel_is_byte_exact_both_ways() {
    let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = upstream.local_addr().unwrap();
    let (seen_tx, seen_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = upstream.accept().await.unwrap();
        socket.write_all(b"from-upstream").await.unwrap();
        let mut seen = Vec::new();
        let _ = socket.read_to_end(&mut seen).await;
        let _ = seen_tx.send(seen);
    });

    let proxy = common::spawn_proxy(ProxyConfig::default()).await;
    let mut client = common::open_tunnel(proxy.addr, upstream_addr).await;

    // Exactly one 200: the next bytes are upstream payload.
    let mut greeting = [0u8; 13];
    client.read_exact(&mut greeting).await.unwrap();
    assert_eq!(&greeting, b"from-upstream");

    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 253) as u8).collect();
    client.write_all(&payload).await.unwrap();
    client.shutdown().await.unwrap();

    let seen = tokio::time::timeout(Duration::from_secs(5), seen_rx)
        .await
        .expect("upstream never saw EOF")
        .unwrap();
    assert_eq!(seen.len(), payload.len());
    assert!(seen == payload, "payload corrupted in transit");
}

#[tokio::test]
async fn test_concurrent_tunnels_are_isolated() {
    let echo = common::start_echo_upstream().await;
    let proxy = common::spawn_proxy(ProxyConfig::default()).await;

    let mut tasks = Vec::new();
    for i in 0..50 {
        let proxy_addr = proxy.addr;
        tasks.push(tokio::spawn(async move {
            let mut client = common::open_tunnel(proxy_addr, echo).await;
            let payload = format!("session-{:02}|", i).repeat(500).into_bytes();

            let (mut rd, mut wr) = client.split();
            let expected = payload.clone();
            let write = async move {
                wr.write_all(&payload).await.unwrap();
            };
            let read = async move {
                let mut echoed = vec![0u8; expected.len()];
                rd.read_exact(&mut echoed).await.unwrap();
                assert!(echoed == expected, "session {} saw foreign bytes", i);
            };
            tokio::join!(write, read);
        }));
    }

    for task in tasks {
        tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .expect("tunnel stalled")
            .unwrap();
    }
}

#[tokio::test]
async fn test_client_close_tears_down_remote() {
    let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = upstream.local_addr().unwrap();
    let (closed_tx, closed_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = upstream.accept().await.unwrap();
        let mut buf = [0u8; 64];
        loop {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
        let _ = closed_tx.send(());
    });

    let proxy = common::spawn_proxy(ProxyConfig::default()).await;
    let mut client = common::open_tunnel(proxy.addr, upstream_addr).await;
    client.write_all(b"partial").await.unwrap();
    assert_eq!(proxy.tracker.active_count(), 1);
    drop(client);

    tokio::time::timeout(Duration::from_secs(2), closed_rx)
        .await
        .expect("remote socket left open")
        .unwrap();
    assert!(proxy.tracker.wait_idle(Duration::from_secs(2)).await);
}

#[tokio::test]
async fn test_fragmented_connect_request() {
    let echo = common::start_echo_upstream().await;
    let proxy = common::spawn_proxy(ProxyConfig::default()).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    let request = format!("CONNECT {} HTTP/1.1\r\nHost: x\r\n\r\n", echo);
    for piece in request.as_bytes().chunks(3) {
        client.write_all(piece).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let mut reply = vec![0u8; forward_proxy::http::response::CONNECTION_ESTABLISHED.len()];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, forward_proxy::http::response::CONNECTION_ESTABLISHED);

    client.write_all(b"still works").await.unwrap();
    let mut echoed = [0u8; 11];
    client.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"still works");
}

#[tokio::test]
async fn test_remote_close_ends_session() {
    let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = upstream.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = upstream.accept().await.unwrap();
        socket.write_all(b"bye").await.unwrap();
    });

    let proxy = common::spawn_proxy(ProxyConfig::default()).await;
    let mut client = common::open_tunnel(proxy.addr, upstream_addr).await;

    let mut rest = Vec::new();
    tokio::time::timeout(Duration::from_secs(2), client.read_to_end(&mut rest))
        .await
        .expect("client never saw EOF")
        .unwrap();
    assert_eq!(rest, b"bye");
    assert!(proxy.tracker.wait_idle(Duration::from_secs(2)).await);
}

#[tokio::test]
async fn test_full_duplex_bulk_echo() {
    let echo = common::start_echo_upstream().await;
    let proxy = common::spawn_proxy(ProxyConfig::default()).await;
    let client = common::open_tunnel(proxy.addr, echo).await;

    // Far larger than socket buffers: the echo only drains if the proxy
    // keeps reading the upstream while it is still writing to it.
    const TOTAL: usize = 16 * 1024 * 1024;
    let (mut rd, mut wr) = client.into_split();

    let write = tokio::spawn(async move {
        let chunk: Vec<u8> = (0..64 * 1024u32).map(|i| (i % 241) as u8).collect();
        for _ in 0..TOTAL / chunk.len() {
            wr.write_all(&chunk).await.unwrap();
        }
        wr
    });
    let read = tokio::spawn(async move {
        let mut buf = vec![0u8; 64 * 1024];
        let mut received = 0usize;
        while received < TOTAL {
            let n = rd.read(&mut buf).await.unwrap();
            assert!(n > 0, "tunnel closed after {} bytes", received);
            received += n;
        }
        received
    });

    let received = tokio::time::timeout(Duration::from_secs(20), read)
        .await
        .expect("relay stalled under full-duplex load")
        .unwrap();
    assert_eq!(received, TOTAL);
    write.await.unwrap();
}
