//! Plain HTTP forwarding through the proxy.

use std::time::Duration;

use forward_proxy::config::ProxyConfig;

mod common;

const RESPONSE: &str =
    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello";

#[tokio::test]
async fn test_forward_relativizes_request_line() {
    let (upstream, mut heads) = common::start_capture_upstream(RESPONSE).await;
    let proxy = common::spawn_proxy(ProxyConfig::default()).await;

    let request = format!(
        "GET http://{}/foo?x=1 HTTP/1.1\r\nHost: {}\r\nX-Trace: abc\r\n\r\n",
        upstream, upstream
    );
    let reply = common::exchange(proxy.addr, request.as_bytes()).await;
    assert_eq!(reply, RESPONSE.as_bytes(), "response must pass through unmodified");

    let head = tokio::time::timeout(Duration::from_secs(2), heads.recv())
        .await
        .unwrap()
        .unwrap();
    let expected = format!(
        "GET /foo?x=1 HTTP/1.1\r\nHost: {}\r\nX-Trace: abc\r\n\r\n",
        upstream
    );
    assert_eq!(String::from_utf8(head).unwrap(), expected);
}

#[tokio::test]
async fn test_forward_defaults_path_to_root() {
    let (upstream, mut heads) = common::start_capture_upstream(RESPONSE).await;
    let proxy = common::spawn_proxy(ProxyConfig::default()).await;

    let request = format!("HEAD http://{} HTTP/1.0\r\n\r\n", upstream);
    common::exchange(proxy.addr, request.as_bytes()).await;

    let head = heads.recv().await.unwrap();
    assert_eq!(head, b"HEAD / HTTP/1.0\r\n\r\n");
}

#[tokio::test]
async fn test_forward_through_http_client() {
    let (upstream, mut heads) = common::start_capture_upstream(RESPONSE).await;
    let proxy = common::spawn_proxy(ProxyConfig::default()).await;

    let client = reqwest::Client::builder()
        .proxy(reqwest::Proxy::http(format!("http://{}", proxy.addr)).unwrap())
        .build()
        .unwrap();

    let res = client
        .get(format!("http://{}/hello", upstream))
        .send()
        .await
        .expect("Proxy unreachable");
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "hello");

    let head = String::from_utf8(heads.recv().await.unwrap()).unwrap();
    assert!(head.starts_with("GET /hello HTTP/1.1\r\n"), "got {:?}", head);
}
