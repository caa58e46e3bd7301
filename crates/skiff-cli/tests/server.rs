//! Integration tests for the development server's HTTP surface.
//!
//! A real server instance is bound to an ephemeral port and exercised with
//! raw HTTP/1.1 requests, covering traversal rejection, the single-page-app
//! fallback and the synthesized robots.txt.

use skiff_cli::dev::{DevServer, DevState};
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Spin up a server over a fresh output tree.
///
/// Returns the bound address and the output directory handle.
async fn spawn_server() -> (SocketAddr, TempDir) {
    let out = TempDir::new().unwrap();
    std::fs::write(
        out.path().join("index.html"),
        "<html><body>skiff index</body></html>",
    )
    .unwrap();
    std::fs::write(out.path().join("app.wasm"), b"\0asm\x01\0\0\0").unwrap();
    std::fs::write(out.path().join("app.js"), "console.log('app');").unwrap();

    let state = Arc::new(DevState::new(out.path().to_path_buf()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let router = DevServer::new(addr, state).into_router();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (addr, out)
}

/// Issue one GET request and return (status, headers, body).
async fn get(addr: SocketAddr, path: &str) -> (u16, String, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {path} HTTP/1.1\r\nHost: 127.0.0.1:{}\r\nConnection: close\r\n\r\n",
        addr.port()
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8_lossy(&raw).into_owned();

    let status: u16 = text
        .split_whitespace()
        .nth(1)
        .expect("status line")
        .parse()
        .expect("numeric status");
    let (head, body) = text.split_once("\r\n\r\n").unwrap_or((text.as_str(), ""));
    (status, head.to_string(), body.to_string())
}

#[tokio::test]
async fn traversal_requests_are_forbidden() {
    let (addr, _out) = spawn_server().await;

    let (status, _, _) = get(addr, "/../secret").await;
    assert_eq!(status, 403);

    let (status, _, _) = get(addr, "/../../etc/passwd").await;
    assert_eq!(status, 403);

    let (status, _, _) = get(addr, "/assets/../../escape").await;
    assert_eq!(status, 403);
}

#[tokio::test]
async fn percent_encoded_traversal_is_forbidden() {
    let (addr, _out) = spawn_server().await;

    let (status, _, _) = get(addr, "/%2e%2e/secret").await;
    assert_eq!(status, 403);
}

#[tokio::test]
async fn unknown_route_serves_index_with_200() {
    let (addr, _out) = spawn_server().await;

    let (status, _, body) = get(addr, "/dashboard/settings").await;
    assert_eq!(status, 200);
    assert!(body.contains("skiff index"));
}

#[tokio::test]
async fn root_serves_index() {
    let (addr, _out) = spawn_server().await;

    let (status, headers, body) = get(addr, "/").await;
    assert_eq!(status, 200);
    assert!(headers.to_lowercase().contains("text/html"));
    assert!(body.contains("skiff index"));
}

#[tokio::test]
async fn wasm_files_get_mime_type_and_long_cache() {
    let (addr, _out) = spawn_server().await;

    let (status, headers, _) = get(addr, "/app.wasm").await;
    assert_eq!(status, 200);
    let headers = headers.to_lowercase();
    assert!(headers.contains("application/wasm"));
    assert!(headers.contains("max-age=31536000"));
}

#[tokio::test]
async fn existing_js_is_served_without_long_cache() {
    let (addr, _out) = spawn_server().await;

    let (status, headers, body) = get(addr, "/app.js").await;
    assert_eq!(status, 200);
    let headers = headers.to_lowercase();
    assert!(headers.contains("application/javascript"));
    assert!(headers.contains("no-cache"));
    assert!(body.contains("console.log"));
}

#[tokio::test]
async fn robots_txt_is_synthesized() {
    let (addr, _out) = spawn_server().await;

    let (status, _, body) = get(addr, "/robots.txt").await;
    assert_eq!(status, 200);
    assert!(body.contains("User-agent: *"));
    assert!(body.contains("Allow: /"));
    assert!(body.contains("sitemap.xml"));
}

#[tokio::test]
async fn missing_index_yields_apology() {
    let out = TempDir::new().unwrap();
    let state = Arc::new(DevState::new(out.path().to_path_buf()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = DevServer::new(addr, state).into_router();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let (status, _, body) = get(addr, "/").await;
    assert_eq!(status, 200);
    assert!(body.contains("index file"));
}
