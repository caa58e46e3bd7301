//! Development server.
//!
//! Serves the cooked output tree over HTTP with single-page-app fallback
//! semantics and hosts the WebSocket notification channel clients use for
//! live reload. The channel is output-only: inbound messages are ignored.

use crate::dev::SharedState;
use crate::error::{CliError, Result};
use axum::{
    body::Body,
    extract::ws::{Message, WebSocket},
    extract::{State, WebSocketUpgrade},
    http::{header, HeaderMap, StatusCode, Uri},
    response::Response,
    routing::get,
    Router,
};
use percent_encoding::percent_decode_str;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use tower_http::cors::{Any, CorsLayer};

/// Path of the notification channel upgrade endpoint.
pub const CHANNEL_PATH: &str = "/skiff";

/// Development server bound to shared state.
pub struct DevServer {
    addr: SocketAddr,
    state: SharedState,
}

impl DevServer {
    /// Create a server for an address and shared state.
    pub fn new(addr: SocketAddr, state: SharedState) -> Self {
        Self { addr, state }
    }

    /// Bind and serve until the process shuts down.
    pub async fn start(self) -> Result<()> {
        let addr = self.addr;
        let app = self.into_router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| CliError::Server(format!("Failed to bind to {addr}: {e}")))?;

        axum::serve(listener, app)
            .await
            .map_err(|e| CliError::Server(format!("Server error: {e}")))?;

        Ok(())
    }

    /// The axum router: the channel endpoint plus static serving.
    pub fn into_router(self) -> Router {
        Router::new()
            .route(CHANNEL_PATH, get(handle_channel_upgrade))
            .fallback(handle_request)
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .with_state(self.state)
    }
}

/// Accept a notification channel connection.
async fn handle_channel_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_channel(socket, state))
}

/// Drive one client connection until it closes.
///
/// The socket only ever carries server-to-client tokens; anything the
/// client sends besides ping/close is dropped.
async fn handle_channel(mut socket: WebSocket, state: SharedState) {
    let (id, mut rx) = state.register_client();
    tracing::debug!("client {id} connected to the reload channel");

    loop {
        tokio::select! {
            notification = rx.recv() => {
                match notification {
                    Some(token) => {
                        if socket.send(Message::Text(token.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    state.unregister_client(id);
    tracing::debug!("client {id} disconnected from the reload channel");
}

/// Where a request path resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolution {
    /// Path could not be percent-decoded
    BadRequest,
    /// Path contains a parent-directory traversal segment
    Forbidden,
    /// Synthesized robots.txt
    Robots,
    /// An existing regular file under the output root
    File(PathBuf),
    /// Everything else: serve index.html (single-page-app fallback)
    Index,
}

/// Resolve a raw request path against the output root.
fn resolve(out_dir: &Path, raw_path: &str) -> Resolution {
    let Ok(decoded) = percent_decode_str(raw_path).decode_utf8() else {
        return Resolution::BadRequest;
    };

    if decoded == "/" {
        return Resolution::Index;
    }

    let relative = decoded.trim_start_matches('/');

    // Reject traversal before touching the filesystem.
    if Path::new(relative)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Resolution::Forbidden;
    }

    if Path::new(relative)
        .file_name()
        .is_some_and(|name| name == "robots.txt")
    {
        return Resolution::Robots;
    }

    let candidate = out_dir.join(relative);
    if candidate.is_file() {
        Resolution::File(candidate)
    } else {
        Resolution::Index
    }
}

/// Handle any non-channel request.
async fn handle_request(
    State(state): State<SharedState>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    match resolve(state.out_dir(), uri.path()) {
        Resolution::BadRequest => status_response(StatusCode::BAD_REQUEST, "Bad request"),
        Resolution::Forbidden => status_response(StatusCode::FORBIDDEN, "Forbidden"),
        Resolution::Robots => robots_response(&headers),
        Resolution::File(path) => serve_file(&path).await,
        Resolution::Index => serve_index(state.out_dir()).await,
    }
}

fn status_response(status: StatusCode, body: &'static str) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(body))
        .unwrap()
}

/// robots.txt placeholder, synthesized on the fly.
fn robots_response(headers: &HeaderMap) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("127.0.0.1:8888");
    let body = format!(
        "User-agent: *\nAllow: /\n\nSitemap: http://{host}/sitemap.xml\n"
    );
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(body))
        .unwrap()
}

async fn serve_file(path: &Path) -> Response {
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("failed to read {}: {e}", path.display());
            return status_response(StatusCode::INTERNAL_SERVER_ERROR, "Unable to read file");
        }
    };

    let content_type = content_type_for(path);
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type);

    // Compiled wasm is fingerprinted by rebuild; browsers may cache it hard.
    if content_type == "application/wasm" {
        builder = builder.header(header::CACHE_CONTROL, "max-age=31536000, public");
    } else {
        builder = builder.header(header::CACHE_CONTROL, "no-cache");
    }

    builder.body(Body::from(content)).unwrap()
}

/// Single-page-app fallback: serve the root index.html.
async fn serve_index(out_dir: &Path) -> Response {
    let index = out_dir.join("index.html");
    match tokio::fs::read(&index).await {
        Ok(content) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
            .header(header::CACHE_CONTROL, "no-cache")
            .body(Body::from(content))
            .unwrap(),
        Err(_) => status_response(StatusCode::OK, "Seems that you deleted index file"),
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
    match extension {
        "wasm" => "application/wasm",
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "html" => "text/html; charset=utf-8",
        "css" => "text/css",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_resolves_to_index() {
        assert_eq!(resolve(Path::new("/out"), "/"), Resolution::Index);
    }

    #[test]
    fn traversal_is_forbidden() {
        assert_eq!(
            resolve(Path::new("/out"), "/../secret"),
            Resolution::Forbidden
        );
        assert_eq!(
            resolve(Path::new("/out"), "/../../etc/passwd"),
            Resolution::Forbidden
        );
        assert_eq!(
            resolve(Path::new("/out"), "/a/../../b"),
            Resolution::Forbidden
        );
    }

    #[test]
    fn percent_encoded_traversal_is_forbidden() {
        assert_eq!(
            resolve(Path::new("/out"), "/%2e%2e/secret"),
            Resolution::Forbidden
        );
    }

    #[test]
    fn robots_is_synthesized() {
        assert_eq!(resolve(Path::new("/out"), "/robots.txt"), Resolution::Robots);
    }

    #[test]
    fn missing_path_falls_back_to_index() {
        assert_eq!(
            resolve(Path::new("/out"), "/dashboard/settings"),
            Resolution::Index
        );
    }

    #[test]
    fn existing_file_is_served() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.wasm"), b"\0asm").unwrap();

        match resolve(dir.path(), "/app.wasm") {
            Resolution::File(path) => assert_eq!(path, dir.path().join("app.wasm")),
            other => panic!("expected file resolution, got {other:?}"),
        }
    }

    #[test]
    fn directory_falls_back_to_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("assets")).unwrap();

        assert_eq!(resolve(dir.path(), "/assets"), Resolution::Index);
    }

    #[test]
    fn wasm_content_type() {
        assert_eq!(
            content_type_for(Path::new("app.wasm")),
            "application/wasm"
        );
        assert_eq!(
            content_type_for(Path::new("bundle.js")),
            "application/javascript"
        );
        assert_eq!(
            content_type_for(Path::new("mystery.bin")),
            "application/octet-stream"
        );
    }
}
