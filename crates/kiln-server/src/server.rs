//! Development server implementation.

use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::{header, StatusCode, Uri},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, MethodRouter},
    Router,
};
use minijinja::{context, Environment};
use tower_http::services::ServeDir;

use crate::reload::{
    inject_reload_script, reload_client_script, ReloadHub, ReloadMessage, RELOAD_SCRIPT_PATH,
    RELOAD_SOCKET_PATH,
};

const LISTING_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Index of {{ path }}</title>
  <style>
    body { font-family: system-ui, sans-serif; max-width: 800px; margin: 2rem auto; padding: 0 1rem; }
    li { padding: 0.15rem 0; }
  </style>
</head>
<body>
  <h1>Index of {{ path }}</h1>
  <ul>
  {%- if path != "/" %}
    <li><a href="../">../</a></li>
  {%- endif %}
  {%- for entry in entries %}
    <li><a href="{{ entry }}">{{ entry }}</a></li>
  {%- endfor %}
  </ul>
</body>
</html>
"#;

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Directory served at `/`
    pub root: PathBuf,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,

    /// Inject the live-reload client into HTML responses
    pub live_reload: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("app"),
            port: 3000,
            host: "127.0.0.1".to_string(),
            open: true,
            live_reload: true,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    AddressError(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),
}

/// Shared server state.
#[derive(Clone)]
struct ServerState {
    hub: ReloadHub,
}

/// Static file server with directory listings and live reload.
pub struct DevServer {
    config: DevServerConfig,
    hub: ReloadHub,
}

impl DevServer {
    /// Create a server pushing notifications from `hub`.
    pub fn new(config: DevServerConfig, hub: ReloadHub) -> Self {
        Self { config, hub }
    }

    /// Address the server binds to.
    pub fn address(&self) -> Result<SocketAddr, ServerError> {
        format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|_| {
                ServerError::AddressError(format!("{}:{}", self.config.host, self.config.port))
            })
    }

    /// Build the router.
    pub fn router(&self) -> Router {
        let root = Arc::new(self.config.root.clone());
        let listing: MethodRouter = get(directory_listing).with_state(root);
        let files = ServeDir::new(&self.config.root)
            .append_index_html_on_directories(true)
            .fallback(listing);

        let state = ServerState {
            hub: self.hub.clone(),
        };

        let router = Router::new()
            .route(RELOAD_SOCKET_PATH, get(ws_handler))
            .route(RELOAD_SCRIPT_PATH, get(reload_script_handler))
            .fallback_service(files)
            .with_state(state);

        if self.config.live_reload {
            router.layer(middleware::from_fn(inject_into_html))
        } else {
            router
        }
    }

    /// Bind and serve until Ctrl-C.
    pub async fn start(self) -> Result<(), ServerError> {
        let addr = self.address()?;
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        tracing::info!(
            "Serving {} at http://{}",
            self.config.root.display(),
            addr
        );

        if self.config.open {
            let url = format!("http://{}", addr);
            if let Err(e) = open::that(&url) {
                tracing::debug!("Could not open browser: {}", e);
            }
        }

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        Ok(())
    }
}

/// Handler for the live-reload WebSocket endpoint.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state.hub))
}

/// Forward hub messages to one browser until it disconnects.
async fn handle_ws(mut socket: WebSocket, hub: ReloadHub) {
    let mut rx = hub.subscribe();

    if send_message(&mut socket, &ReloadMessage::Connected)
        .await
        .is_err()
    {
        return;
    }

    while let Ok(msg) = rx.recv().await {
        if send_message(&mut socket, &msg).await.is_err() {
            break;
        }
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ReloadMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    socket.send(Message::Text(json.into())).await
}

/// Handler for the live-reload client script.
async fn reload_script_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        reload_client_script(),
    )
}

/// Add the live-reload script tag to successful HTML responses.
async fn inject_into_html(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if response.status() != StatusCode::OK || !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to buffer HTML response: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = inject_reload_script(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

/// Directory listing for directories without an `index.html`.
async fn directory_listing(State(root): State<Arc<PathBuf>>, uri: Uri) -> Response {
    let Some(relative) = safe_relative(uri.path()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let dir = root.join(&relative);
    if !dir.is_dir() {
        return StatusCode::NOT_FOUND.into_response();
    }

    match render_listing(&dir, uri.path()) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::warn!("Failed to list {}: {}", dir.display(), e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Request path as a relative filesystem path, rejecting traversal.
fn safe_relative(path: &str) -> Option<PathBuf> {
    let relative = Path::new(path.trim_start_matches('/'));
    relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
        .then(|| relative.to_path_buf())
}

/// Render the listing page; directories first, then files, by name.
fn render_listing(dir: &Path, url_path: &str) -> Result<String, Box<dyn std::error::Error>> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() {
            dirs.push(format!("{}/", name));
        } else {
            files.push(name);
        }
    }
    dirs.sort();
    files.sort();
    dirs.extend(files);

    let mut env = Environment::new();
    env.add_template("listing.html", LISTING_TEMPLATE)?;
    let html = env
        .get_template("listing.html")?
        .render(context! { path => url_path, entries => dirs })?;
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn fetch(app: Router, path: &str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    fn server_for(root: &Path) -> DevServer {
        DevServer::new(
            DevServerConfig {
                root: root.to_path_buf(),
                open: false,
                ..Default::default()
            },
            ReloadHub::new(),
        )
    }

    #[test]
    fn creates_server_with_default_config() {
        let server = DevServer::new(DevServerConfig::default(), ReloadHub::new());
        assert_eq!(server.config.port, 3000);
        assert_eq!(server.address().unwrap().port(), 3000);
    }

    #[test]
    fn rejects_path_traversal() {
        assert_eq!(safe_relative("/media/images/"), Some(PathBuf::from("media/images")));
        assert_eq!(safe_relative("/"), Some(PathBuf::new()));
        assert_eq!(safe_relative("/../secret"), None);
    }

    #[test]
    fn lists_directories_first() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("css")).unwrap();
        fs::write(temp.path().join("about.html"), "").unwrap();

        let html = render_listing(temp.path(), "/").unwrap();

        let css = html.find("\"css").unwrap();
        let about = html.find("\"about.html").unwrap();
        assert!(css < about);
        assert!(!html.contains("../"));
    }

    async fn next_reload_message<S>(socket: &mut S) -> ReloadMessage
    where
        S: futures_util::Stream<
                Item = Result<
                    tokio_tungstenite::tungstenite::Message,
                    tokio_tungstenite::tungstenite::Error,
                >,
            > + Unpin,
    {
        use futures_util::StreamExt;

        let msg = tokio::time::timeout(std::time::Duration::from_secs(2), socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        serde_json::from_str(msg.to_text().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn reload_socket_forwards_hub_messages() {
        let temp = tempdir().unwrap();
        let hub = ReloadHub::new();
        let server = DevServer::new(
            DevServerConfig {
                root: temp.path().to_path_buf(),
                open: false,
                ..Default::default()
            },
            hub.clone(),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = server.router();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let url = format!("ws://{}{}", addr, RELOAD_SOCKET_PATH);
        let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();

        assert_eq!(next_reload_message(&mut socket).await, ReloadMessage::Connected);
        hub.send(ReloadMessage::Css);
        assert_eq!(next_reload_message(&mut socket).await, ReloadMessage::Css);
    }

    #[tokio::test]
    async fn injects_reload_script_into_pages() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("index.html"),
            "<html><body><h1>Home</h1></body></html>",
        )
        .unwrap();

        let response = fetch(server_for(temp.path()).router(), "/").await;

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("<h1>Home</h1><script src=\"/__kiln/livereload.js\"></script>"));
    }

    #[tokio::test]
    async fn serves_assets_untouched() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("css")).unwrap();
        fs::write(temp.path().join("css/main.css"), "body{margin:0}").unwrap();

        let response = fetch(server_for(temp.path()).router(), "/css/main.css").await;

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("body{margin:0}"));
    }

    #[tokio::test]
    async fn lists_directory_without_index() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("media/images")).unwrap();
        fs::write(temp.path().join("media/images/photo.avif"), b"avif").unwrap();

        let response = fetch(server_for(temp.path()).router(), "/media/images/").await;

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("photo.avif"));
        assert!(response.contains("livereload.js"));
    }

    #[tokio::test]
    async fn serves_client_script() {
        let temp = tempdir().unwrap();

        let response = fetch(server_for(temp.path()).router(), RELOAD_SCRIPT_PATH).await;

        assert!(response.contains("application/javascript"));
        assert!(response.contains("WebSocket"));
    }
}
