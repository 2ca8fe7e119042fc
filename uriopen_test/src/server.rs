//! A throwaway HTTP server for testing network openers offline.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex, RwLock},
};

use axum::{
    Router,
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use tokio::{net::TcpListener, task::JoinHandle};

#[derive(Clone, Default)]
struct ServerState {
    files: Arc<RwLock<HashMap<String, Bytes>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

/// Serves static content from memory on a random local port.
///
/// Every `GET /<path>` answers with the bytes inserted under `<path>`, or a
/// 404. Query strings are ignored for the lookup but recorded.
///
/// The server is stopped on drop.
pub struct TestServer {
    addr: SocketAddr,
    state: ServerState,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Result<Self, anyhow::Error> {
        let state = ServerState::default();
        let app = Router::new()
            .route("/*path", get(serve_file))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                tracing::error!(error = %err, "test server failed");
            }
        });

        Ok(Self {
            addr,
            state,
            handle,
        })
    }

    /// eg: `http://127.0.0.1:41234`
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve `data` under `path` (without leading slash).
    pub fn insert(&self, path: &str, data: Bytes) {
        self.state
            .files
            .write()
            .unwrap()
            .insert(path.trim_start_matches('/').to_string(), data);
    }

    /// Path and query of every request received so far.
    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_file(State(state): State<ServerState>, uri: Uri) -> Response {
    let recorded = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    state.requests.lock().unwrap().push(recorded);

    let path = uri.path().trim_start_matches('/');
    let data = state.files.read().unwrap().get(path).cloned();
    match data {
        Some(data) => (StatusCode::OK, data).into_response(),
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}
