//! Shared utilities for integration and load testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqlens::config::AppConfig;
use reqlens::http::HttpServer;
use reqlens::ledger::LogStore;
use reqlens::lifecycle::Shutdown;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// A server running on an ephemeral port with its own log file.
pub struct TestServer {
    pub addr: SocketAddr,
    pub store: Arc<LogStore>,
    pub shutdown: Shutdown,
    // Keeps the log directory alive for the test's duration.
    #[allow(dead_code)]
    pub dir: TempDir,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start a server whose log file lives in a fresh temp directory.
pub async fn start_server() -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    start_server_in(dir).await
}

/// Start a server using (or reusing) the log file inside `dir`.
#[allow(dead_code)]
pub async fn start_server_in(dir: TempDir) -> TestServer {
    let mut config = AppConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.log_store.path = dir.path().join("log.json").to_string_lossy().into_owned();

    let server = HttpServer::new(config).unwrap();
    let store = server.store();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    // Wait for server to start
    tokio::time::sleep(Duration::from_millis(100)).await;

    TestServer { addr, store, shutdown, dir }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
