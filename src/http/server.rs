//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request ID, panic capture, request log)
//! - Own the shared log store
//! - Bind server to listener and run until shutdown

use axum::{middleware, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::http::middleware::{request_log_middleware, RequestInterceptor};
use crate::http::reports::reports_router;
use crate::ledger::{LogStore, StorageError};
use crate::persona::handlers::SharedRepository;
use crate::persona::{persona_router, InMemoryRepository};
use crate::reporting::ReportEngine;

/// HTTP server for the persona API and its request reports.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
    store: Arc<LogStore>,
}

impl HttpServer {
    /// Open the log store and build the server with an in-memory repository.
    pub fn new(config: AppConfig) -> Result<Self, StorageError> {
        let store = Arc::new(LogStore::from_config(&config.log_store)?);
        let repository: SharedRepository = Arc::new(InMemoryRepository::new());
        Ok(Self::with_parts(config, store, repository))
    }

    /// Build the server around an existing store and repository.
    pub fn with_parts(config: AppConfig, store: Arc<LogStore>, repository: SharedRepository) -> Self {
        let router = Self::build_router(&config, store.clone(), repository);
        Self {
            router,
            config,
            store,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, store: Arc<LogStore>, repository: SharedRepository) -> Router {
        let interceptor = RequestInterceptor::from_config(store.clone(), &config.interceptor);
        let engine = ReportEngine::new(store);

        Router::new()
            .merge(persona_router(repository))
            .merge(reports_router(engine))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(middleware::from_fn_with_state(interceptor, request_log_middleware))
            .layer(CatchPanicLayer::new())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            log_file = %self.store.path().display(),
            intercepted_prefix = %self.config.interceptor.path_prefix,
            "HTTP server starting"
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The shared log store.
    pub fn store(&self) -> Arc<LogStore> {
        self.store.clone()
    }

    /// The fully layered router, for driving the service without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}
