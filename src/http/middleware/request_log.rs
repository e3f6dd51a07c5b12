//! Request logging middleware.
//!
//! # Responsibilities
//! - Select requests under the configured path prefix
//! - Time the downstream handler and capture its status
//! - Append exactly one record per selected request, success or failure
//! - Re-raise handler failures after the record is written
//!
//! # Design Decisions
//! - A failing append is logged and counted, never surfaced to the client
//! - A panicking handler is recorded as 500 and the panic is resumed, so an
//!   outer `CatchPanicLayer` still produces the client response
//! - File I/O runs on the blocking pool
//! - An invocation dropped mid-flight (client disconnect, outer timeout) is
//!   recorded as 499 when its future is dropped

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use futures_util::FutureExt;

use crate::config::InterceptorConfig;
use crate::ledger::record::CLIENT_CLOSED_REQUEST;
use crate::ledger::{LogRecord, LogStore};
use crate::observability::metrics;

/// Status code carried by a completed handler.
pub trait Outcome {
    fn status_code(&self) -> u16;
}

impl Outcome for Response {
    fn status_code(&self) -> u16 {
        self.status().as_u16()
    }
}

impl Outcome for StatusCode {
    fn status_code(&self) -> u16 {
        self.as_u16()
    }
}

impl Outcome for u16 {
    fn status_code(&self) -> u16 {
        *self
    }
}

/// Wraps handlers for one resource group and records each invocation.
#[derive(Clone, Debug)]
pub struct RequestInterceptor {
    store: Arc<LogStore>,
    prefix: Arc<str>,
    enabled: bool,
}

impl RequestInterceptor {
    pub fn new(store: Arc<LogStore>, prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        Self {
            store,
            prefix: Arc::from(prefix),
            enabled: true,
        }
    }

    pub fn from_config(store: Arc<LogStore>, config: &InterceptorConfig) -> Self {
        let mut interceptor = Self::new(store, config.path_prefix.trim_end_matches('/'));
        interceptor.enabled = config.enabled;
        interceptor
    }

    /// Whether `path` is the prefix itself or lies below it.
    pub fn is_target(&self, path: &str) -> bool {
        self.enabled
            && path
                .strip_prefix(&*self.prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// Run `next` and record the outcome when `path` is a target.
    ///
    /// An `Err` from `next` is recorded as status 500 and returned unchanged.
    pub async fn intercept<F, Fut, T, E>(&self, method: &str, path: &str, next: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Outcome,
    {
        if !self.is_target(path) {
            return next().await;
        }

        let start = Instant::now();
        let mut in_flight = InFlight {
            store: Some(self.store.clone()),
            method,
            path,
            start,
        };
        let result = next().await;
        in_flight.complete();

        let status = match &result {
            Ok(outcome) => outcome.status_code(),
            Err(_) => StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        };
        self.record(method, path, status, start).await;
        result
    }

    async fn record(&self, method: &str, path: &str, status: u16, start: Instant) {
        let record = completed_record(method, path, status, start);
        let store = self.store.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || append_record(&store, &record)).await {
            metrics::record_append(false);
            tracing::error!(method, path, status, error = %e, "Request log append task failed");
        }
    }
}

/// Records an invocation whose future is dropped before the delegate returns.
struct InFlight<'a> {
    store: Option<Arc<LogStore>>,
    method: &'a str,
    path: &'a str,
    start: Instant,
}

impl InFlight<'_> {
    fn complete(&mut self) {
        self.store = None;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let Some(store) = self.store.take() else {
            return;
        };
        tracing::warn!(
            method = self.method,
            path = self.path,
            "Request dropped before the handler finished"
        );
        let record = completed_record(self.method, self.path, CLIENT_CLOSED_REQUEST, self.start);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || append_record(&store, &record));
            }
            Err(_) => append_record(&store, &record),
        }
    }
}

fn completed_record(method: &str, path: &str, status: u16, start: Instant) -> LogRecord {
    let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    metrics::record_request(method, status, start);
    LogRecord::completed(path, method, status, elapsed_ms, current_thread())
}

fn append_record(store: &LogStore, record: &LogRecord) {
    let (method, path, status) = (&record.method, &record.endpoint, record.status);
    match store.append(record) {
        Ok(()) => {
            metrics::record_append(true);
            tracing::debug!(
                method = %method,
                path = %path,
                status,
                elapsed_ms = record.response_time_ms,
                "Request recorded"
            );
        }
        Err(e) => {
            metrics::record_append(false);
            tracing::error!(
                method = %method,
                path = %path,
                status,
                error = %e,
                "Failed to append request log record"
            );
        }
    }
}

fn current_thread() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", thread.id()),
    }
}

/// Axum adapter for [`RequestInterceptor`].
pub async fn request_log_middleware(
    State(interceptor): State<RequestInterceptor>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !interceptor.is_target(&path) {
        return next.run(request).await;
    }

    let method = request.method().to_string();
    tracing::info!(method = %method, path = %path, "Request received");

    let outcome = interceptor
        .intercept(&method, &path, || AssertUnwindSafe(next.run(request)).catch_unwind())
        .await;

    match outcome {
        Ok(response) => response,
        Err(panic) => {
            tracing::error!(method = %method, path = %path, "Handler panicked");
            std::panic::resume_unwind(panic)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;
    use std::time::Duration;
    use tower_http::catch_panic::CatchPanicLayer;

    use crate::ledger::LogLevel;

    fn store() -> (tempfile::TempDir, Arc<LogStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LogStore::open(dir.path().join("log.json")).unwrap());
        (dir, store)
    }

    async fn boom() -> &'static str {
        panic!("handler exploded")
    }

    async fn slow() -> &'static str {
        tokio::time::sleep(Duration::from_millis(500)).await;
        "late"
    }

    fn app(interceptor: RequestInterceptor) -> Router {
        Router::new()
            .route("/api/persona", get(|| async { "list" }))
            .route("/api/persona/missing", get(|| async { StatusCode::NOT_FOUND }))
            .route("/api/persona/boom", get(boom))
            .route("/api/persona/slow", get(slow))
            .route("/api/personal", get(|| async { "other" }))
            .route("/health", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(interceptor, request_log_middleware))
            .layer(CatchPanicLayer::new())
    }

    async fn call(app: Router, path: &str) -> StatusCode {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    #[test]
    fn test_prefix_match() {
        let (_dir, store) = store();
        let interceptor = RequestInterceptor::new(store, "/api/persona");

        assert!(interceptor.is_target("/api/persona"));
        assert!(interceptor.is_target("/api/persona/"));
        assert!(interceptor.is_target("/api/persona/42"));
        assert!(!interceptor.is_target("/api/personal"));
        assert!(!interceptor.is_target("/api/logs/all"));
        assert!(!interceptor.is_target("/"));
    }

    #[test]
    fn test_disabled_matches_nothing() {
        let (_dir, store) = store();
        let config = InterceptorConfig {
            enabled: false,
            path_prefix: "/api/persona/".into(),
        };
        let interceptor = RequestInterceptor::from_config(store, &config);
        assert!(!interceptor.is_target("/api/persona"));
    }

    #[tokio::test]
    async fn test_records_success_and_error_status() {
        let (_dir, store) = store();
        let app = app(RequestInterceptor::new(store.clone(), "/api/persona"));

        assert_eq!(call(app.clone(), "/api/persona").await, StatusCode::OK);
        assert_eq!(call(app, "/api/persona/missing").await, StatusCode::NOT_FOUND);

        let records = store.load_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].endpoint, "/api/persona");
        assert_eq!(records[0].method, "GET");
        assert_eq!(records[0].level, LogLevel::Info);
        assert_eq!(records[1].status, 404);
        assert_eq!(records[1].error_message.as_deref(), Some("Not Found"));
    }

    #[tokio::test]
    async fn test_other_paths_are_not_recorded() {
        let (_dir, store) = store();
        let app = app(RequestInterceptor::new(store.clone(), "/api/persona"));

        assert_eq!(call(app.clone(), "/health").await, StatusCode::OK);
        assert_eq!(call(app, "/api/personal").await, StatusCode::OK);
        assert!(store.load_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_panic_recorded_as_500_and_propagated() {
        let (_dir, store) = store();
        let app = app(RequestInterceptor::new(store.clone(), "/api/persona"));

        assert_eq!(call(app, "/api/persona/boom").await, StatusCode::INTERNAL_SERVER_ERROR);

        let records = store.load_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, 500);
        assert_eq!(records[0].level, LogLevel::Error);
        assert_eq!(records[0].error_message.as_deref(), Some("Internal Server Error"));
    }

    #[tokio::test]
    async fn test_intercept_returns_delegate_error() {
        let (_dir, store) = store();
        let interceptor = RequestInterceptor::new(store.clone(), "/api/persona");

        let result: Result<u16, &str> = interceptor
            .intercept("DELETE", "/api/persona/1", || async { Err("database down") })
            .await;
        assert_eq!(result, Err("database down"));

        let ok: Result<StatusCode, &str> = interceptor
            .intercept("POST", "/api/persona", || async { Ok(StatusCode::CREATED) })
            .await;
        assert_eq!(ok, Ok(StatusCode::CREATED));

        let records = store.load_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, 500);
        assert_eq!(records[0].method, "DELETE");
        assert_eq!(records[1].status, 201);
    }

    #[tokio::test]
    async fn test_append_failure_does_not_change_outcome() {
        let (dir, store) = store();
        let app = app(RequestInterceptor::new(store.clone(), "/api/persona"));

        // Break the tail so every append is rejected.
        std::fs::write(dir.path().join("log.json"), b"[").unwrap();

        assert_eq!(call(app, "/api/persona").await, StatusCode::OK);
        assert_eq!(std::fs::read(dir.path().join("log.json")).unwrap(), b"[");
    }

    #[tokio::test]
    async fn test_dropped_request_is_recorded_once() {
        let (_dir, store) = store();
        let app = app(RequestInterceptor::new(store.clone(), "/api/persona"));

        let request = Request::builder().uri("/api/persona/slow").body(Body::empty()).unwrap();
        let outcome = tokio::time::timeout(Duration::from_millis(50), app.oneshot(request)).await;
        assert!(outcome.is_err());

        // Outlive the handler's sleep so a late second record would show up.
        tokio::time::sleep(Duration::from_millis(600)).await;

        let records = store.load_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].endpoint, "/api/persona/slow");
        assert_eq!(records[0].status, 499);
        assert_eq!(records[0].level, LogLevel::Error);
        assert_eq!(records[0].error_message.as_deref(), Some("Client Closed Request"));
    }

    #[tokio::test]
    async fn test_completed_request_is_not_recorded_twice() {
        let (_dir, store) = store();
        let interceptor = RequestInterceptor::new(store.clone(), "/api/persona");

        let ok: Result<u16, ()> = interceptor.intercept("GET", "/api/persona", || async { Ok(200) }).await;
        assert_eq!(ok, Ok(200));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let records = store.load_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, 200);
    }
}
