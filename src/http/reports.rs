//! Report and raw log endpoints under `/api/logs`.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::ledger::StorageError;
use crate::reporting::ReportEngine;

pub fn reports_router(engine: ReportEngine) -> Router {
    Router::new()
        .route("/api/logs/all", get(all_logs))
        .route("/api/logs/report/errors", get(error_report))
        .route("/api/logs/report/response-times", get(response_time_report))
        .route("/api/logs/report/usage", get(endpoint_usage_report))
        .route("/api/logs/report/critical-events", get(critical_event_report))
        .route("/api/logs/report/application-status", get(application_status_report))
        .with_state(engine)
}

fn message(status: StatusCode, text: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "message": text.into() }))).into_response()
}

/// Run a store-reading query on the blocking pool.
async fn query<T, F>(engine: ReportEngine, f: F) -> Result<Option<T>, Response>
where
    F: FnOnce(&ReportEngine) -> Result<Option<T>, StorageError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(move || f(&engine)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Failed to read request log");
            Err(message(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to read request log: {}", e),
            ))
        }
        Err(e) => {
            tracing::error!(error = %e, "Report task failed");
            Err(message(StatusCode::INTERNAL_SERVER_ERROR, "Report task failed"))
        }
    }
}

async fn report<T, F>(engine: ReportEngine, f: F, empty: &'static str) -> Response
where
    F: FnOnce(&ReportEngine) -> Result<Option<T>, StorageError> + Send + 'static,
    T: Serialize + Send + 'static,
{
    match query(engine, f).await {
        Ok(Some(report)) => Json(report).into_response(),
        Ok(None) => message(StatusCode::NOT_FOUND, empty),
        Err(response) => response,
    }
}

async fn all_logs(State(engine): State<ReportEngine>) -> Response {
    match query(engine, |e| e.raw_logs()).await {
        Ok(Some(records)) => Json(records).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(response) => response,
    }
}

async fn error_report(State(engine): State<ReportEngine>) -> Response {
    report(
        engine,
        |e| e.error_report(),
        "No logs available to generate error report",
    )
    .await
}

async fn response_time_report(State(engine): State<ReportEngine>) -> Response {
    report(
        engine,
        |e| e.response_time_report(),
        "No logs available to generate response time report",
    )
    .await
}

async fn endpoint_usage_report(State(engine): State<ReportEngine>) -> Response {
    report(
        engine,
        |e| e.endpoint_usage_report(),
        "No logs available to generate endpoint usage report",
    )
    .await
}

async fn critical_event_report(State(engine): State<ReportEngine>) -> Response {
    report(
        engine,
        |e| e.critical_event_report(),
        "No logs available to generate critical event report",
    )
    .await
}

async fn application_status_report(State(engine): State<ReportEngine>) -> Response {
    report(
        engine,
        |e| e.application_status_report(),
        "No logs available to generate application status report",
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::ledger::{LogRecord, LogStore};

    async fn get_json(app: Router, path: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_empty_log_responses() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LogStore::open(dir.path().join("log.json")).unwrap());
        let app = reports_router(ReportEngine::new(store));

        let (status, body) = get_json(app.clone(), "/api/logs/all").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_null());

        let (status, body) = get_json(app.clone(), "/api/logs/report/usage").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "No logs available to generate endpoint usage report");

        for path in [
            "/api/logs/report/errors",
            "/api/logs/report/response-times",
            "/api/logs/report/critical-events",
            "/api/logs/report/application-status",
        ] {
            let (status, body) = get_json(app.clone(), path).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{}", path);
            assert!(body["message"].as_str().unwrap().starts_with("No logs available"));
        }
    }

    #[tokio::test]
    async fn test_populated_reports() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LogStore::open(dir.path().join("log.json")).unwrap());
        for (status, ms) in [(200, 10), (200, 20), (404, 30), (503, 40), (200, 50)] {
            let record = LogRecord::at("/api/persona", "GET", status, ms, "t", "2024-05-01T08:00:00Z");
            store.append(&record).unwrap();
        }
        let app = reports_router(ReportEngine::new(store));

        let (status, logs) = get_json(app.clone(), "/api/logs/all").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(logs.as_array().unwrap().len(), 5);

        let (_, times) = get_json(app.clone(), "/api/logs/report/response-times").await;
        assert_eq!(times["medianResponseTime"], 30);
        assert_eq!(times["slowRequests"], 50);
        assert_eq!(times["averageResponseTime"], 30.0);

        let (_, errors) = get_json(app.clone(), "/api/logs/report/errors").await;
        assert_eq!(errors["totalErrorsByType"]["Not Found"], 1);
        assert_eq!(errors["errorPeakHours"]["8"], 2);
        assert_eq!(errors["peakHour"], 8);

        let (_, critical) = get_json(app.clone(), "/api/logs/report/critical-events").await;
        assert_eq!(critical["criticalEventCount"], 1);

        let (_, health) = get_json(app, "/api/logs/report/application-status").await;
        assert_eq!(health["totalRequests"], 5);
        assert_eq!(health["totalErrors"], 2);
    }

    #[tokio::test]
    async fn test_storage_failure_is_not_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        let store = Arc::new(LogStore::open(&path).unwrap());
        std::fs::write(&path, b"{ \"broken\": true }").unwrap();
        let app = reports_router(ReportEngine::new(store));

        let (status, body) = get_json(app, "/api/logs/report/errors").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["message"].as_str().unwrap().contains("Malformed"));
    }
}
