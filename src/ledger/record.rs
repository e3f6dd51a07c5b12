//! Log record written once per intercepted request.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Message attached to successful requests.
pub const MESSAGE_PROCESSED: &str = "Request processed";

/// Message attached to requests that ended with status >= 400.
pub const MESSAGE_ERROR: &str = "Error occurred";

/// Severity of a record, derived from its status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Error,
}

/// One structured entry describing a single intercepted request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// Request path.
    pub endpoint: String,
    /// HTTP verb.
    pub method: String,
    pub level: LogLevel,
    pub response_time_ms: u64,
    /// Execution context that served the request. Display only.
    pub thread: String,
    pub message: String,
    /// RFC 3339 UTC instant taken when the request completed.
    pub timestamp: String,
    pub status: u16,
    /// Canonical phrase for the status; `None` below 400.
    pub error_message: Option<String>,
}

impl LogRecord {
    /// Build the record for a request that just completed with `status`.
    ///
    /// Level, message and error phrase are all derived from `status`.
    pub fn completed(
        endpoint: impl Into<String>,
        method: impl Into<String>,
        status: u16,
        response_time_ms: u64,
        thread: impl Into<String>,
    ) -> Self {
        Self::at(
            endpoint,
            method,
            status,
            response_time_ms,
            thread,
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        )
    }

    /// Same as [`LogRecord::completed`] with an explicit timestamp.
    pub fn at(
        endpoint: impl Into<String>,
        method: impl Into<String>,
        status: u16,
        response_time_ms: u64,
        thread: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        let failed = is_error_status(status);
        Self {
            endpoint: endpoint.into(),
            method: method.into(),
            level: if failed { LogLevel::Error } else { LogLevel::Info },
            response_time_ms,
            thread: thread.into(),
            message: if failed { MESSAGE_ERROR } else { MESSAGE_PROCESSED }.to_string(),
            timestamp: timestamp.into(),
            status,
            error_message: failed.then(|| error_phrase(status)),
        }
    }

    pub fn is_error(&self) -> bool {
        is_error_status(self.status)
    }
}

pub fn is_error_status(status: u16) -> bool {
    status >= 400
}

/// Status recorded when the caller goes away before the handler finishes.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Canonical phrase for an error status.
pub fn error_phrase(status: u16) -> String {
    let phrase = match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        429 => "Too Many Requests",
        CLIENT_CLOSED_REQUEST => "Client Closed Request",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        other => return format!("HTTP Error {}", other),
    };
    phrase.to_string()
}
