//! Request observability for a small CRUD service.
//!
//! Requests under one path prefix are recorded into an append-only JSON
//! array file; five reports are computed over that file on demand.

pub mod config;
pub mod http;
pub mod ledger;
pub mod lifecycle;
pub mod observability;
pub mod persona;
pub mod reporting;

pub use config::AppConfig;
pub use http::HttpServer;
pub use ledger::{LogRecord, LogStore};
pub use lifecycle::Shutdown;
pub use reporting::ReportEngine;
