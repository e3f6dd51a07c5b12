//! Reporting over the request log.
//!
//! # Data Flow
//! ```text
//! LogStore::load_all (snapshot)
//!     → engine.rs (pure aggregation over &[LogRecord])
//!     → types.rs (serializable report structs)
//!     → http::reports (JSON responses)
//! ```
//!
//! # Design Decisions
//! - Every report re-reads the store; there is no cache to go stale
//! - Empty corpus yields `None`, never a zeroed report
//! - Groupings are ordered maps; ties go to the smallest key

pub mod engine;
pub mod types;

pub use engine::ReportEngine;
pub use types::{
    ApplicationStatusReport, CriticalEventReport, EndpointUsageReport, ErrorReport,
    ResponseTimeReport,
};
