//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → middleware/request_log.rs (record requests under the target prefix)
//!     → persona handlers (CRUD) | reports.rs (report queries)
//!     → Send to client
//! ```

pub mod middleware;
pub mod reports;
pub mod server;

pub use middleware::RequestInterceptor;
pub use server::HttpServer;
