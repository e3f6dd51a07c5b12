//! Request ledger subsystem.
//!
//! # Data Flow
//! ```text
//! intercepted request
//!     → record.rs (LogRecord built from method/path/status/latency)
//!     → store.rs (positional append into the JSON array file)
//!
//! reporting
//!     → store.rs load_all (snapshot under the same lock)
//!     → reporting engine
//! ```
//!
//! # Design Decisions
//! - The on-disk file is a JSON array that is valid at rest between appends
//! - Appends overwrite the trailing `\n]` in place instead of rewriting the file
//! - One mutex serializes appends and snapshot reads

pub mod record;
pub mod store;

pub use record::{LogLevel, LogRecord};
pub use store::{LogStore, StorageError};
