//! Persona resource: the CRUD group whose requests are recorded.
//!
//! The handlers only see the `Repository` trait; the in-memory
//! implementation is what the server wires in.

pub mod handlers;
pub mod repository;

pub use handlers::persona_router;
pub use repository::{InMemoryRepository, Persona, Repository, RepositoryError};
