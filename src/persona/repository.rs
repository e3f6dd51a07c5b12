//! Persona entity and its repository.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Assigned on first save when absent.
    #[serde(default)]
    pub id: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Persona {0} not found")]
    NotFound(u64),

    #[error("Invalid persona: {0}")]
    Invalid(String),
}

/// Storage capability for personas.
pub trait Repository: Send + Sync + 'static {
    fn find_all(&self) -> Result<Vec<Persona>, RepositoryError>;
    fn find_by_id(&self, id: u64) -> Result<Option<Persona>, RepositoryError>;
    /// Insert or replace. Returns the stored entity with its id set.
    fn save(&self, persona: Persona) -> Result<Persona, RepositoryError>;
    /// Removing an absent id is not an error.
    fn delete_by_id(&self, id: u64) -> Result<(), RepositoryError>;
}

/// A thread-safe in-memory repository.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    inner: Arc<DashMap<u64, Persona>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Repository for InMemoryRepository {
    fn find_all(&self) -> Result<Vec<Persona>, RepositoryError> {
        let mut all: Vec<Persona> = self.inner.iter().map(|r| r.value().clone()).collect();
        all.sort_by_key(|p| p.id);
        Ok(all)
    }

    fn find_by_id(&self, id: u64) -> Result<Option<Persona>, RepositoryError> {
        Ok(self.inner.get(&id).map(|r| r.value().clone()))
    }

    fn save(&self, mut persona: Persona) -> Result<Persona, RepositoryError> {
        if persona.name.trim().is_empty() {
            return Err(RepositoryError::Invalid("name must not be empty".to_string()));
        }

        let id = match persona.id {
            Some(id) => {
                self.next_id.fetch_max(id, Ordering::Relaxed);
                id
            }
            None => self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
        };
        persona.id = Some(id);
        self.inner.insert(id, persona.clone());
        Ok(persona)
    }

    fn delete_by_id(&self, id: u64) -> Result<(), RepositoryError> {
        self.inner.remove(&id);
        Ok(())
    }
}
