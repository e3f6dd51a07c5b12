//! Persona CRUD handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use crate::persona::repository::{Persona, Repository, RepositoryError};

pub type SharedRepository = Arc<dyn Repository>;

impl IntoResponse for RepositoryError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "Persona operation failed");
        StatusCode::BAD_REQUEST.into_response()
    }
}

pub fn persona_router(repository: SharedRepository) -> Router {
    Router::new()
        .route(
            "/api/persona",
            get(list_personas).post(save_persona).put(save_persona),
        )
        .route("/api/persona/{id}", get(get_persona).delete(delete_persona))
        .with_state(repository)
}

async fn list_personas(
    State(repo): State<SharedRepository>,
) -> Result<Json<Vec<Persona>>, RepositoryError> {
    Ok(Json(repo.find_all()?))
}

async fn save_persona(
    State(repo): State<SharedRepository>,
    Json(persona): Json<Persona>,
) -> Result<Json<Persona>, RepositoryError> {
    Ok(Json(repo.save(persona)?))
}

async fn get_persona(
    State(repo): State<SharedRepository>,
    Path(id): Path<u64>,
) -> Result<Response, RepositoryError> {
    Ok(match repo.find_by_id(id)? {
        Some(persona) => Json(persona).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    })
}

async fn delete_persona(
    State(repo): State<SharedRepository>,
    Path(id): Path<u64>,
) -> Result<StatusCode, RepositoryError> {
    repo.delete_by_id(id)?;
    Ok(StatusCode::OK)
}
