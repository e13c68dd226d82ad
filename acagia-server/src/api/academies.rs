//! Academy CRUD

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::academies::{self, Academy, AcademyInput};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AcademyQuery {
    pub owner: Option<String>,
}

/// GET /api/academies[?owner=]
pub async fn list_academies(
    State(state): State<AppState>,
    Query(query): Query<AcademyQuery>,
) -> ApiResult<Json<Vec<Academy>>> {
    Ok(Json(academies::list_academies(&state.db, query.owner.as_deref()).await?))
}

/// POST /api/academies
pub async fn create_academy(
    State(state): State<AppState>,
    Json(input): Json<AcademyInput>,
) -> ApiResult<(StatusCode, Json<Academy>)> {
    let academy = academies::create_academy(&state.db, &input).await?;
    Ok((StatusCode::CREATED, Json(academy)))
}

/// GET /api/academies/:academy_id
pub async fn get_academy(
    State(state): State<AppState>,
    Path(academy_id): Path<Uuid>,
) -> ApiResult<Json<Academy>> {
    Ok(Json(academies::get_academy(&state.db, academy_id).await?))
}

/// PUT /api/academies/:academy_id
pub async fn update_academy(
    State(state): State<AppState>,
    Path(academy_id): Path<Uuid>,
    Json(input): Json<AcademyInput>,
) -> ApiResult<Json<Academy>> {
    Ok(Json(academies::update_academy(&state.db, academy_id, &input).await?))
}

/// DELETE /api/academies/:academy_id
pub async fn delete_academy(
    State(state): State<AppState>,
    Path(academy_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    academies::delete_academy(&state.db, academy_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/academies", get(list_academies).post(create_academy))
        .route(
            "/api/academies/:academy_id",
            get(get_academy).put(update_academy).delete(delete_academy),
        )
}
