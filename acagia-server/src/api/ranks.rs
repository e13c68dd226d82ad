//! Rank ladder CRUD

use acagia_common::RankStep;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::require_academy;
use crate::db::ranks::{self, RankInput};
use crate::error::ApiResult;
use crate::AppState;

/// Ranks submitted together; saved all or nothing
#[derive(Debug, Deserialize)]
pub struct RankBatch {
    pub ranks: Vec<RankInput>,
}

/// GET /api/academies/:academy_id/ranks
pub async fn list_ranks(
    State(state): State<AppState>,
    Path(academy_id): Path<Uuid>,
) -> ApiResult<Json<Vec<RankStep>>> {
    require_academy(&state, academy_id).await?;
    Ok(Json(ranks::list_ranks(&state.db, academy_id).await?))
}

/// POST /api/academies/:academy_id/ranks
pub async fn add_ranks(
    State(state): State<AppState>,
    Path(academy_id): Path<Uuid>,
    Json(batch): Json<RankBatch>,
) -> ApiResult<(StatusCode, Json<Vec<RankStep>>)> {
    require_academy(&state, academy_id).await?;
    let added = ranks::add_ranks(&state.db, academy_id, &batch.ranks).await?;
    Ok((StatusCode::CREATED, Json(added)))
}

/// GET /api/academies/:academy_id/ranks/:rank_id
pub async fn get_rank(
    State(state): State<AppState>,
    Path((academy_id, rank_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<RankStep>> {
    Ok(Json(ranks::get_rank(&state.db, academy_id, rank_id).await?))
}

/// PUT /api/academies/:academy_id/ranks/:rank_id
pub async fn update_rank(
    State(state): State<AppState>,
    Path((academy_id, rank_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<RankInput>,
) -> ApiResult<Json<RankStep>> {
    Ok(Json(
        ranks::update_rank(&state.db, academy_id, rank_id, &input).await?,
    ))
}

/// DELETE /api/academies/:academy_id/ranks/:rank_id
pub async fn delete_rank(
    State(state): State<AppState>,
    Path((academy_id, rank_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    ranks::delete_rank(&state.db, academy_id, rank_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/academies/:academy_id/ranks",
            get(list_ranks).post(add_ranks),
        )
        .route(
            "/api/academies/:academy_id/ranks/:rank_id",
            get(get_rank).put(update_rank).delete(delete_rank),
        )
}
