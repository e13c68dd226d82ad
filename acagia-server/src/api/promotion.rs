//! Promotion list and bulk promote/demote

use acagia_common::ranking::PromotionEntry;
use acagia_common::Direction;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::require_academy;
use crate::db::member_ranks::{self, PromotionOutcome};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PromotionRequest {
    pub direction: Direction,
    #[serde(default)]
    pub member_ids: Vec<Uuid>,
}

/// GET /api/academies/:academy_id/promotion
pub async fn promotion_list(
    State(state): State<AppState>,
    Path(academy_id): Path<Uuid>,
) -> ApiResult<Json<Vec<PromotionEntry>>> {
    require_academy(&state, academy_id).await?;
    Ok(Json(member_ranks::promotion_list(&state.db, academy_id).await?))
}

/// POST /api/academies/:academy_id/promotion
///
/// Body: `{"direction": "promote"|"demote", "member_ids": [..]}`
pub async fn promote(
    State(state): State<AppState>,
    Path(academy_id): Path<Uuid>,
    Json(request): Json<PromotionRequest>,
) -> ApiResult<Json<PromotionOutcome>> {
    require_academy(&state, academy_id).await?;
    let outcome = member_ranks::promote_members(
        &state.db,
        academy_id,
        &request.member_ids,
        request.direction,
    )
    .await?;
    Ok(Json(outcome))
}

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/api/academies/:academy_id/promotion",
        get(promotion_list).post(promote),
    )
}
