//! Payment term CRUD

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use super::require_academy;
use crate::db::payments::{self, PaymentTerm, PaymentTermInput};
use crate::error::ApiResult;
use crate::AppState;

/// GET /api/academies/:academy_id/payment-terms
pub async fn list_terms(
    State(state): State<AppState>,
    Path(academy_id): Path<Uuid>,
) -> ApiResult<Json<Vec<PaymentTerm>>> {
    require_academy(&state, academy_id).await?;
    Ok(Json(payments::list_terms(&state.db, academy_id).await?))
}

/// POST /api/academies/:academy_id/payment-terms
pub async fn create_term(
    State(state): State<AppState>,
    Path(academy_id): Path<Uuid>,
    Json(input): Json<PaymentTermInput>,
) -> ApiResult<(StatusCode, Json<PaymentTerm>)> {
    require_academy(&state, academy_id).await?;
    let term = payments::create_term(&state.db, academy_id, &input).await?;
    Ok((StatusCode::CREATED, Json(term)))
}

/// GET /api/academies/:academy_id/payment-terms/:term_id
pub async fn get_term(
    State(state): State<AppState>,
    Path((academy_id, term_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<PaymentTerm>> {
    Ok(Json(payments::get_term(&state.db, academy_id, term_id).await?))
}

/// PUT /api/academies/:academy_id/payment-terms/:term_id
pub async fn update_term(
    State(state): State<AppState>,
    Path((academy_id, term_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<PaymentTermInput>,
) -> ApiResult<Json<PaymentTerm>> {
    Ok(Json(
        payments::update_term(&state.db, academy_id, term_id, &input).await?,
    ))
}

/// DELETE /api/academies/:academy_id/payment-terms/:term_id
pub async fn delete_term(
    State(state): State<AppState>,
    Path((academy_id, term_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    payments::delete_term(&state.db, academy_id, term_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/academies/:academy_id/payment-terms",
            get(list_terms).post(create_term),
        )
        .route(
            "/api/academies/:academy_id/payment-terms/:term_id",
            get(get_term).put(update_term).delete(delete_term),
        )
}
