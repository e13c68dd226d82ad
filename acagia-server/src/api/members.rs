//! Member CRUD, rank progress and payments

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use super::require_academy;
use crate::db::attendance::{recent_for_member, AttendanceRecord};
use crate::db::member_ranks::{self, MemberRank, MemberRankUpdate};
use crate::db::members::{self, Member, MemberInput};
use crate::db::payments::{self, MemberPayment, PaymentHistory, PaymentInput};
use crate::error::ApiResult;
use crate::AppState;

/// Attendance rows shown on the member page
const RECENT_ATTENDANCE: i64 = 10;

/// Member page: details, rank progress and latest attendance
#[derive(Debug, Serialize)]
pub struct MemberDetail {
    pub member: Member,
    pub rank: MemberRank,
    pub recent_attendance: Vec<AttendanceRecord>,
}

/// GET /api/academies/:academy_id/members
pub async fn list_members(
    State(state): State<AppState>,
    Path(academy_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Member>>> {
    require_academy(&state, academy_id).await?;
    Ok(Json(members::list_members(&state.db, academy_id).await?))
}

/// POST /api/academies/:academy_id/members
pub async fn create_member(
    State(state): State<AppState>,
    Path(academy_id): Path<Uuid>,
    Json(input): Json<MemberInput>,
) -> ApiResult<(StatusCode, Json<Member>)> {
    let academy = require_academy(&state, academy_id).await?;
    let member = members::create_member(&state.db, &academy, &input).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// GET /api/academies/:academy_id/members/:member_id
pub async fn get_member(
    State(state): State<AppState>,
    Path((academy_id, member_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<MemberDetail>> {
    let member = members::get_member(&state.db, academy_id, member_id).await?;
    let rank = member_ranks::get_member_rank(&state.db, academy_id, member_id).await?;
    let recent_attendance =
        recent_for_member(&state.db, academy_id, member_id, RECENT_ATTENDANCE).await?;

    Ok(Json(MemberDetail {
        member,
        rank,
        recent_attendance,
    }))
}

/// PUT /api/academies/:academy_id/members/:member_id
pub async fn update_member(
    State(state): State<AppState>,
    Path((academy_id, member_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<MemberInput>,
) -> ApiResult<Json<Member>> {
    Ok(Json(
        members::update_member(&state.db, academy_id, member_id, &input).await?,
    ))
}

/// DELETE /api/academies/:academy_id/members/:member_id
pub async fn delete_member(
    State(state): State<AppState>,
    Path((academy_id, member_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    members::delete_member(&state.db, academy_id, member_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/academies/:academy_id/members/:member_id/rank
pub async fn get_member_rank(
    State(state): State<AppState>,
    Path((academy_id, member_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<MemberRank>> {
    Ok(Json(
        member_ranks::get_member_rank(&state.db, academy_id, member_id).await?,
    ))
}

/// PUT /api/academies/:academy_id/members/:member_id/rank
///
/// Body: `{"rank_id": <uuid|null>, "days_attended": <n>}`, both optional.
pub async fn update_member_rank(
    State(state): State<AppState>,
    Path((academy_id, member_id)): Path<(Uuid, Uuid)>,
    Json(update): Json<MemberRankUpdate>,
) -> ApiResult<Json<MemberRank>> {
    Ok(Json(
        member_ranks::update_member_rank(&state.db, academy_id, member_id, &update).await?,
    ))
}

/// GET /api/academies/:academy_id/members/:member_id/payments
pub async fn list_payments(
    State(state): State<AppState>,
    Path((academy_id, member_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<PaymentHistory>> {
    Ok(Json(
        payments::payment_history(&state.db, academy_id, member_id).await?,
    ))
}

/// POST /api/academies/:academy_id/members/:member_id/payments
pub async fn record_payment(
    State(state): State<AppState>,
    Path((academy_id, member_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<PaymentInput>,
) -> ApiResult<(StatusCode, Json<MemberPayment>)> {
    let academy = require_academy(&state, academy_id).await?;
    let payment = payments::record_payment(&state.db, &academy, member_id, &input).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/academies/:academy_id/members",
            get(list_members).post(create_member),
        )
        .route(
            "/api/academies/:academy_id/members/:member_id",
            get(get_member).put(update_member).delete(delete_member),
        )
        .route(
            "/api/academies/:academy_id/members/:member_id/rank",
            get(get_member_rank).put(update_member_rank),
        )
        .route(
            "/api/academies/:academy_id/members/:member_id/payments",
            get(list_payments).post(record_payment),
        )
}
