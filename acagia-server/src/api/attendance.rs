//! Attendance by date and attendance management

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{require_academy, DateQuery};
use crate::db::attendance::{self, AttendanceInput, AttendancePage, AttendanceRecord};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct AttendanceOnDate {
    pub date: NaiveDate,
    pub count: i64,
    pub records: Vec<AttendanceRecord>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
}

fn default_page() -> i64 {
    1
}

/// GET /api/academies/:academy_id/attendance[?date=YYYY-MM-DD]
pub async fn attendance_on(
    State(state): State<AppState>,
    Path(academy_id): Path<Uuid>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<AttendanceOnDate>> {
    let academy = require_academy(&state, academy_id).await?;
    let date = query.or_today(&academy)?;
    let records = attendance::records_on(&state.db, academy_id, date).await?;

    Ok(Json(AttendanceOnDate {
        date,
        count: records.len() as i64,
        records,
    }))
}

/// GET /api/academies/:academy_id/attendance/records[?page=N]
pub async fn list_records(
    State(state): State<AppState>,
    Path(academy_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<AttendancePage>> {
    require_academy(&state, academy_id).await?;
    Ok(Json(
        attendance::list_page(&state.db, academy_id, query.page).await?,
    ))
}

/// POST /api/academies/:academy_id/attendance/records
pub async fn create_record(
    State(state): State<AppState>,
    Path(academy_id): Path<Uuid>,
    Json(input): Json<AttendanceInput>,
) -> ApiResult<(StatusCode, Json<AttendanceRecord>)> {
    require_academy(&state, academy_id).await?;
    let record = attendance::create_record(&state.db, academy_id, &input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// PUT /api/academies/:academy_id/attendance/records/:record_id
pub async fn update_record(
    State(state): State<AppState>,
    Path((academy_id, record_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<AttendanceInput>,
) -> ApiResult<Json<AttendanceRecord>> {
    Ok(Json(
        attendance::update_record(&state.db, academy_id, record_id, &input).await?,
    ))
}

/// DELETE /api/academies/:academy_id/attendance/records/:record_id
pub async fn delete_record(
    State(state): State<AppState>,
    Path((academy_id, record_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    attendance::delete_record(&state.db, academy_id, record_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/academies/:academy_id/attendance", get(attendance_on))
        .route(
            "/api/academies/:academy_id/attendance/records",
            get(list_records).post(create_record),
        )
        .route(
            "/api/academies/:academy_id/attendance/records/:record_id",
            put(update_record).delete(delete_record),
        )
}
