//! Member self check-in

use acagia_common::db::COURSE_DAY_LETTERS;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use uuid::Uuid;

use super::require_academy;
use crate::db::attendance::{self, AttendanceRecord, CheckIn};
use crate::db::courses::{list_courses, Course};
use crate::error::ApiResult;
use crate::AppState;

/// Courses a member can check in to today
#[derive(Debug, Serialize)]
pub struct CheckInOptions {
    pub date: NaiveDate,
    pub courses: Vec<Course>,
}

/// Weekday letter of `date` in course schedules
fn day_letter(date: NaiveDate) -> Option<char> {
    COURSE_DAY_LETTERS
        .chars()
        .nth(date.weekday().num_days_from_monday() as usize)
}

/// Courses scheduled on `date`
pub fn courses_on(courses: Vec<Course>, date: NaiveDate) -> Vec<Course> {
    match day_letter(date) {
        Some(letter) => courses
            .into_iter()
            .filter(|c| c.course_days.contains(letter))
            .collect(),
        None => Vec::new(),
    }
}

/// GET /api/academies/:academy_id/checkin
pub async fn check_in_options(
    State(state): State<AppState>,
    Path(academy_id): Path<Uuid>,
) -> ApiResult<Json<CheckInOptions>> {
    let academy = require_academy(&state, academy_id).await?;
    let date = acagia_common::time::local_today(academy.utc_offset_minutes)?;
    let courses = courses_on(list_courses(&state.db, academy_id).await?, date);
    Ok(Json(CheckInOptions { date, courses }))
}

/// POST /api/academies/:academy_id/checkin
///
/// Body: `{"first_name", "last_name", "course_id"}`
pub async fn check_in(
    State(state): State<AppState>,
    Path(academy_id): Path<Uuid>,
    Json(request): Json<CheckIn>,
) -> ApiResult<(StatusCode, Json<AttendanceRecord>)> {
    let academy = require_academy(&state, academy_id).await?;
    let record = attendance::check_in(&state.db, &academy, &request).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/api/academies/:academy_id/checkin",
        get(check_in_options).post(check_in),
    )
}
