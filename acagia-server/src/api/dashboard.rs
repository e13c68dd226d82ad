//! Academy dashboard summary

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use uuid::Uuid;

use super::require_academy;
use crate::db::attendance::count_on;
use crate::db::events::{events_on, Event};
use crate::db::members::{birthdays_on, count_by_status, Member, MemberCounts};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub academy_name: String,
    /// Academy-local date and time the summary was taken
    pub local_date: NaiveDate,
    pub local_time: NaiveTime,
    pub members: MemberCounts,
    pub attendance_today: i64,
    pub birthdays_today: Vec<Member>,
    pub events_today: Vec<Event>,
}

/// GET /api/academies/:academy_id/dashboard
pub async fn get_dashboard(
    State(state): State<AppState>,
    Path(academy_id): Path<Uuid>,
) -> ApiResult<Json<Dashboard>> {
    let academy = require_academy(&state, academy_id).await?;
    let (today, now) = acagia_common::time::local_now(academy.utc_offset_minutes)?;

    Ok(Json(Dashboard {
        members: count_by_status(&state.db, academy_id).await?,
        attendance_today: count_on(&state.db, academy_id, today).await?,
        birthdays_today: birthdays_on(&state.db, academy_id, today).await?,
        events_today: events_on(&state.db, academy_id, today).await?,
        academy_name: academy.name,
        local_date: today,
        local_time: now,
    }))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/academies/:academy_id/dashboard", get(get_dashboard))
}
