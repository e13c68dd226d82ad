//! Month calendar of events (data only)

use acagia_common::time::{first_of_month, format_month, last_of_month, next_month, parse_month, previous_month};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::require_academy;
use crate::db::events::{events_between, Event};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    /// `YYYY-MM`; defaults to the academy-local current month
    pub month: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub weekday: Weekday,
    /// Titles of the events running that day
    pub events: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthView {
    pub month: String,
    pub prev_month: String,
    pub next_month: String,
    pub days: Vec<CalendarDay>,
}

/// Lay out `events` over every day of the month containing `month`
pub fn month_view(month: NaiveDate, events: &[Event]) -> MonthView {
    let first = first_of_month(month);
    let last = last_of_month(month);

    let days = first
        .iter_days()
        .take_while(|d| *d <= last)
        .map(|date| CalendarDay {
            date,
            weekday: date.weekday(),
            events: events
                .iter()
                .filter(|e| e.covers(date))
                .map(|e| e.title.clone())
                .collect(),
        })
        .collect();

    MonthView {
        month: format_month(first),
        prev_month: format_month(previous_month(first)),
        next_month: format_month(next_month(first)),
        days,
    }
}

/// GET /api/academies/:academy_id/calendar[?month=YYYY-MM]
pub async fn get_calendar(
    State(state): State<AppState>,
    Path(academy_id): Path<Uuid>,
    Query(query): Query<MonthQuery>,
) -> ApiResult<Json<MonthView>> {
    let academy = require_academy(&state, academy_id).await?;
    let month = match query.month.as_deref() {
        Some(month) => parse_month(month)?,
        None => acagia_common::time::local_today(academy.utc_offset_minutes)?,
    };

    let events = events_between(&state.db, academy_id, first_of_month(month), last_of_month(month)).await?;
    Ok(Json(month_view(month, &events)))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/academies/:academy_id/calendar", get(get_calendar))
}
