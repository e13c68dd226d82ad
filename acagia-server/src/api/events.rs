//! Events and event credit

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use super::{require_academy, DateQuery, MemberSelection};
use crate::db::events::{self, CreditOutcome, CreditedMember, Event, EventInput};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct EventQuery {
    pub date: Option<NaiveDate>,
    /// List every event instead of one day's
    #[serde(default)]
    pub all: bool,
}

/// GET /api/academies/:academy_id/events[?date=YYYY-MM-DD|?all=true]
///
/// Events running on `date` (default: academy-local today), by start time.
/// With `all=true` every event is listed, latest first.
pub async fn list_events(
    State(state): State<AppState>,
    Path(academy_id): Path<Uuid>,
    Query(query): Query<EventQuery>,
) -> ApiResult<Json<Vec<Event>>> {
    let academy = require_academy(&state, academy_id).await?;
    if query.all {
        return Ok(Json(events::list_events(&state.db, academy_id).await?));
    }
    let date = DateQuery { date: query.date }.or_today(&academy)?;
    Ok(Json(events::events_on(&state.db, academy_id, date).await?))
}

/// POST /api/academies/:academy_id/events
pub async fn create_event(
    State(state): State<AppState>,
    Path(academy_id): Path<Uuid>,
    Json(input): Json<EventInput>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    require_academy(&state, academy_id).await?;
    let event = events::create_event(&state.db, academy_id, &input).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /api/academies/:academy_id/events/:event_id
pub async fn get_event(
    State(state): State<AppState>,
    Path((academy_id, event_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Event>> {
    Ok(Json(events::get_event(&state.db, academy_id, event_id).await?))
}

/// PUT /api/academies/:academy_id/events/:event_id
pub async fn update_event(
    State(state): State<AppState>,
    Path((academy_id, event_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<EventInput>,
) -> ApiResult<Json<Event>> {
    Ok(Json(
        events::update_event(&state.db, academy_id, event_id, &input).await?,
    ))
}

/// DELETE /api/academies/:academy_id/events/:event_id
pub async fn delete_event(
    State(state): State<AppState>,
    Path((academy_id, event_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    events::delete_event(&state.db, academy_id, event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/academies/:academy_id/events/:event_id/credits
pub async fn list_credits(
    State(state): State<AppState>,
    Path((academy_id, event_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<CreditedMember>>> {
    events::get_event(&state.db, academy_id, event_id).await?;
    Ok(Json(events::credited_members(&state.db, event_id).await?))
}

/// POST /api/academies/:academy_id/events/:event_id/credits
///
/// Body: `{"member_ids": [..]}`
pub async fn grant_credit(
    State(state): State<AppState>,
    Path((academy_id, event_id)): Path<(Uuid, Uuid)>,
    Json(selection): Json<MemberSelection>,
) -> ApiResult<Json<CreditOutcome>> {
    Ok(Json(
        events::grant_credit(&state.db, academy_id, event_id, &selection.member_ids).await?,
    ))
}

/// DELETE /api/academies/:academy_id/events/:event_id/credits/:member_id
pub async fn revoke_credit(
    State(state): State<AppState>,
    Path((academy_id, event_id, member_id)): Path<(Uuid, Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    events::revoke_credit(&state.db, academy_id, event_id, member_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/academies/:academy_id/events",
            get(list_events).post(create_event),
        )
        .route(
            "/api/academies/:academy_id/events/:event_id",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route(
            "/api/academies/:academy_id/events/:event_id/credits",
            get(list_credits).post(grant_credit),
        )
        .route(
            "/api/academies/:academy_id/events/:event_id/credits/:member_id",
            delete(revoke_credit),
        )
}
