//! HTTP API handlers for acagia-server
//!
//! Every academy-scoped route lives under `/api/academies/:academy_id`. The
//! academy is loaded first so an unknown id is a 404 for every route.

use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::academies::{get_academy, Academy};
use crate::error::ApiResult;
use crate::AppState;

pub mod academies;
pub mod attendance;
pub mod calendar;
pub mod checkin;
pub mod courses;
pub mod dashboard;
pub mod events;
pub mod health;
pub mod members;
pub mod payments;
pub mod promotion;
pub mod ranks;

pub use health::health_routes;

/// All `/api` routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(academies::routes())
        .merge(dashboard::routes())
        .merge(members::routes())
        .merge(courses::routes())
        .merge(ranks::routes())
        .merge(promotion::routes())
        .merge(checkin::routes())
        .merge(attendance::routes())
        .merge(events::routes())
        .merge(calendar::routes())
        .merge(payments::routes())
}

/// Load the academy named in the path
pub(crate) async fn require_academy(state: &AppState, academy_id: Uuid) -> ApiResult<Academy> {
    Ok(get_academy(&state.db, academy_id).await?)
}

/// `?date=YYYY-MM-DD` query, defaulting to the academy-local today
#[derive(Debug, Default, Deserialize)]
pub struct DateQuery {
    pub date: Option<chrono::NaiveDate>,
}

impl DateQuery {
    pub(crate) fn or_today(&self, academy: &Academy) -> ApiResult<chrono::NaiveDate> {
        match self.date {
            Some(date) => Ok(date),
            None => Ok(acagia_common::time::local_today(academy.utc_offset_minutes)?),
        }
    }
}

/// Body listing selected members (promotion, event credit)
#[derive(Debug, Deserialize)]
pub struct MemberSelection {
    #[serde(default)]
    pub member_ids: Vec<Uuid>,
}

