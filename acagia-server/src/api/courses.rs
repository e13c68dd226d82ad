//! Course CRUD

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use super::require_academy;
use crate::db::courses::{self, Course, CourseInput};
use crate::error::ApiResult;
use crate::AppState;

/// GET /api/academies/:academy_id/courses
pub async fn list_courses(
    State(state): State<AppState>,
    Path(academy_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Course>>> {
    require_academy(&state, academy_id).await?;
    Ok(Json(courses::list_courses(&state.db, academy_id).await?))
}

/// POST /api/academies/:academy_id/courses
pub async fn create_course(
    State(state): State<AppState>,
    Path(academy_id): Path<Uuid>,
    Json(input): Json<CourseInput>,
) -> ApiResult<(StatusCode, Json<Course>)> {
    require_academy(&state, academy_id).await?;
    let course = courses::create_course(&state.db, academy_id, &input).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

/// GET /api/academies/:academy_id/courses/:course_id
pub async fn get_course(
    State(state): State<AppState>,
    Path((academy_id, course_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Course>> {
    Ok(Json(courses::get_course(&state.db, academy_id, course_id).await?))
}

/// PUT /api/academies/:academy_id/courses/:course_id
pub async fn update_course(
    State(state): State<AppState>,
    Path((academy_id, course_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<CourseInput>,
) -> ApiResult<Json<Course>> {
    Ok(Json(
        courses::update_course(&state.db, academy_id, course_id, &input).await?,
    ))
}

/// DELETE /api/academies/:academy_id/courses/:course_id
pub async fn delete_course(
    State(state): State<AppState>,
    Path((academy_id, course_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    courses::delete_course(&state.db, academy_id, course_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/academies/:academy_id/courses",
            get(list_courses).post(create_course),
        )
        .route(
            "/api/academies/:academy_id/courses/:course_id",
            get(get_course).put(update_course).delete(delete_course),
        )
}
