//! Course persistence

use acagia_common::db::{normalize_course_days, MemberType};
use acagia_common::{uuid_utils, Error, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::members::get_member;
use super::required_text;

/// Course record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Course {
    pub guid: Uuid,
    pub academy_id: Uuid,
    pub name: String,
    /// Weekday letters, Monday first (e.g. `"MWF"`)
    pub course_days: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub instructor_id: Option<Uuid>,
    /// Instructor's full name, when one is assigned
    pub instructor_name: Option<String>,
}

/// Fields accepted when creating or updating a course
#[derive(Debug, Clone, Deserialize)]
pub struct CourseInput {
    pub name: String,
    pub course_days: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub instructor_id: Option<Uuid>,
}

impl CourseInput {
    async fn validated(&self, pool: &SqlitePool, academy_id: Uuid) -> Result<(String, String)> {
        let name = required_text("Course name", &self.name, 30)?;
        let days = normalize_course_days(&self.course_days)?;

        if self.end_time <= self.start_time {
            return Err(Error::InvalidInput(
                "End time must be later than start time".to_string(),
            ));
        }

        if let Some(instructor_id) = self.instructor_id {
            let instructor = match get_member(pool, academy_id, instructor_id).await {
                Err(Error::NotFound(_)) => {
                    return Err(Error::InvalidInput(format!(
                        "Unknown instructor: {}",
                        instructor_id
                    )))
                }
                other => other?,
            };
            if instructor.member_type != MemberType::Instructor {
                return Err(Error::InvalidInput(format!(
                    "{} is not an instructor",
                    instructor.full_name()
                )));
            }
        }

        Ok((name, days))
    }
}

const SELECT_COURSE: &str = r#"
    SELECT c.guid, c.academy_id, c.name, c.course_days, c.start_time, c.end_time,
           c.instructor_id, m.first_name || ' ' || m.last_name AS instructor_name
    FROM courses c
    LEFT JOIN members m ON m.guid = c.instructor_id
"#;

fn course_from_row(row: &SqliteRow) -> Result<Course> {
    Ok(Course {
        guid: uuid_utils::parse(row.get("guid"))?,
        academy_id: uuid_utils::parse(row.get("academy_id"))?,
        name: row.get("name"),
        course_days: row.get("course_days"),
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        instructor_id: uuid_utils::parse_opt(row.get("instructor_id"))?,
        instructor_name: row.get("instructor_name"),
    })
}

/// Courses of an academy by start time, then end time
pub async fn list_courses(pool: &SqlitePool, academy_id: Uuid) -> Result<Vec<Course>> {
    let rows = sqlx::query(&format!(
        "{} WHERE c.academy_id = ? ORDER BY c.start_time, c.end_time, c.name",
        SELECT_COURSE
    ))
    .bind(academy_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(course_from_row).collect()
}

/// Load one course of an academy
pub async fn get_course<'e, E>(executor: E, academy_id: Uuid, course_id: Uuid) -> Result<Course>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!(
        "{} WHERE c.guid = ? AND c.academy_id = ?",
        SELECT_COURSE
    ))
    .bind(course_id.to_string())
    .bind(academy_id.to_string())
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| Error::NotFound(format!("course {}", course_id)))?;

    course_from_row(&row)
}

pub async fn create_course(
    pool: &SqlitePool,
    academy_id: Uuid,
    input: &CourseInput,
) -> Result<Course> {
    let (name, days) = input.validated(pool, academy_id).await?;
    let guid = uuid_utils::generate();

    sqlx::query(
        r#"
        INSERT INTO courses (guid, academy_id, name, course_days, start_time, end_time, instructor_id)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(guid.to_string())
    .bind(academy_id.to_string())
    .bind(&name)
    .bind(&days)
    .bind(input.start_time)
    .bind(input.end_time)
    .bind(input.instructor_id.map(|id| id.to_string()))
    .execute(pool)
    .await?;

    info!("Created course '{}' ({}) in academy {}", name, days, academy_id);

    get_course(pool, academy_id, guid).await
}

pub async fn update_course(
    pool: &SqlitePool,
    academy_id: Uuid,
    course_id: Uuid,
    input: &CourseInput,
) -> Result<Course> {
    let (name, days) = input.validated(pool, academy_id).await?;

    let result = sqlx::query(
        r#"
        UPDATE courses
        SET name = ?, course_days = ?, start_time = ?, end_time = ?, instructor_id = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE guid = ? AND academy_id = ?
        "#,
    )
    .bind(&name)
    .bind(&days)
    .bind(input.start_time)
    .bind(input.end_time)
    .bind(input.instructor_id.map(|id| id.to_string()))
    .bind(course_id.to_string())
    .bind(academy_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("course {}", course_id)));
    }

    get_course(pool, academy_id, course_id).await
}

/// Delete a course; its attendance records keep their rows with no course
pub async fn delete_course(pool: &SqlitePool, academy_id: Uuid, course_id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM courses WHERE guid = ? AND academy_id = ?")
        .bind(course_id.to_string())
        .bind(academy_id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("course {}", course_id)));
    }

    info!("Deleted course {} from academy {}", course_id, academy_id);
    Ok(())
}
