//! Attendance records and check-in
//!
//! Every record is worth one attendance day to its member: creating a
//! record credits the day, deleting it revokes the day, and moving it to
//! another member moves the day. The record write and the credit share one
//! transaction.

use acagia_common::{time, uuid_utils, Error, Result};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::academies::Academy;
use super::courses::get_course;
use super::member_ranks::credit_days;
use super::members::{find_member_by_name, get_member};

/// Rows per page of the attendance management list
pub const PAGE_SIZE: i64 = 100;

/// Shown when a check-in name matches no member
pub const CHECK_NAME_MESSAGE: &str = "Please check your name and enter again!";

/// Attendance record with member and course names
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRecord {
    pub guid: Uuid,
    pub member_id: Uuid,
    pub member_name: String,
    pub course_id: Option<Uuid>,
    pub course_name: Option<String>,
    pub date_attended: NaiveDate,
    pub time_attended: NaiveTime,
}

/// Self check-in request
#[derive(Debug, Clone, Deserialize)]
pub struct CheckIn {
    pub first_name: String,
    pub last_name: String,
    pub course_id: Uuid,
}

/// Manually entered attendance record
#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceInput {
    pub member_id: Uuid,
    #[serde(default)]
    pub course_id: Option<Uuid>,
    pub date_attended: NaiveDate,
    pub time_attended: NaiveTime,
}

/// One page of the attendance management list
#[derive(Debug, Clone, Serialize)]
pub struct AttendancePage {
    /// Page actually returned (1-based); out-of-range requests are clamped
    pub page: i64,
    pub total_pages: i64,
    /// Records across all pages
    pub total: i64,
    pub records: Vec<AttendanceRecord>,
}

/// Clamp `requested` into `1..=total_pages`; returns `(page, total_pages, offset)`
fn page_window(total: i64, requested: i64) -> (i64, i64, i64) {
    let total_pages = (total + PAGE_SIZE - 1) / PAGE_SIZE;
    let page = requested.clamp(1, total_pages.max(1));
    (page, total_pages, (page - 1) * PAGE_SIZE)
}

const SELECT_RECORD: &str = r#"
    SELECT a.guid, a.member_id, m.first_name || ' ' || m.last_name AS member_name,
           a.course_id, c.name AS course_name, a.date_attended, a.time_attended
    FROM attendance a
    JOIN members m ON m.guid = a.member_id
    LEFT JOIN courses c ON c.guid = a.course_id
"#;

fn record_from_row(row: &SqliteRow) -> Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        guid: uuid_utils::parse(row.get("guid"))?,
        member_id: uuid_utils::parse(row.get("member_id"))?,
        member_name: row.get("member_name"),
        course_id: uuid_utils::parse_opt(row.get("course_id"))?,
        course_name: row.get("course_name"),
        date_attended: row.try_get("date_attended")?,
        time_attended: row.try_get("time_attended")?,
    })
}

/// Load one attendance record of an academy
pub async fn get_record<'e, E>(executor: E, academy_id: Uuid, record_id: Uuid) -> Result<AttendanceRecord>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!("{} WHERE a.guid = ? AND a.academy_id = ?", SELECT_RECORD))
        .bind(record_id.to_string())
        .bind(academy_id.to_string())
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| Error::NotFound(format!("attendance record {}", record_id)))?;

    record_from_row(&row)
}

/// Check a member in by name for a course at the academy's current local time
pub async fn check_in(pool: &SqlitePool, academy: &Academy, input: &CheckIn) -> Result<AttendanceRecord> {
    let (date, time) = time::local_now(academy.utc_offset_minutes)?;

    let mut tx = pool.begin().await?;

    let member = find_member_by_name(&mut *tx, academy.guid, &input.first_name, &input.last_name)
        .await?
        .ok_or_else(|| Error::InvalidInput(CHECK_NAME_MESSAGE.to_string()))?;
    require_course(&mut tx, academy.guid, input.course_id).await?;

    let guid = insert_record(&mut tx, academy.guid, member.guid, Some(input.course_id), date, time).await?;
    credit_days(&mut tx, academy.guid, member.guid, 1).await?;

    let record = get_record(&mut *tx, academy.guid, guid).await?;
    tx.commit().await?;

    info!(
        "{} checked in to {} at {} {}",
        record.member_name,
        record.course_name.as_deref().unwrap_or("-"),
        date,
        time
    );
    Ok(record)
}

/// Records on one date, earliest first
pub async fn records_on(pool: &SqlitePool, academy_id: Uuid, date: NaiveDate) -> Result<Vec<AttendanceRecord>> {
    let rows = sqlx::query(&format!(
        "{} WHERE a.academy_id = ? AND a.date_attended = ? ORDER BY a.time_attended, member_name",
        SELECT_RECORD
    ))
    .bind(academy_id.to_string())
    .bind(date)
    .fetch_all(pool)
    .await?;

    rows.iter().map(record_from_row).collect()
}

/// Number of records on one date
pub async fn count_on(pool: &SqlitePool, academy_id: Uuid, date: NaiveDate) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM attendance WHERE academy_id = ? AND date_attended = ?")
            .bind(academy_id.to_string())
            .bind(date)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Attendance management list, newest first
pub async fn list_page(pool: &SqlitePool, academy_id: Uuid, page: i64) -> Result<AttendancePage> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attendance WHERE academy_id = ?")
        .bind(academy_id.to_string())
        .fetch_one(pool)
        .await?;

    let (page, total_pages, offset) = page_window(total, page);

    let rows = sqlx::query(&format!(
        r#"{} WHERE a.academy_id = ?
           ORDER BY a.date_attended DESC, a.time_attended DESC
           LIMIT ? OFFSET ?"#,
        SELECT_RECORD
    ))
    .bind(academy_id.to_string())
    .bind(PAGE_SIZE)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(AttendancePage {
        page,
        total_pages,
        total,
        records: rows.iter().map(record_from_row).collect::<Result<_>>()?,
    })
}

/// Most recent records of one member
pub async fn recent_for_member(
    pool: &SqlitePool,
    academy_id: Uuid,
    member_id: Uuid,
    limit: i64,
) -> Result<Vec<AttendanceRecord>> {
    let rows = sqlx::query(&format!(
        r#"{} WHERE a.academy_id = ? AND a.member_id = ?
           ORDER BY a.date_attended DESC, a.time_attended DESC
           LIMIT ?"#,
        SELECT_RECORD
    ))
    .bind(academy_id.to_string())
    .bind(member_id.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(record_from_row).collect()
}

/// Add a record by hand and credit its member one day
pub async fn create_record(pool: &SqlitePool, academy_id: Uuid, input: &AttendanceInput) -> Result<AttendanceRecord> {
    let mut tx = pool.begin().await?;

    require_member(&mut tx, academy_id, input.member_id).await?;
    if let Some(course_id) = input.course_id {
        require_course(&mut tx, academy_id, course_id).await?;
    }

    let guid = insert_record(
        &mut tx,
        academy_id,
        input.member_id,
        input.course_id,
        input.date_attended,
        input.time_attended,
    )
    .await?;
    credit_days(&mut tx, academy_id, input.member_id, 1).await?;

    let record = get_record(&mut *tx, academy_id, guid).await?;
    tx.commit().await?;

    Ok(record)
}

/// Edit a record; a change of member moves the credited day
pub async fn update_record(
    pool: &SqlitePool,
    academy_id: Uuid,
    record_id: Uuid,
    input: &AttendanceInput,
) -> Result<AttendanceRecord> {
    let mut tx = pool.begin().await?;

    let before = get_record(&mut *tx, academy_id, record_id).await?;
    require_member(&mut tx, academy_id, input.member_id).await?;
    if let Some(course_id) = input.course_id {
        require_course(&mut tx, academy_id, course_id).await?;
    }

    sqlx::query(
        r#"
        UPDATE attendance
        SET member_id = ?, course_id = ?, date_attended = ?, time_attended = ?
        WHERE guid = ? AND academy_id = ?
        "#,
    )
    .bind(input.member_id.to_string())
    .bind(input.course_id.map(|id| id.to_string()))
    .bind(input.date_attended)
    .bind(input.time_attended)
    .bind(record_id.to_string())
    .bind(academy_id.to_string())
    .execute(&mut *tx)
    .await?;

    if before.member_id != input.member_id {
        credit_days(&mut tx, academy_id, before.member_id, -1).await?;
        credit_days(&mut tx, academy_id, input.member_id, 1).await?;
        info!(
            "Moved attendance {} from member {} to {}",
            record_id, before.member_id, input.member_id
        );
    }

    let record = get_record(&mut *tx, academy_id, record_id).await?;
    tx.commit().await?;

    Ok(record)
}

/// Delete a record and revoke its day from the member
pub async fn delete_record(pool: &SqlitePool, academy_id: Uuid, record_id: Uuid) -> Result<()> {
    let mut tx = pool.begin().await?;

    let record = get_record(&mut *tx, academy_id, record_id).await?;

    sqlx::query("DELETE FROM attendance WHERE guid = ? AND academy_id = ?")
        .bind(record_id.to_string())
        .bind(academy_id.to_string())
        .execute(&mut *tx)
        .await?;
    credit_days(&mut tx, academy_id, record.member_id, -1).await?;

    tx.commit().await?;

    info!(
        "Deleted attendance of {} on {}; one day revoked",
        record.member_name, record.date_attended
    );
    Ok(())
}

async fn insert_record(
    conn: &mut SqliteConnection,
    academy_id: Uuid,
    member_id: Uuid,
    course_id: Option<Uuid>,
    date: NaiveDate,
    time: NaiveTime,
) -> Result<Uuid> {
    let guid = uuid_utils::generate();

    sqlx::query(
        r#"
        INSERT INTO attendance (guid, academy_id, member_id, course_id, date_attended, time_attended)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(guid.to_string())
    .bind(academy_id.to_string())
    .bind(member_id.to_string())
    .bind(course_id.map(|id| id.to_string()))
    .bind(date)
    .bind(time)
    .execute(&mut *conn)
    .await?;

    Ok(guid)
}

async fn require_member(conn: &mut SqliteConnection, academy_id: Uuid, member_id: Uuid) -> Result<()> {
    match get_member(&mut *conn, academy_id, member_id).await {
        Ok(_) => Ok(()),
        Err(Error::NotFound(_)) => Err(Error::InvalidInput(format!("Unknown member: {}", member_id))),
        Err(e) => Err(e),
    }
}

async fn require_course(conn: &mut SqliteConnection, academy_id: Uuid, course_id: Uuid) -> Result<()> {
    match get_course(&mut *conn, academy_id, course_id).await {
        Ok(_) => Ok(()),
        Err(Error::NotFound(_)) => Err(Error::InvalidInput(format!("Unknown course: {}", course_id))),
        Err(e) => Err(e),
    }
}
