//! Events and event attendance credit
//!
//! Crediting a member for an event adds the event's `credit_days` to the
//! member's rank progress and remembers how many days were granted, so a
//! later revoke (or deleting the event) takes back exactly that amount.

use acagia_common::ranking::MAX_DAYS;
use acagia_common::{uuid_utils, Error, Result};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::member_ranks::{credit_days, NO_SELECTION_MESSAGE};
use super::{optional_text, required_text};

/// Event record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub guid: Uuid,
    pub academy_id: Uuid,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub description: Option<String>,
    pub location: String,
    pub credit_days: i64,
}

impl Event {
    /// Whether the event runs on `date`
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

fn default_credit_days() -> i64 {
    1
}

/// Fields accepted when creating or updating an event
#[derive(Debug, Clone, Deserialize)]
pub struct EventInput {
    pub title: String,
    pub start_date: NaiveDate,
    /// Defaults to `start_date`
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default = "default_credit_days")]
    pub credit_days: i64,
}

struct ValidEvent {
    title: String,
    end_date: NaiveDate,
    description: Option<String>,
    location: String,
}

impl EventInput {
    fn validated(&self) -> Result<ValidEvent> {
        let title = required_text("Title", &self.title, 30)?;
        let end_date = self.end_date.unwrap_or(self.start_date);
        if end_date < self.start_date {
            return Err(Error::InvalidInput(
                "End date cannot be before start date".to_string(),
            ));
        }
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if end_date == self.start_date && end <= start {
                return Err(Error::InvalidInput(
                    "End time must be later than start time".to_string(),
                ));
            }
        }
        if !(0..=MAX_DAYS).contains(&self.credit_days) {
            return Err(Error::InvalidInput(format!(
                "Credit days must be between 0 and {}: {}",
                MAX_DAYS, self.credit_days
            )));
        }
        Ok(ValidEvent {
            title,
            end_date,
            description: optional_text(self.description.as_deref()),
            location: self.location.trim().to_string(),
        })
    }
}

/// A member credited for an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreditedMember {
    pub member_id: Uuid,
    pub member_name: String,
    pub credit_days: i64,
}

/// Result of crediting a batch of members
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreditOutcome {
    pub credited: Vec<String>,
    /// Members who already had credit for the event
    pub skipped: Vec<String>,
}

const SELECT_EVENT: &str = r#"
    SELECT guid, academy_id, title, start_date, end_date, start_time, end_time,
           description, location, credit_days
    FROM events
"#;

fn event_from_row(row: &SqliteRow) -> Result<Event> {
    Ok(Event {
        guid: uuid_utils::parse(row.get("guid"))?,
        academy_id: uuid_utils::parse(row.get("academy_id"))?,
        title: row.get("title"),
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        description: row.get("description"),
        location: row.get("location"),
        credit_days: row.get("credit_days"),
    })
}

/// All events of an academy, latest first
pub async fn list_events(pool: &SqlitePool, academy_id: Uuid) -> Result<Vec<Event>> {
    let rows = sqlx::query(&format!(
        "{} WHERE academy_id = ? ORDER BY start_date DESC, start_time",
        SELECT_EVENT
    ))
    .bind(academy_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(event_from_row).collect()
}

/// Events running on `date`, by start time
pub async fn events_on(pool: &SqlitePool, academy_id: Uuid, date: NaiveDate) -> Result<Vec<Event>> {
    events_between(pool, academy_id, date, date).await
}

/// Events overlapping the inclusive range `from..=to`
pub async fn events_between(
    pool: &SqlitePool,
    academy_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Event>> {
    let rows = sqlx::query(&format!(
        r#"{} WHERE academy_id = ? AND start_date <= ? AND end_date >= ?
           ORDER BY start_time, start_date, title"#,
        SELECT_EVENT
    ))
    .bind(academy_id.to_string())
    .bind(to)
    .bind(from)
    .fetch_all(pool)
    .await?;

    rows.iter().map(event_from_row).collect()
}

/// Load one event of an academy
pub async fn get_event<'e, E>(executor: E, academy_id: Uuid, event_id: Uuid) -> Result<Event>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!("{} WHERE guid = ? AND academy_id = ?", SELECT_EVENT))
        .bind(event_id.to_string())
        .bind(academy_id.to_string())
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| Error::NotFound(format!("event {}", event_id)))?;

    event_from_row(&row)
}

pub async fn create_event(pool: &SqlitePool, academy_id: Uuid, input: &EventInput) -> Result<Event> {
    let valid = input.validated()?;
    let guid = uuid_utils::generate();

    sqlx::query(
        r#"
        INSERT INTO events (
            guid, academy_id, title, start_date, end_date, start_time, end_time,
            description, location, credit_days
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(guid.to_string())
    .bind(academy_id.to_string())
    .bind(&valid.title)
    .bind(input.start_date)
    .bind(valid.end_date)
    .bind(input.start_time)
    .bind(input.end_time)
    .bind(&valid.description)
    .bind(&valid.location)
    .bind(input.credit_days)
    .execute(pool)
    .await?;

    info!("Created event '{}' on {} in academy {}", valid.title, input.start_date, academy_id);

    get_event(pool, academy_id, guid).await
}

/// Update an event; credits already granted keep their amount
pub async fn update_event(
    pool: &SqlitePool,
    academy_id: Uuid,
    event_id: Uuid,
    input: &EventInput,
) -> Result<Event> {
    let valid = input.validated()?;

    let result = sqlx::query(
        r#"
        UPDATE events
        SET title = ?, start_date = ?, end_date = ?, start_time = ?, end_time = ?,
            description = ?, location = ?, credit_days = ?, updated_at = CURRENT_TIMESTAMP
        WHERE guid = ? AND academy_id = ?
        "#,
    )
    .bind(&valid.title)
    .bind(input.start_date)
    .bind(valid.end_date)
    .bind(input.start_time)
    .bind(input.end_time)
    .bind(&valid.description)
    .bind(&valid.location)
    .bind(input.credit_days)
    .bind(event_id.to_string())
    .bind(academy_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("event {}", event_id)));
    }

    get_event(pool, academy_id, event_id).await
}

/// Delete an event, revoking every credit it granted
pub async fn delete_event(pool: &SqlitePool, academy_id: Uuid, event_id: Uuid) -> Result<()> {
    let mut tx = pool.begin().await?;

    let event = get_event(&mut *tx, academy_id, event_id).await?;
    let credited = credited_members(&mut *tx, event_id).await?;

    for member in &credited {
        credit_days(&mut tx, academy_id, member.member_id, -member.credit_days).await?;
    }

    sqlx::query("DELETE FROM events WHERE guid = ? AND academy_id = ?")
        .bind(event_id.to_string())
        .bind(academy_id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(
        "Deleted event '{}'; revoked credit from {} member(s)",
        event.title,
        credited.len()
    );
    Ok(())
}

/// Members credited for an event, by name
pub async fn credited_members<'e, E>(executor: E, event_id: Uuid) -> Result<Vec<CreditedMember>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(
        r#"
        SELECT me.member_id, m.first_name || ' ' || m.last_name AS member_name, me.credit_days
        FROM member_events me
        JOIN members m ON m.guid = me.member_id
        WHERE me.event_id = ?
        ORDER BY m.first_name COLLATE NOCASE, m.last_name COLLATE NOCASE
        "#,
    )
    .bind(event_id.to_string())
    .fetch_all(executor)
    .await?;

    rows.iter()
        .map(|row| -> Result<CreditedMember> {
            Ok(CreditedMember {
                member_id: uuid_utils::parse(row.get("member_id"))?,
                member_name: row.get("member_name"),
                credit_days: row.get("credit_days"),
            })
        })
        .collect()
}

/// Credit the selected members for an event
///
/// Members already credited are skipped. An unknown member aborts the batch.
pub async fn grant_credit(
    pool: &SqlitePool,
    academy_id: Uuid,
    event_id: Uuid,
    member_ids: &[Uuid],
) -> Result<CreditOutcome> {
    if member_ids.is_empty() {
        return Err(Error::InvalidInput(NO_SELECTION_MESSAGE.to_string()));
    }

    let mut tx = pool.begin().await?;
    let event = get_event(&mut *tx, academy_id, event_id).await?;
    let mut outcome = CreditOutcome::default();

    for &member_id in member_ids {
        let name: String = sqlx::query_scalar(
            "SELECT first_name || ' ' || last_name FROM members WHERE guid = ? AND academy_id = ?",
        )
        .bind(member_id.to_string())
        .bind(academy_id.to_string())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound(format!("member {}", member_id)))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO member_events (guid, event_id, member_id, credit_days)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (event_id, member_id) DO NOTHING
            "#,
        )
        .bind(uuid_utils::generate().to_string())
        .bind(event_id.to_string())
        .bind(member_id.to_string())
        .bind(event.credit_days)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            outcome.skipped.push(name);
            continue;
        }

        credit_days(&mut tx, academy_id, member_id, event.credit_days).await?;
        outcome.credited.push(name);
    }

    tx.commit().await?;

    info!(
        "Credited {} member(s) {} day(s) for '{}'; {} already credited",
        outcome.credited.len(),
        event.credit_days,
        event.title,
        outcome.skipped.len()
    );
    Ok(outcome)
}

/// Take back the days one member was credited for an event
pub async fn revoke_credit(
    pool: &SqlitePool,
    academy_id: Uuid,
    event_id: Uuid,
    member_id: Uuid,
) -> Result<()> {
    let mut tx = pool.begin().await?;
    get_event(&mut *tx, academy_id, event_id).await?;

    let granted: i64 = sqlx::query_scalar(
        "DELETE FROM member_events WHERE event_id = ? AND member_id = ? RETURNING credit_days",
    )
    .bind(event_id.to_string())
    .bind(member_id.to_string())
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| {
        Error::NotFound(format!("credit for member {} on event {}", member_id, event_id))
    })?;

    credit_days(&mut tx, academy_id, member_id, -granted).await?;
    tx.commit().await?;

    info!(
        "Revoked {} day(s) of event {} credit from member {}",
        granted, event_id, member_id
    );
    Ok(())
}
