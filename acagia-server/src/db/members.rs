//! Member persistence
//!
//! Creating a member also creates its `member_ranks` row (no rank, zero
//! counters) in the same transaction, so every member always has exactly one
//! progress row.

use acagia_common::db::{Address, Gender, MemberStatus, MemberType};
use acagia_common::{time, uuid_utils, Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::academies::Academy;
use super::{address_from_row, required_text};

/// Member record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub guid: Uuid,
    pub academy_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub member_type: MemberType,
    pub status: MemberStatus,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub cell_phone: String,
    pub email: String,
    pub address: Option<Address>,
    pub member_since: NaiveDate,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Fields accepted when creating or updating a member
#[derive(Debug, Clone, Deserialize)]
pub struct MemberInput {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub member_type: MemberType,
    #[serde(default)]
    pub status: MemberStatus,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    #[serde(default)]
    pub cell_phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: Option<Address>,
}

struct ValidMember {
    first_name: String,
    last_name: String,
    cell_phone: String,
    email: String,
    address: Option<Address>,
}

impl MemberInput {
    fn validated(&self) -> Result<ValidMember> {
        let first_name = required_text("First name", &self.first_name, 20)?;
        let last_name = required_text("Last name", &self.last_name, 20)?;
        let email = self.email.trim().to_string();
        if !email.is_empty() && !email.contains('@') {
            return Err(Error::InvalidInput(format!("Invalid email: {}", email)));
        }
        if email.chars().count() > 40 {
            return Err(Error::InvalidInput(
                "Email must be at most 40 characters".to_string(),
            ));
        }
        Ok(ValidMember {
            first_name,
            last_name,
            cell_phone: self.cell_phone.trim().to_string(),
            email,
            address: self.address.as_ref().map(Address::validated).transpose()?,
        })
    }
}

/// Member counts shown on the dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemberCounts {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub hold: i64,
}

pub(crate) const SELECT_MEMBER: &str = r#"
    SELECT guid, academy_id, first_name, last_name, member_type, status,
           date_of_birth, gender, cell_phone, email, street, city, state, zip,
           member_since
    FROM members
"#;

pub(crate) fn member_from_row(row: &SqliteRow) -> Result<Member> {
    Ok(Member {
        guid: uuid_utils::parse(row.get("guid"))?,
        academy_id: uuid_utils::parse(row.get("academy_id"))?,
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        member_type: row.get::<String, _>("member_type").parse()?,
        status: row.get::<String, _>("status").parse()?,
        date_of_birth: row.try_get("date_of_birth")?,
        gender: row.get::<String, _>("gender").parse()?,
        cell_phone: row.get("cell_phone"),
        email: row.get("email"),
        address: address_from_row(row),
        member_since: row.try_get("member_since")?,
    })
}

/// Members of an academy in alphabetical order of first name
pub async fn list_members(pool: &SqlitePool, academy_id: Uuid) -> Result<Vec<Member>> {
    let rows = sqlx::query(&format!(
        "{} WHERE academy_id = ? ORDER BY first_name COLLATE NOCASE, last_name COLLATE NOCASE",
        SELECT_MEMBER
    ))
    .bind(academy_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(member_from_row).collect()
}

/// Load one member of an academy
pub async fn get_member<'e, E>(executor: E, academy_id: Uuid, member_id: Uuid) -> Result<Member>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!("{} WHERE guid = ? AND academy_id = ?", SELECT_MEMBER))
        .bind(member_id.to_string())
        .bind(academy_id.to_string())
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| Error::NotFound(format!("member {}", member_id)))?;

    member_from_row(&row)
}

/// Find a member by name, ignoring case and surrounding whitespace
pub async fn find_member_by_name<'e, E>(
    executor: E,
    academy_id: Uuid,
    first_name: &str,
    last_name: &str,
) -> Result<Option<Member>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!(
        r#"{} WHERE academy_id = ?
              AND first_name = ? COLLATE NOCASE
              AND last_name = ? COLLATE NOCASE
           ORDER BY member_since
           LIMIT 1"#,
        SELECT_MEMBER
    ))
    .bind(academy_id.to_string())
    .bind(first_name.trim())
    .bind(last_name.trim())
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(member_from_row).transpose()
}

/// Create a member together with its empty rank progress row
pub async fn create_member(
    pool: &SqlitePool,
    academy: &Academy,
    input: &MemberInput,
) -> Result<Member> {
    let valid = input.validated()?;
    let address = valid.address.as_ref();
    let guid = uuid_utils::generate();
    let member_since = time::local_today(academy.utc_offset_minutes)?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO members (
            guid, academy_id, first_name, last_name, member_type, status,
            date_of_birth, gender, cell_phone, email, street, city, state, zip,
            member_since
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(guid.to_string())
    .bind(academy.guid.to_string())
    .bind(&valid.first_name)
    .bind(&valid.last_name)
    .bind(input.member_type.as_str())
    .bind(input.status.as_str())
    .bind(input.date_of_birth)
    .bind(input.gender.as_str())
    .bind(&valid.cell_phone)
    .bind(&valid.email)
    .bind(address.and_then(|a| a.street.as_deref()))
    .bind(address.map(|a| a.city.as_str()))
    .bind(address.map(|a| a.state.as_str()))
    .bind(address.and_then(|a| a.zip.as_deref()))
    .bind(member_since)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO member_ranks (guid, academy_id, member_id) VALUES (?, ?, ?)")
        .bind(uuid_utils::generate().to_string())
        .bind(academy.guid.to_string())
        .bind(guid.to_string())
        .execute(&mut *tx)
        .await?;

    let member = get_member(&mut *tx, academy.guid, guid).await?;
    tx.commit().await?;

    info!("Added member {} to academy {}", member.full_name(), academy.guid);
    Ok(member)
}

/// Update a member's details
pub async fn update_member(
    pool: &SqlitePool,
    academy_id: Uuid,
    member_id: Uuid,
    input: &MemberInput,
) -> Result<Member> {
    let valid = input.validated()?;
    let address = valid.address.as_ref();

    let result = sqlx::query(
        r#"
        UPDATE members
        SET first_name = ?, last_name = ?, member_type = ?, status = ?,
            date_of_birth = ?, gender = ?, cell_phone = ?, email = ?,
            street = ?, city = ?, state = ?, zip = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE guid = ? AND academy_id = ?
        "#,
    )
    .bind(&valid.first_name)
    .bind(&valid.last_name)
    .bind(input.member_type.as_str())
    .bind(input.status.as_str())
    .bind(input.date_of_birth)
    .bind(input.gender.as_str())
    .bind(&valid.cell_phone)
    .bind(&valid.email)
    .bind(address.and_then(|a| a.street.as_deref()))
    .bind(address.map(|a| a.city.as_str()))
    .bind(address.map(|a| a.state.as_str()))
    .bind(address.and_then(|a| a.zip.as_deref()))
    .bind(member_id.to_string())
    .bind(academy_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("member {}", member_id)));
    }

    get_member(pool, academy_id, member_id).await
}

/// Delete a member; progress, attendance, credits and payments cascade
pub async fn delete_member(pool: &SqlitePool, academy_id: Uuid, member_id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM members WHERE guid = ? AND academy_id = ?")
        .bind(member_id.to_string())
        .bind(academy_id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("member {}", member_id)));
    }

    info!("Deleted member {} from academy {}", member_id, academy_id);
    Ok(())
}

/// Count members by status
pub async fn count_by_status(pool: &SqlitePool, academy_id: Uuid) -> Result<MemberCounts> {
    let rows = sqlx::query(
        "SELECT status, COUNT(*) AS n FROM members WHERE academy_id = ? GROUP BY status",
    )
    .bind(academy_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut counts = MemberCounts::default();
    for row in rows {
        let n: i64 = row.get("n");
        counts.total += n;
        match row.get::<String, _>("status").parse::<MemberStatus>()? {
            MemberStatus::Active => counts.active += n,
            MemberStatus::Inactive => counts.inactive += n,
            MemberStatus::Hold => counts.hold += n,
        }
    }

    Ok(counts)
}

/// Members whose birthday (month and day) falls on `date`
pub async fn birthdays_on(
    pool: &SqlitePool,
    academy_id: Uuid,
    date: NaiveDate,
) -> Result<Vec<Member>> {
    let rows = sqlx::query(&format!(
        "{} WHERE academy_id = ? AND strftime('%m-%d', date_of_birth) = ? ORDER BY first_name",
        SELECT_MEMBER
    ))
    .bind(academy_id.to_string())
    .bind(date.format("%m-%d").to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(member_from_row).collect()
}
