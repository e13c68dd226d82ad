//! Repositories over the academy database
//!
//! All queries are scoped by `academy_id`; looking up a row through another
//! academy yields `Error::NotFound`. Single-statement reads accept any
//! [`sqlx::SqliteExecutor`] so they can run on the pool or inside a
//! transaction. Anything that touches rank counters runs in a transaction
//! and goes through [`member_ranks`].

use acagia_common::db::Address;
use acagia_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

pub mod academies;
pub mod attendance;
pub mod courses;
pub mod events;
pub mod member_ranks;
pub mod members;
pub mod payments;
pub mod ranks;

/// Trim a required text field and enforce its maximum length
pub(crate) fn required_text(field: &str, value: &str, max_len: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(format!("{} is required", field)));
    }
    if trimmed.chars().count() > max_len {
        return Err(Error::InvalidInput(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional text field; blank becomes `None`
pub(crate) fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Address kept in a row's `street`, `city`, `state` and `zip` columns
pub(crate) fn address_from_row(row: &SqliteRow) -> Option<Address> {
    let city: Option<String> = row.get("city");
    let state: Option<String> = row.get("state");
    Some(Address {
        street: row.get("street"),
        city: city?,
        state: state?,
        zip: row.get("zip"),
    })
}

/// `serde` helper distinguishing an absent field from an explicit `null`
///
/// Use with `#[serde(default, deserialize_with = "present")]` on an
/// `Option<Option<T>>` field.
pub(crate) fn present<'de, T, D>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::academies::{create_academy, Academy, AcademyInput};
    use super::members::{create_member, MemberInput};
    use acagia_common::db::{init_memory_database, AcademyType, Gender, MemberStatus, MemberType};
    use chrono::NaiveDate;
    use sqlx::SqlitePool;
    use uuid::Uuid;

    pub async fn add_academy(pool: &SqlitePool, name: &str) -> Academy {
        create_academy(
            pool,
            &AcademyInput {
                name: name.to_string(),
                academy_type: AcademyType::Mma,
                office_phone: String::new(),
                owner: None,
                utc_offset_minutes: 0,
                address: None,
            },
        )
        .await
        .unwrap()
    }

    /// In-memory database with one academy
    pub async fn setup() -> (SqlitePool, Academy) {
        let pool = init_memory_database().await.unwrap();
        let academy = add_academy(&pool, "Dojo").await;
        (pool, academy)
    }

    pub async fn add_member(pool: &SqlitePool, academy: &Academy, first: &str, last: &str) -> Uuid {
        create_member(
            pool,
            academy,
            &MemberInput {
                first_name: first.to_string(),
                last_name: last.to_string(),
                member_type: MemberType::Student,
                status: MemberStatus::Active,
                date_of_birth: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
                gender: Gender::Male,
                cell_phone: String::new(),
                email: String::new(),
                address: None,
            },
        )
        .await
        .unwrap()
        .guid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text() {
        assert_eq!(required_text("Name", "  Ana ", 20).unwrap(), "Ana");
        assert!(required_text("Name", "   ", 20).is_err());
        assert!(required_text("Name", "abcdef", 5).is_err());
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text(Some("  ")), None);
        assert_eq!(optional_text(Some(" x ")), Some("x".to_string()));
        assert_eq!(optional_text(None), None);
    }
}
