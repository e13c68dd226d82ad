//! Academy persistence
//!
//! An academy is the tenant scope: every other table hangs off one.

use acagia_common::db::{Address, AcademyType};
use acagia_common::{time, uuid_utils, Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::{address_from_row, optional_text, required_text};

/// Academy record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Academy {
    pub guid: Uuid,
    pub name: String,
    pub academy_type: AcademyType,
    pub office_phone: String,
    pub owner: Option<String>,
    pub utc_offset_minutes: i32,
    pub address: Option<Address>,
}

/// Fields accepted when creating or updating an academy
#[derive(Debug, Clone, Deserialize)]
pub struct AcademyInput {
    pub name: String,
    #[serde(default)]
    pub academy_type: AcademyType,
    #[serde(default)]
    pub office_phone: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default)]
    pub address: Option<Address>,
}

struct ValidAcademy {
    name: String,
    phone: String,
    owner: Option<String>,
    address: Option<Address>,
}

impl AcademyInput {
    fn validated(&self) -> Result<ValidAcademy> {
        let name = required_text("Academy name", &self.name, 30)?;
        time::offset(self.utc_offset_minutes)?;
        let phone = self.office_phone.trim().to_string();
        if phone.chars().count() > 12 {
            return Err(Error::InvalidInput(
                "Office phone must be at most 12 characters".to_string(),
            ));
        }
        Ok(ValidAcademy {
            name,
            phone,
            owner: optional_text(self.owner.as_deref()),
            address: self.address.as_ref().map(Address::validated).transpose()?,
        })
    }
}

const SELECT_ACADEMY: &str = r#"
    SELECT guid, name, academy_type, office_phone, owner, utc_offset_minutes,
           street, city, state, zip
    FROM academies
"#;

fn academy_from_row(row: &SqliteRow) -> Result<Academy> {
    Ok(Academy {
        guid: uuid_utils::parse(row.get("guid"))?,
        name: row.get("name"),
        academy_type: row.get::<String, _>("academy_type").parse()?,
        office_phone: row.get("office_phone"),
        owner: row.get("owner"),
        utc_offset_minutes: row.get("utc_offset_minutes"),
        address: address_from_row(row),
    })
}

/// List academies, optionally only those of one owner
pub async fn list_academies(pool: &SqlitePool, owner: Option<&str>) -> Result<Vec<Academy>> {
    let rows = match owner {
        Some(owner) => {
            sqlx::query(&format!("{} WHERE owner = ? ORDER BY name", SELECT_ACADEMY))
                .bind(owner)
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query(&format!("{} ORDER BY name", SELECT_ACADEMY))
                .fetch_all(pool)
                .await?
        }
    };

    rows.iter().map(academy_from_row).collect()
}

/// Load one academy
pub async fn get_academy<'e, E>(executor: E, academy_id: Uuid) -> Result<Academy>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!("{} WHERE guid = ?", SELECT_ACADEMY))
        .bind(academy_id.to_string())
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| Error::NotFound(format!("academy {}", academy_id)))?;

    academy_from_row(&row)
}

/// Create a new academy
pub async fn create_academy(pool: &SqlitePool, input: &AcademyInput) -> Result<Academy> {
    let valid = input.validated()?;
    let address = valid.address.as_ref();
    let guid = uuid_utils::generate();

    sqlx::query(
        r#"
        INSERT INTO academies (
            guid, name, academy_type, office_phone, owner, utc_offset_minutes,
            street, city, state, zip
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(guid.to_string())
    .bind(&valid.name)
    .bind(input.academy_type.as_str())
    .bind(&valid.phone)
    .bind(&valid.owner)
    .bind(input.utc_offset_minutes)
    .bind(address.and_then(|a| a.street.as_deref()))
    .bind(address.map(|a| a.city.as_str()))
    .bind(address.map(|a| a.state.as_str()))
    .bind(address.and_then(|a| a.zip.as_deref()))
    .execute(pool)
    .await?;

    info!("Created academy '{}' ({})", valid.name, guid);

    get_academy(pool, guid).await
}

/// Update an academy's details
pub async fn update_academy(
    pool: &SqlitePool,
    academy_id: Uuid,
    input: &AcademyInput,
) -> Result<Academy> {
    let valid = input.validated()?;
    let address = valid.address.as_ref();

    let result = sqlx::query(
        r#"
        UPDATE academies
        SET name = ?, academy_type = ?, office_phone = ?, owner = ?,
            utc_offset_minutes = ?, street = ?, city = ?, state = ?, zip = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE guid = ?
        "#,
    )
    .bind(&valid.name)
    .bind(input.academy_type.as_str())
    .bind(&valid.phone)
    .bind(&valid.owner)
    .bind(input.utc_offset_minutes)
    .bind(address.and_then(|a| a.street.as_deref()))
    .bind(address.map(|a| a.city.as_str()))
    .bind(address.map(|a| a.state.as_str()))
    .bind(address.and_then(|a| a.zip.as_deref()))
    .bind(academy_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("academy {}", academy_id)));
    }

    get_academy(pool, academy_id).await
}

/// Delete an academy and, by cascade, everything it owns
pub async fn delete_academy(pool: &SqlitePool, academy_id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM academies WHERE guid = ?")
        .bind(academy_id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("academy {}", academy_id)));
    }

    info!("Deleted academy {}", academy_id);
    Ok(())
}
