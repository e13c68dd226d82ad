//! Payment terms and member payments

use acagia_common::{time, uuid_utils, Error, Result};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::academies::Academy;
use super::members::get_member;
use super::required_text;

/// Billing plan offered by an academy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentTerm {
    pub guid: Uuid,
    pub academy_id: Uuid,
    pub name: String,
    pub amount_cents: i64,
    pub period_days: i64,
}

/// Longest billing period a term may have (ten years)
pub const MAX_PERIOD_DAYS: i64 = 3660;

fn default_period_days() -> i64 {
    30
}

/// `paid_on` plus `period_days`; `None` when the date falls out of range
fn due_after(paid_on: NaiveDate, period_days: i64) -> Option<NaiveDate> {
    let days = u64::try_from(period_days).ok()?;
    paid_on.checked_add_days(Days::new(days))
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentTermInput {
    pub name: String,
    pub amount_cents: i64,
    #[serde(default = "default_period_days")]
    pub period_days: i64,
}

impl PaymentTermInput {
    fn validated(&self) -> Result<String> {
        let name = required_text("Term name", &self.name, 30)?;
        if self.amount_cents < 0 {
            return Err(Error::InvalidInput("Amount cannot be negative".to_string()));
        }
        if !(1..=MAX_PERIOD_DAYS).contains(&self.period_days) {
            return Err(Error::InvalidInput(format!(
                "Billing period must be between 1 and {} days",
                MAX_PERIOD_DAYS
            )));
        }
        Ok(name)
    }
}

/// One payment made by a member
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberPayment {
    pub guid: Uuid,
    pub member_id: Uuid,
    pub term_id: Option<Uuid>,
    pub term_name: Option<String>,
    pub amount_cents: i64,
    pub paid_on: NaiveDate,
    /// `paid_on` plus the term's billing period; unknown once the term is gone
    pub next_due: Option<NaiveDate>,
}

/// A member's payments, newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentHistory {
    /// Due date following the most recent payment
    pub next_due: Option<NaiveDate>,
    pub payments: Vec<MemberPayment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentInput {
    pub term_id: Uuid,
    /// Defaults to the term's amount
    #[serde(default)]
    pub amount_cents: Option<i64>,
    /// Defaults to the academy-local date
    #[serde(default)]
    pub paid_on: Option<NaiveDate>,
}

const SELECT_TERM: &str = "SELECT guid, academy_id, name, amount_cents, period_days FROM payment_terms";

fn term_from_row(row: &SqliteRow) -> Result<PaymentTerm> {
    Ok(PaymentTerm {
        guid: uuid_utils::parse(row.get("guid"))?,
        academy_id: uuid_utils::parse(row.get("academy_id"))?,
        name: row.get("name"),
        amount_cents: row.get("amount_cents"),
        period_days: row.get("period_days"),
    })
}

fn payment_from_row(row: &SqliteRow) -> Result<MemberPayment> {
    let paid_on: NaiveDate = row.try_get("paid_on")?;
    let period_days: Option<i64> = row.get("period_days");
    Ok(MemberPayment {
        guid: uuid_utils::parse(row.get("guid"))?,
        member_id: uuid_utils::parse(row.get("member_id"))?,
        term_id: uuid_utils::parse_opt(row.get("term_id"))?,
        term_name: row.get("term_name"),
        amount_cents: row.get("amount_cents"),
        paid_on,
        next_due: period_days.and_then(|days| due_after(paid_on, days)),
    })
}

/// Terms of an academy, cheapest first
pub async fn list_terms(pool: &SqlitePool, academy_id: Uuid) -> Result<Vec<PaymentTerm>> {
    let rows = sqlx::query(&format!(
        "{} WHERE academy_id = ? ORDER BY amount_cents, name",
        SELECT_TERM
    ))
    .bind(academy_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(term_from_row).collect()
}

pub async fn get_term<'e, E>(executor: E, academy_id: Uuid, term_id: Uuid) -> Result<PaymentTerm>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!("{} WHERE guid = ? AND academy_id = ?", SELECT_TERM))
        .bind(term_id.to_string())
        .bind(academy_id.to_string())
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| Error::NotFound(format!("payment term {}", term_id)))?;

    term_from_row(&row)
}

pub async fn create_term(pool: &SqlitePool, academy_id: Uuid, input: &PaymentTermInput) -> Result<PaymentTerm> {
    let name = input.validated()?;
    let guid = uuid_utils::generate();

    sqlx::query(
        "INSERT INTO payment_terms (guid, academy_id, name, amount_cents, period_days) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(guid.to_string())
    .bind(academy_id.to_string())
    .bind(&name)
    .bind(input.amount_cents)
    .bind(input.period_days)
    .execute(pool)
    .await?;

    info!("Created payment term '{}' in academy {}", name, academy_id);

    get_term(pool, academy_id, guid).await
}

pub async fn update_term(
    pool: &SqlitePool,
    academy_id: Uuid,
    term_id: Uuid,
    input: &PaymentTermInput,
) -> Result<PaymentTerm> {
    let name = input.validated()?;

    let result = sqlx::query(
        r#"
        UPDATE payment_terms
        SET name = ?, amount_cents = ?, period_days = ?, updated_at = CURRENT_TIMESTAMP
        WHERE guid = ? AND academy_id = ?
        "#,
    )
    .bind(&name)
    .bind(input.amount_cents)
    .bind(input.period_days)
    .bind(term_id.to_string())
    .bind(academy_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("payment term {}", term_id)));
    }

    get_term(pool, academy_id, term_id).await
}

/// Delete a term; payments made under it are kept without a term
pub async fn delete_term(pool: &SqlitePool, academy_id: Uuid, term_id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM payment_terms WHERE guid = ? AND academy_id = ?")
        .bind(term_id.to_string())
        .bind(academy_id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("payment term {}", term_id)));
    }

    info!("Deleted payment term {} from academy {}", term_id, academy_id);
    Ok(())
}

/// Record a payment by a member against one of the academy's terms
pub async fn record_payment(
    pool: &SqlitePool,
    academy: &Academy,
    member_id: Uuid,
    input: &PaymentInput,
) -> Result<MemberPayment> {
    get_member(pool, academy.guid, member_id).await?;
    let term = match get_term(pool, academy.guid, input.term_id).await {
        Err(Error::NotFound(_)) => {
            return Err(Error::InvalidInput(format!(
                "Unknown payment term: {}",
                input.term_id
            )))
        }
        other => other?,
    };

    let amount_cents = input.amount_cents.unwrap_or(term.amount_cents);
    if amount_cents < 0 {
        return Err(Error::InvalidInput("Amount cannot be negative".to_string()));
    }
    let paid_on = match input.paid_on {
        Some(date) => date,
        None => time::local_today(academy.utc_offset_minutes)?,
    };
    let next_due = due_after(paid_on, term.period_days).ok_or_else(|| {
        Error::InvalidInput(format!("Payment date out of range: {}", paid_on))
    })?;

    let guid = uuid_utils::generate();
    sqlx::query(
        "INSERT INTO member_payments (guid, member_id, term_id, amount_cents, paid_on) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(guid.to_string())
    .bind(member_id.to_string())
    .bind(term.guid.to_string())
    .bind(amount_cents)
    .bind(paid_on)
    .execute(pool)
    .await?;

    info!(
        "Recorded payment of {} cents from member {} on {}",
        amount_cents, member_id, paid_on
    );

    Ok(MemberPayment {
        guid,
        member_id,
        term_id: Some(term.guid),
        term_name: Some(term.name),
        amount_cents,
        paid_on,
        next_due: Some(next_due),
    })
}

/// A member's payments, newest first, with the next due date
pub async fn payment_history(pool: &SqlitePool, academy_id: Uuid, member_id: Uuid) -> Result<PaymentHistory> {
    get_member(pool, academy_id, member_id).await?;

    let rows = sqlx::query(
        r#"
        SELECT p.guid, p.member_id, p.term_id, t.name AS term_name, t.period_days,
               p.amount_cents, p.paid_on
        FROM member_payments p
        LEFT JOIN payment_terms t ON t.guid = p.term_id
        WHERE p.member_id = ?
        ORDER BY p.paid_on DESC, p.created_at DESC
        "#,
    )
    .bind(member_id.to_string())
    .fetch_all(pool)
    .await?;

    let payments = rows.iter().map(payment_from_row).collect::<Result<Vec<_>>>()?;
    Ok(PaymentHistory {
        next_due: payments.first().and_then(|p| p.next_due),
        payments,
    })
}
