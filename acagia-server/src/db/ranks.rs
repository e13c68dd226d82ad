//! Rank ladder persistence
//!
//! Ranks are added in batches (all or nothing). Editing or deleting a rank
//! fixes up the progress of the members currently holding it in the same
//! transaction.

use acagia_common::ranking::{find_duplicate_order, rederive_days_left, MAX_DAYS};
use acagia_common::{uuid_utils, Error, RankLadder, RankStep, Result};
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::member_ranks::{members_on_rank, save_progress, write_progress};
use super::required_text;

/// Fields accepted when adding or updating a rank
#[derive(Debug, Clone, Deserialize)]
pub struct RankInput {
    pub name: String,
    pub rank_order: i64,
    #[serde(default)]
    pub days_required: i64,
}

impl RankInput {
    fn validated(&self) -> Result<String> {
        let name = required_text("Rank name", &self.name, 20)?;
        if self.rank_order < 1 {
            return Err(Error::InvalidInput(format!(
                "Rank order must be 1 or greater: {}",
                self.rank_order
            )));
        }
        if !(0..=MAX_DAYS).contains(&self.days_required) {
            return Err(Error::InvalidInput(format!(
                "Days required must be between 0 and {}: {}",
                MAX_DAYS, self.days_required
            )));
        }
        Ok(name)
    }
}

const SELECT_RANK: &str = "SELECT guid, name, rank_order, days_required FROM ranks";

fn rank_from_row(row: &SqliteRow) -> Result<RankStep> {
    Ok(RankStep {
        guid: uuid_utils::parse(row.get("guid"))?,
        name: row.get("name"),
        rank_order: row.get("rank_order"),
        days_required: row.get("days_required"),
    })
}

fn order_conflict(err: sqlx::Error, rank_order: i64) -> Error {
    Error::from_unique_violation(err, &format!("Rank order {}", rank_order))
}

/// Ranks of an academy in ascending order
pub async fn list_ranks<'e, E>(executor: E, academy_id: Uuid) -> Result<Vec<RankStep>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(&format!(
        "{} WHERE academy_id = ? ORDER BY rank_order",
        SELECT_RANK
    ))
    .bind(academy_id.to_string())
    .fetch_all(executor)
    .await?;

    rows.iter().map(rank_from_row).collect()
}

/// An academy's ranks as a [`RankLadder`]
pub async fn load_ladder<'e, E>(executor: E, academy_id: Uuid) -> Result<RankLadder>
where
    E: SqliteExecutor<'e>,
{
    Ok(RankLadder::new(list_ranks(executor, academy_id).await?))
}

/// Load one rank of an academy
pub async fn get_rank<'e, E>(executor: E, academy_id: Uuid, rank_id: Uuid) -> Result<RankStep>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!("{} WHERE guid = ? AND academy_id = ?", SELECT_RANK))
        .bind(rank_id.to_string())
        .bind(academy_id.to_string())
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| Error::NotFound(format!("rank {}", rank_id)))?;

    rank_from_row(&row)
}

/// Add a batch of ranks
///
/// Fails without writing anything if the batch is empty, any entry is
/// invalid, or any `rank_order` is repeated in the batch or already in use.
pub async fn add_ranks(
    pool: &SqlitePool,
    academy_id: Uuid,
    inputs: &[RankInput],
) -> Result<Vec<RankStep>> {
    if inputs.is_empty() {
        return Err(Error::InvalidInput("No ranks to add".to_string()));
    }

    let names = inputs
        .iter()
        .map(RankInput::validated)
        .collect::<Result<Vec<_>>>()?;

    if let Some(order) = find_duplicate_order(inputs.iter().map(|r| r.rank_order)) {
        return Err(Error::Conflict(format!(
            "Rank order {} appears more than once",
            order
        )));
    }

    let mut tx = pool.begin().await?;
    let mut added = Vec::with_capacity(inputs.len());

    for (input, name) in inputs.iter().zip(names) {
        let guid = uuid_utils::generate();
        sqlx::query(
            "INSERT INTO ranks (guid, academy_id, name, rank_order, days_required) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(guid.to_string())
        .bind(academy_id.to_string())
        .bind(&name)
        .bind(input.rank_order)
        .bind(input.days_required)
        .execute(&mut *tx)
        .await
        .map_err(|e| order_conflict(e, input.rank_order))?;

        added.push(RankStep {
            guid,
            name,
            rank_order: input.rank_order,
            days_required: input.days_required,
        });
    }

    tx.commit().await?;

    info!("Added {} rank(s) to academy {}", added.len(), academy_id);
    added.sort_by_key(|r| r.rank_order);
    Ok(added)
}

/// Update a rank; a new `days_required` is applied to members holding it
pub async fn update_rank(
    pool: &SqlitePool,
    academy_id: Uuid,
    rank_id: Uuid,
    input: &RankInput,
) -> Result<RankStep> {
    let name = input.validated()?;

    let mut tx = pool.begin().await?;
    let before = get_rank(&mut *tx, academy_id, rank_id).await?;

    sqlx::query(
        r#"
        UPDATE ranks
        SET name = ?, rank_order = ?, days_required = ?, updated_at = CURRENT_TIMESTAMP
        WHERE guid = ? AND academy_id = ?
        "#,
    )
    .bind(&name)
    .bind(input.rank_order)
    .bind(input.days_required)
    .bind(rank_id.to_string())
    .bind(academy_id.to_string())
    .execute(&mut *tx)
    .await
    .map_err(|e| order_conflict(e, input.rank_order))?;

    if before.days_required != input.days_required {
        rederive_members(&mut tx, rank_id, input.days_required).await?;
    }

    let updated = get_rank(&mut *tx, academy_id, rank_id).await?;
    tx.commit().await?;

    Ok(updated)
}

async fn rederive_members(
    conn: &mut SqliteConnection,
    rank_id: Uuid,
    days_required: i64,
) -> Result<()> {
    let holders = members_on_rank(&mut *conn, rank_id).await?;
    for (member_id, progress) in &holders {
        write_progress(&mut *conn, *member_id, &rederive_days_left(progress, days_required)?)
            .await?;
    }
    if !holders.is_empty() {
        info!(
            "Rank {} now requires {} days; updated {} member(s)",
            rank_id,
            days_required,
            holders.len()
        );
    }
    Ok(())
}

/// Delete a rank; members holding it go back to having no rank
pub async fn delete_rank(pool: &SqlitePool, academy_id: Uuid, rank_id: Uuid) -> Result<()> {
    let mut tx = pool.begin().await?;
    let rank = get_rank(&mut *tx, academy_id, rank_id).await?;

    let holders = members_on_rank(&mut *tx, rank_id).await?;
    for (member_id, progress) in &holders {
        save_progress(&mut tx, academy_id, *member_id, &progress.with_rank(None)).await?;
    }

    sqlx::query("DELETE FROM ranks WHERE guid = ? AND academy_id = ?")
        .bind(rank_id.to_string())
        .bind(academy_id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(
        "Deleted rank '{}' from academy {}; {} member(s) unranked",
        rank.name,
        academy_id,
        holders.len()
    );
    Ok(())
}
