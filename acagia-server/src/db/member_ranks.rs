//! Member rank progress persistence
//!
//! Every write of a member's progress goes through [`save_progress`] or
//! [`credit_days`], which run [`acagia_common::ranking::reconcile`] against
//! the stored row before writing. Both take a connection so callers can
//! group several members (or an attendance insert) into one transaction.

use acagia_common::ranking::{apply_credit, reconcile, PromotionEntry, MAX_DAYS};
use acagia_common::{uuid_utils, Direction, Error, RankProgress, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::present;
use super::ranks::{get_rank, load_ladder};

/// Shown when promotion is attempted before any rank exists
pub const NO_RANKS_MESSAGE: &str = "Make your ranking system first to use PROMOTION tab now!";
/// Shown when a promotion request selects nobody
pub const NO_SELECTION_MESSAGE: &str =
    "You didn't select any members! Please select members first.";

/// A member's rank and counters, as shown on the member page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberRank {
    pub member_id: Uuid,
    pub rank_id: Option<Uuid>,
    pub rank_name: Option<String>,
    pub days_attended: i64,
    pub days_left: i64,
    pub total_days: i64,
}

/// Manual edit of a member's progress
///
/// `rank_id` distinguishes "absent" (keep) from `null` (remove the rank).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberRankUpdate {
    #[serde(default, deserialize_with = "present")]
    pub rank_id: Option<Option<Uuid>>,
    #[serde(default)]
    pub days_attended: Option<i64>,
}

/// Result of a bulk promotion or demotion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromotionOutcome {
    pub operation: Direction,
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

fn progress_from_row(row: &SqliteRow) -> Result<RankProgress> {
    Ok(RankProgress {
        rank_id: uuid_utils::parse_opt(row.get("rank_id"))?,
        days_attended: row.get("days_attended"),
        days_left: row.get("days_left"),
        total_days: row.get("total_days"),
    })
}

/// Stored progress of one member
pub async fn load_progress<'e, E>(executor: E, academy_id: Uuid, member_id: Uuid) -> Result<RankProgress>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(
        r#"
        SELECT rank_id, days_attended, days_left, total_days
        FROM member_ranks
        WHERE member_id = ? AND academy_id = ?
        "#,
    )
    .bind(member_id.to_string())
    .bind(academy_id.to_string())
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| Error::NotFound(format!("member {}", member_id)))?;

    progress_from_row(&row)
}

/// Members currently holding a rank, with their progress
pub async fn members_on_rank<'e, E>(executor: E, rank_id: Uuid) -> Result<Vec<(Uuid, RankProgress)>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(
        "SELECT member_id, rank_id, days_attended, days_left, total_days FROM member_ranks WHERE rank_id = ?",
    )
    .bind(rank_id.to_string())
    .fetch_all(executor)
    .await?;

    rows.iter()
        .map(|row| -> Result<(Uuid, RankProgress)> {
            Ok((uuid_utils::parse(row.get("member_id"))?, progress_from_row(row)?))
        })
        .collect()
}

/// Write counters as given, without reconciling
///
/// Only for callers that computed the row themselves from the stored one
/// (e.g. re-deriving `days_left` after a rank requirement changed).
pub(crate) async fn write_progress<'e, E>(executor: E, member_id: Uuid, progress: &RankProgress) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        UPDATE member_ranks
        SET rank_id = ?, days_attended = ?, days_left = ?, total_days = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE member_id = ?
        "#,
    )
    .bind(progress.rank_id.map(|id| id.to_string()))
    .bind(progress.days_attended)
    .bind(progress.days_left)
    .bind(progress.total_days)
    .bind(member_id.to_string())
    .execute(executor)
    .await?;

    Ok(())
}

/// Save an edited progress row through the reconcile hook
///
/// A new `rank_id` must belong to the academy.
pub async fn save_progress(
    conn: &mut SqliteConnection,
    academy_id: Uuid,
    member_id: Uuid,
    edited: &RankProgress,
) -> Result<RankProgress> {
    let previous = load_progress(&mut *conn, academy_id, member_id).await?;

    let days_required = match edited.rank_id {
        Some(rank_id) if edited.rank_id != previous.rank_id => {
            match get_rank(&mut *conn, academy_id, rank_id).await {
                Ok(rank) => rank.days_required,
                Err(Error::NotFound(_)) => {
                    return Err(Error::InvalidInput(format!("Unknown rank: {}", rank_id)))
                }
                Err(e) => return Err(e),
            }
        }
        _ => 0,
    };

    let saved = reconcile(&previous, edited, days_required)?;
    if saved != previous {
        write_progress(&mut *conn, member_id, &saved).await?;
        debug!("Saved rank progress of member {}: {:?}", member_id, saved);
    }

    Ok(saved)
}

/// Credit (positive) or revoke (negative) attendance days
pub async fn credit_days(
    conn: &mut SqliteConnection,
    academy_id: Uuid,
    member_id: Uuid,
    delta: i64,
) -> Result<RankProgress> {
    let previous = load_progress(&mut *conn, academy_id, member_id).await?;
    let saved = apply_credit(&previous, delta)?;
    if saved != previous {
        write_progress(&mut *conn, member_id, &saved).await?;
    }
    Ok(saved)
}

/// Progress of one member with the rank's name
pub async fn get_member_rank(pool: &SqlitePool, academy_id: Uuid, member_id: Uuid) -> Result<MemberRank> {
    let row = sqlx::query(
        r#"
        SELECT mr.member_id, mr.rank_id, r.name AS rank_name,
               mr.days_attended, mr.days_left, mr.total_days
        FROM member_ranks mr
        LEFT JOIN ranks r ON r.guid = mr.rank_id
        WHERE mr.member_id = ? AND mr.academy_id = ?
        "#,
    )
    .bind(member_id.to_string())
    .bind(academy_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("member {}", member_id)))?;

    let progress = progress_from_row(&row)?;
    Ok(MemberRank {
        member_id: uuid_utils::parse(row.get("member_id"))?,
        rank_id: progress.rank_id,
        rank_name: row.get("rank_name"),
        days_attended: progress.days_attended,
        days_left: progress.days_left,
        total_days: progress.total_days,
    })
}

/// Manually set a member's rank and/or days attended
///
/// When both change, the rank change wins and the counters restart.
pub async fn update_member_rank(
    pool: &SqlitePool,
    academy_id: Uuid,
    member_id: Uuid,
    update: &MemberRankUpdate,
) -> Result<MemberRank> {
    if let Some(days) = update.days_attended {
        if !(0..=MAX_DAYS).contains(&days) {
            return Err(Error::InvalidInput(format!(
                "Days attended must be between 0 and {}: {}",
                MAX_DAYS, days
            )));
        }
    }

    let mut tx = pool.begin().await?;
    let previous = load_progress(&mut *tx, academy_id, member_id).await?;

    let mut edited = previous;
    if let Some(rank_id) = update.rank_id {
        edited = edited.with_rank(rank_id);
    }
    if let Some(days) = update.days_attended {
        edited = edited.with_days_attended(days);
    }

    save_progress(&mut tx, academy_id, member_id, &edited).await?;
    tx.commit().await?;

    get_member_rank(pool, academy_id, member_id).await
}

/// The promotion list, ordered by member first name
pub async fn promotion_list(pool: &SqlitePool, academy_id: Uuid) -> Result<Vec<PromotionEntry>> {
    let ladder = load_ladder(pool, academy_id).await?;
    if ladder.is_empty() {
        return Err(Error::InvalidInput(NO_RANKS_MESSAGE.to_string()));
    }

    let rows = sqlx::query(
        r#"
        SELECT mr.member_id, m.first_name, m.last_name,
               mr.rank_id, mr.days_attended, mr.days_left, mr.total_days
        FROM member_ranks mr
        JOIN members m ON m.guid = mr.member_id
        WHERE mr.academy_id = ?
        ORDER BY m.first_name COLLATE NOCASE, m.last_name COLLATE NOCASE
        "#,
    )
    .bind(academy_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<PromotionEntry> {
            let member_id = uuid_utils::parse(row.get("member_id"))?;
            let name = format!(
                "{} {}",
                row.get::<String, _>("first_name"),
                row.get::<String, _>("last_name")
            );
            Ok(ladder.entry_for(member_id, name, &progress_from_row(row)?))
        })
        .collect()
}

/// Promote or demote the selected members one step
///
/// Members with nowhere to go (top rank on promote, first rank or no rank on
/// demote) are reported in `failed`; everybody else moves. Unknown member ids
/// abort the whole request.
pub async fn promote_members(
    pool: &SqlitePool,
    academy_id: Uuid,
    member_ids: &[Uuid],
    direction: Direction,
) -> Result<PromotionOutcome> {
    if member_ids.is_empty() {
        return Err(Error::InvalidInput(NO_SELECTION_MESSAGE.to_string()));
    }

    let mut tx = pool.begin().await?;

    let ladder = load_ladder(&mut *tx, academy_id).await?;
    if ladder.is_empty() {
        return Err(Error::InvalidInput(NO_RANKS_MESSAGE.to_string()));
    }

    let mut outcome = PromotionOutcome {
        operation: direction,
        succeeded: Vec::new(),
        failed: Vec::new(),
    };

    for &member_id in member_ids {
        let name = member_name(&mut tx, academy_id, member_id).await?;
        let progress = load_progress(&mut *tx, academy_id, member_id).await?;

        match ladder.target(progress.rank_id, direction) {
            Some(target) => {
                save_progress(&mut tx, academy_id, member_id, &progress.with_rank(Some(target.guid)))
                    .await?;
                outcome.succeeded.push(name);
            }
            None => outcome.failed.push(name),
        }
    }

    tx.commit().await?;

    info!(
        "{} {} member(s) in academy {}; {} could not be {}",
        capitalize(direction.past_tense()),
        outcome.succeeded.len(),
        academy_id,
        outcome.failed.len(),
        direction.past_tense()
    );

    Ok(outcome)
}

async fn member_name(conn: &mut SqliteConnection, academy_id: Uuid, member_id: Uuid) -> Result<String> {
    let name: Option<String> = sqlx::query_scalar(
        "SELECT first_name || ' ' || last_name FROM members WHERE guid = ? AND academy_id = ?",
    )
    .bind(member_id.to_string())
    .bind(academy_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    name.ok_or_else(|| Error::NotFound(format!("member {}", member_id)))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ranks::{add_ranks, RankInput};
    use crate::db::test_support::{add_member, setup};
    use acagia_common::RankStep;

    async fn ladder(pool: &SqlitePool, academy_id: Uuid) -> Vec<RankStep> {
        add_ranks(
            pool,
            academy_id,
            &[
                RankInput { name: "White".to_string(), rank_order: 1, days_required: 3 },
                RankInput { name: "Blue".to_string(), rank_order: 2, days_required: 5 },
            ],
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_promotion_list_requires_ranks() {
        let (pool, academy) = setup().await;
        add_member(&pool, &academy, "Ana", "Lee").await;
        match promotion_list(&pool, academy.guid).await {
            Err(Error::InvalidInput(msg)) => assert_eq!(msg, NO_RANKS_MESSAGE),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_promote_new_member_then_to_top() {
        let (pool, academy) = setup().await;
        let ranks = ladder(&pool, academy.guid).await;
        let ana = add_member(&pool, &academy, "Ana", "Lee").await;

        let first = promote_members(&pool, academy.guid, &[ana], Direction::Promote).await.unwrap();
        assert_eq!(first.succeeded, vec!["Ana Lee"]);

        let rank = get_member_rank(&pool, academy.guid, ana).await.unwrap();
        assert_eq!(rank.rank_id, Some(ranks[0].guid));
        assert_eq!(rank.days_left, 3);

        promote_members(&pool, academy.guid, &[ana], Direction::Promote).await.unwrap();
        let top = promote_members(&pool, academy.guid, &[ana], Direction::Promote).await.unwrap();
        assert!(top.succeeded.is_empty());
        assert_eq!(top.failed, vec!["Ana Lee"]);

        let rank = get_member_rank(&pool, academy.guid, ana).await.unwrap();
        assert_eq!(rank.rank_name.as_deref(), Some("Blue"));
    }

    #[tokio::test]
    async fn test_demote_first_rank_and_unranked_fail() {
        let (pool, academy) = setup().await;
        ladder(&pool, academy.guid).await;
        let ana = add_member(&pool, &academy, "Ana", "Lee").await;
        let bo = add_member(&pool, &academy, "Bo", "Kim").await;
        promote_members(&pool, academy.guid, &[ana], Direction::Promote).await.unwrap();

        let outcome = promote_members(&pool, academy.guid, &[ana, bo], Direction::Demote).await.unwrap();
        assert_eq!(outcome.operation, Direction::Demote);
        assert_eq!(outcome.failed, vec!["Ana Lee", "Bo Kim"]);
    }

    #[tokio::test]
    async fn test_promote_rejects_empty_selection_and_unknown_member() {
        let (pool, academy) = setup().await;
        ladder(&pool, academy.guid).await;

        match promote_members(&pool, academy.guid, &[], Direction::Promote).await {
            Err(Error::InvalidInput(msg)) => assert_eq!(msg, NO_SELECTION_MESSAGE),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            promote_members(&pool, academy.guid, &[Uuid::new_v4()], Direction::Promote).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_promotion_resets_days_but_keeps_total() {
        let (pool, academy) = setup().await;
        ladder(&pool, academy.guid).await;
        let ana = add_member(&pool, &academy, "Ana", "Lee").await;
        promote_members(&pool, academy.guid, &[ana], Direction::Promote).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        credit_days(&mut conn, academy.guid, ana, 4).await.unwrap();
        drop(conn);

        let entries = promotion_list(&pool, academy.guid).await.unwrap();
        assert_eq!(entries[0].days_left, Some(-1));
        assert!(entries[0].eligible);

        promote_members(&pool, academy.guid, &[ana], Direction::Promote).await.unwrap();
        let rank = get_member_rank(&pool, academy.guid, ana).await.unwrap();
        assert_eq!((rank.days_attended, rank.days_left, rank.total_days), (0, 5, 4));
    }

    #[tokio::test]
    async fn test_manual_update() {
        let (pool, academy) = setup().await;
        let ranks = ladder(&pool, academy.guid).await;
        let ana = add_member(&pool, &academy, "Ana", "Lee").await;

        let set_rank = MemberRankUpdate { rank_id: Some(Some(ranks[1].guid)), days_attended: None };
        let rank = update_member_rank(&pool, academy.guid, ana, &set_rank).await.unwrap();
        assert_eq!(rank.days_left, 5);

        let set_days = MemberRankUpdate { rank_id: None, days_attended: Some(2) };
        let rank = update_member_rank(&pool, academy.guid, ana, &set_days).await.unwrap();
        assert_eq!((rank.days_attended, rank.days_left, rank.total_days), (2, 3, 2));

        let clear = MemberRankUpdate { rank_id: Some(None), days_attended: None };
        let rank = update_member_rank(&pool, academy.guid, ana, &clear).await.unwrap();
        assert_eq!(rank.rank_id, None);
        assert_eq!((rank.days_attended, rank.days_left, rank.total_days), (0, 0, 2));

        let bad = MemberRankUpdate { rank_id: Some(Some(Uuid::new_v4())), days_attended: None };
        assert!(matches!(
            update_member_rank(&pool, academy.guid, ana, &bad).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_manual_days_bounded() {
        let (pool, academy) = setup().await;
        let ranks = ladder(&pool, academy.guid).await;
        let ana = add_member(&pool, &academy, "Ana", "Lee").await;

        let mut conn = pool.acquire().await.unwrap();
        credit_days(&mut conn, academy.guid, ana, 1).await.unwrap();
        drop(conn);
        let set_rank = MemberRankUpdate { rank_id: Some(Some(ranks[0].guid)), days_attended: None };
        update_member_rank(&pool, academy.guid, ana, &set_rank).await.unwrap();

        let huge = MemberRankUpdate { rank_id: None, days_attended: Some(i64::MAX) };
        assert!(matches!(
            update_member_rank(&pool, academy.guid, ana, &huge).await,
            Err(Error::InvalidInput(_))
        ));

        let rank = get_member_rank(&pool, academy.guid, ana).await.unwrap();
        assert_eq!((rank.days_attended, rank.days_left, rank.total_days), (0, 3, 1));

        let most = MemberRankUpdate { rank_id: None, days_attended: Some(MAX_DAYS) };
        let rank = update_member_rank(&pool, academy.guid, ana, &most).await.unwrap();
        assert_eq!(rank.total_days, MAX_DAYS + 1);
    }

    #[test]
    fn test_update_distinguishes_null_from_absent() {
        let absent: MemberRankUpdate = serde_json::from_str(r#"{"days_attended": 3}"#).unwrap();
        assert_eq!(absent.rank_id, None);
        let null: MemberRankUpdate = serde_json::from_str(r#"{"rank_id": null}"#).unwrap();
        assert_eq!(null.rank_id, Some(None));
    }
}
