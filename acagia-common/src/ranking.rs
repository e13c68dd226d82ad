//! Rank promotion engine
//!
//! Each academy defines its own ladder of ranks ordered by `rank_order`.
//! A member's standing is a [`RankProgress`]: the current rank (or none for a
//! brand new member) plus three counters:
//!
//! - `days_attended`: attendance days credited at the current rank
//! - `days_left`: days still required before the member is due for promotion
//!   (zero or negative once the requirement is met)
//! - `total_days`: lifetime attendance days, never reset by rank changes
//!
//! Everything here is pure. Persistence goes through [`reconcile`], which is
//! applied to every save of a member's progress so that counters stay
//! consistent no matter whether the change came from a check-in, an event
//! credit, a promotion or a manual edit.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Upper bound for any single day count accepted from a request
///
/// Applies to `days_required`, a manual `days_attended` and an event's
/// `credit_days`. Keeps every counter far away from `i64` limits.
pub const MAX_DAYS: i64 = 100_000;

/// One rank (belt) in an academy's ladder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankStep {
    pub guid: Uuid,
    pub name: String,
    pub rank_order: i64,
    pub days_required: i64,
}

/// A member's current rank and attendance counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankProgress {
    pub rank_id: Option<Uuid>,
    pub days_attended: i64,
    pub days_left: i64,
    pub total_days: i64,
}

impl RankProgress {
    /// Progress of a member who has not been given a rank yet
    pub fn unranked() -> Self {
        Self::default()
    }

    /// Copy with a different rank; counters are fixed up by [`reconcile`]
    pub fn with_rank(&self, rank_id: Option<Uuid>) -> Self {
        Self { rank_id, ..*self }
    }

    /// Copy with a different `days_attended`; fixed up by [`reconcile`]
    pub fn with_days_attended(&self, days_attended: i64) -> Self {
        Self {
            days_attended,
            ..*self
        }
    }
}

/// Promotion direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Promote,
    Demote,
}

impl Direction {
    /// Past tense, for messages ("promoted", "demoted")
    pub fn past_tense(&self) -> &'static str {
        match self {
            Direction::Promote => "promoted",
            Direction::Demote => "demoted",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Promote => write!(f, "promote"),
            Direction::Demote => write!(f, "demote"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "promote" => Ok(Direction::Promote),
            "demote" => Ok(Direction::Demote),
            other => Err(format!("Unknown direction: {}", other)),
        }
    }
}

/// One row of the promotion list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromotionEntry {
    pub member_id: Uuid,
    pub member_name: String,
    /// True when the member has no rank yet
    pub new_member: bool,
    pub previous: Option<RankStep>,
    pub current: Option<RankStep>,
    pub next: Option<RankStep>,
    /// Days left before the next rank; `None` for new members and members
    /// already at the top of the ladder
    pub days_left: Option<i64>,
    /// Requirement met and a higher rank exists
    pub eligible: bool,
}

/// An academy's ranks in ascending `rank_order`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankLadder {
    steps: Vec<RankStep>,
}

impl RankLadder {
    pub fn new(mut steps: Vec<RankStep>) -> Self {
        steps.sort_by_key(|s| s.rank_order);
        Self { steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn steps(&self) -> &[RankStep] {
        &self.steps
    }

    pub fn first(&self) -> Option<&RankStep> {
        self.steps.first()
    }

    pub fn last(&self) -> Option<&RankStep> {
        self.steps.last()
    }

    pub fn get(&self, guid: Uuid) -> Option<&RankStep> {
        self.steps.iter().find(|s| s.guid == guid)
    }

    /// Highest rank whose order is below `rank_order`
    pub fn previous_of(&self, rank_order: i64) -> Option<&RankStep> {
        self.steps.iter().rev().find(|s| s.rank_order < rank_order)
    }

    /// Lowest rank whose order is above `rank_order`
    pub fn next_of(&self, rank_order: i64) -> Option<&RankStep> {
        self.steps.iter().find(|s| s.rank_order > rank_order)
    }

    /// Rank a member moves to, or `None` when the move is impossible
    ///
    /// A member without a rank can only be promoted, onto the first rank.
    pub fn target(&self, current: Option<Uuid>, direction: Direction) -> Option<&RankStep> {
        match (current.and_then(|id| self.get(id)), direction) {
            (None, Direction::Promote) => self.first(),
            (None, Direction::Demote) => None,
            (Some(rank), Direction::Promote) => self.next_of(rank.rank_order),
            (Some(rank), Direction::Demote) => self.previous_of(rank.rank_order),
        }
    }

    /// Build the promotion-list row for one member
    pub fn entry_for(
        &self,
        member_id: Uuid,
        member_name: impl Into<String>,
        progress: &RankProgress,
    ) -> PromotionEntry {
        let member_name = member_name.into();

        let current = match progress.rank_id.and_then(|id| self.get(id)) {
            Some(rank) => rank,
            None => {
                return PromotionEntry {
                    member_id,
                    member_name,
                    new_member: true,
                    previous: None,
                    current: None,
                    next: self.first().cloned(),
                    days_left: None,
                    eligible: false,
                }
            }
        };

        let previous = self.previous_of(current.rank_order).cloned();
        let next = self.next_of(current.rank_order).cloned();
        let days_left = next.as_ref().map(|_| progress.days_left);

        PromotionEntry {
            member_id,
            member_name,
            new_member: false,
            previous,
            current: Some(current.clone()),
            next,
            days_left,
            eligible: days_left.is_some_and(|d| d <= 0),
        }
    }
}

/// Reconcile counters when a member's progress is saved
///
/// `previous` is the stored row, `edited` the row about to be written and
/// `days_required` the requirement of `edited.rank_id` (only consulted when the
/// rank changed).
///
/// - Rank changed: the per-rank counters restart (`days_attended = 0`,
///   `days_left = days_required`, or 0 without a rank). `total_days` is kept.
/// - `days_attended` changed by `delta`: `days_left` moves by `-delta` and
///   `total_days` by `+delta`. Unranked members keep `days_left = 0`.
/// - Otherwise the stored row wins; counters are never edited directly.
pub fn reconcile(
    previous: &RankProgress,
    edited: &RankProgress,
    days_required: i64,
) -> Result<RankProgress> {
    if edited.rank_id != previous.rank_id {
        return Ok(RankProgress {
            rank_id: edited.rank_id,
            days_attended: 0,
            days_left: if edited.rank_id.is_some() { days_required } else { 0 },
            total_days: previous.total_days,
        });
    }

    if edited.days_attended != previous.days_attended {
        let delta = checked(edited.days_attended.checked_sub(previous.days_attended))?;
        let days_left = if previous.rank_id.is_some() {
            checked(previous.days_left.checked_sub(delta))?
        } else {
            0
        };
        return Ok(RankProgress {
            rank_id: previous.rank_id,
            days_attended: edited.days_attended,
            days_left,
            total_days: checked(previous.total_days.checked_add(delta))?,
        });
    }

    Ok(*previous)
}

/// Credit (positive) or revoke (negative) attendance days
///
/// `days_attended` never drops below zero; only the portion actually removed
/// is taken off `total_days`.
pub fn apply_credit(progress: &RankProgress, delta: i64) -> Result<RankProgress> {
    let days_attended = checked(progress.days_attended.checked_add(delta))?.max(0);
    reconcile(progress, &progress.with_days_attended(days_attended), 0)
}

/// Recompute `days_left` after the current rank's `days_required` changed
pub fn rederive_days_left(progress: &RankProgress, days_required: i64) -> Result<RankProgress> {
    if progress.rank_id.is_none() {
        return Ok(*progress);
    }
    Ok(RankProgress {
        days_left: checked(days_required.checked_sub(progress.days_attended))?,
        ..*progress
    })
}

fn checked(value: Option<i64>) -> Result<i64> {
    value.ok_or_else(|| Error::InvalidInput("Attendance day counter out of range".to_string()))
}

/// First `rank_order` that appears more than once, if any
pub fn find_duplicate_order(orders: impl IntoIterator<Item = i64>) -> Option<i64> {
    let mut seen = HashSet::new();
    orders.into_iter().find(|order| !seen.insert(*order))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(name: &str, rank_order: i64, days_required: i64) -> RankStep {
        RankStep {
            guid: Uuid::new_v4(),
            name: name.to_string(),
            rank_order,
            days_required,
        }
    }

    /// White(1, 30) < Blue(2, 60) < Purple(5, 90), inserted out of order
    fn bjj_ladder() -> RankLadder {
        RankLadder::new(vec![
            step("Purple", 5, 90),
            step("White", 1, 30),
            step("Blue", 2, 60),
        ])
    }

    fn on_rank(rank: &RankStep, days_attended: i64, total_days: i64) -> RankProgress {
        RankProgress {
            rank_id: Some(rank.guid),
            days_attended,
            days_left: rank.days_required - days_attended,
            total_days,
        }
    }

    #[test]
    fn test_ladder_sorted_by_order() {
        let ladder = bjj_ladder();
        let names: Vec<&str> = ladder.steps().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["White", "Blue", "Purple"]);
        assert_eq!(ladder.first().unwrap().name, "White");
        assert_eq!(ladder.last().unwrap().name, "Purple");
    }

    #[test]
    fn test_neighbours_skip_gaps_in_order() {
        let ladder = bjj_ladder();
        assert_eq!(ladder.next_of(2).unwrap().name, "Purple");
        assert_eq!(ladder.previous_of(5).unwrap().name, "Blue");
        assert!(ladder.previous_of(1).is_none());
        assert!(ladder.next_of(5).is_none());
    }

    #[test]
    fn test_target_for_unranked_member() {
        let ladder = bjj_ladder();
        assert_eq!(ladder.target(None, Direction::Promote).unwrap().name, "White");
        assert!(ladder.target(None, Direction::Demote).is_none());
    }

    #[test]
    fn test_target_at_ladder_ends() {
        let ladder = bjj_ladder();
        let white = ladder.first().unwrap().guid;
        let purple = ladder.last().unwrap().guid;
        assert!(ladder.target(Some(white), Direction::Demote).is_none());
        assert_eq!(ladder.target(Some(white), Direction::Promote).unwrap().name, "Blue");
        assert!(ladder.target(Some(purple), Direction::Promote).is_none());
        assert_eq!(ladder.target(Some(purple), Direction::Demote).unwrap().name, "Blue");
    }

    #[test]
    fn test_target_on_empty_ladder() {
        let ladder = RankLadder::default();
        assert!(ladder.target(None, Direction::Promote).is_none());
    }

    #[test]
    fn test_entry_for_new_member() {
        let ladder = bjj_ladder();
        let entry = ladder.entry_for(Uuid::new_v4(), "Royce Gracie", &RankProgress::unranked());
        assert!(entry.new_member);
        assert!(entry.previous.is_none());
        assert!(entry.current.is_none());
        assert_eq!(entry.next.unwrap().name, "White");
        assert_eq!(entry.days_left, None);
        assert!(!entry.eligible);
    }

    #[test]
    fn test_entry_for_middle_rank() {
        let ladder = bjj_ladder();
        let blue = ladder.steps()[1].clone();
        let entry = ladder.entry_for(Uuid::new_v4(), "A B", &on_rank(&blue, 10, 40));
        assert_eq!(entry.previous.unwrap().name, "White");
        assert_eq!(entry.current.unwrap().name, "Blue");
        assert_eq!(entry.next.unwrap().name, "Purple");
        assert_eq!(entry.days_left, Some(50));
        assert!(!entry.eligible);
    }

    #[test]
    fn test_entry_for_top_rank_hides_days_left() {
        let ladder = bjj_ladder();
        let purple = ladder.last().unwrap().clone();
        let entry = ladder.entry_for(Uuid::new_v4(), "A B", &on_rank(&purple, 100, 300));
        assert!(entry.next.is_none());
        assert_eq!(entry.days_left, None);
        assert!(!entry.eligible);
    }

    #[test]
    fn test_entry_for_single_rank_ladder() {
        let only = step("Novice", 1, 10);
        let ladder = RankLadder::new(vec![only.clone()]);
        let entry = ladder.entry_for(Uuid::new_v4(), "A B", &on_rank(&only, 3, 3));
        assert!(entry.previous.is_none());
        assert!(entry.next.is_none());
        assert_eq!(entry.current.unwrap().name, "Novice");
    }

    #[test]
    fn test_entry_eligible_when_requirement_met() {
        let ladder = bjj_ladder();
        let white = ladder.first().unwrap().clone();
        let entry = ladder.entry_for(Uuid::new_v4(), "A B", &on_rank(&white, 31, 31));
        assert_eq!(entry.days_left, Some(-1));
        assert!(entry.eligible);
    }

    #[test]
    fn test_reconcile_rank_change_resets_counters() {
        let ladder = bjj_ladder();
        let white = ladder.first().unwrap().clone();
        let blue = ladder.steps()[1].clone();
        let before = on_rank(&white, 25, 70);

        let after = reconcile(&before, &before.with_rank(Some(blue.guid)), blue.days_required).unwrap();

        assert_eq!(after.rank_id, Some(blue.guid));
        assert_eq!(after.days_attended, 0);
        assert_eq!(after.days_left, 60);
        assert_eq!(after.total_days, 70);
    }

    #[test]
    fn test_reconcile_rank_removed() {
        let ladder = bjj_ladder();
        let white = ladder.first().unwrap().clone();
        let before = on_rank(&white, 5, 5);
        let after = reconcile(&before, &before.with_rank(None), 999).unwrap();
        assert_eq!(after, RankProgress { rank_id: None, days_attended: 0, days_left: 0, total_days: 5 });
    }

    #[test]
    fn test_reconcile_days_increase_and_decrease() {
        let ladder = bjj_ladder();
        let white = ladder.first().unwrap().clone();
        let before = on_rank(&white, 10, 40);

        let up = reconcile(&before, &before.with_days_attended(13), 0).unwrap();
        assert_eq!((up.days_attended, up.days_left, up.total_days), (13, 17, 43));

        let down = reconcile(&up, &up.with_days_attended(11), 0).unwrap();
        assert_eq!((down.days_attended, down.days_left, down.total_days), (11, 19, 41));
    }

    #[test]
    fn test_reconcile_ignores_direct_counter_edits() {
        let ladder = bjj_ladder();
        let white = ladder.first().unwrap().clone();
        let before = on_rank(&white, 10, 40);
        let tampered = RankProgress { days_left: 0, total_days: 999, ..before };
        assert_eq!(reconcile(&before, &tampered, 0).unwrap(), before);
    }

    #[test]
    fn test_credit_for_unranked_member_keeps_days_left_zero() {
        let after = apply_credit(&RankProgress::unranked(), 1).unwrap();
        assert_eq!(after, RankProgress { rank_id: None, days_attended: 1, days_left: 0, total_days: 1 });
    }

    #[test]
    fn test_revoke_saturates_at_zero() {
        let ladder = bjj_ladder();
        let white = ladder.first().unwrap().clone();
        let before = on_rank(&white, 2, 50);
        let after = apply_credit(&before, -5).unwrap();
        assert_eq!(after.days_attended, 0);
        assert_eq!(after.days_left, 30);
        assert_eq!(after.total_days, 48);
    }

    #[test]
    fn test_credit_then_revoke_is_identity() {
        let ladder = bjj_ladder();
        let blue = ladder.steps()[1].clone();
        let before = on_rank(&blue, 7, 90);
        assert_eq!(apply_credit(&apply_credit(&before, 3).unwrap(), -3).unwrap(), before);
    }

    #[test]
    fn test_total_days_never_below_days_attended() {
        let ladder = bjj_ladder();
        let white = ladder.first().unwrap().clone();
        let mut progress = RankProgress::unranked();
        for delta in [1, 1, 3, -2, -9, 4] {
            progress = apply_credit(&progress, delta).unwrap();
            assert!(progress.total_days >= progress.days_attended);
        }
        progress = reconcile(&progress, &progress.with_rank(Some(white.guid)), 30).unwrap();
        assert!(progress.total_days >= progress.days_attended);
    }

    #[test]
    fn test_rederive_days_left() {
        let ladder = bjj_ladder();
        let white = ladder.first().unwrap().clone();
        let progress = on_rank(&white, 12, 12);
        assert_eq!(rederive_days_left(&progress, 20).unwrap().days_left, 8);
        assert_eq!(rederive_days_left(&RankProgress::unranked(), 20).unwrap(), RankProgress::unranked());
    }

    #[test]
    fn test_counter_overflow_is_rejected() {
        let ladder = bjj_ladder();
        let white = ladder.first().unwrap().clone();
        // Rank just assigned: nothing attended yet, one lifetime day
        let progress = on_rank(&white, 0, 1);

        let edited = progress.with_days_attended(i64::MAX);
        assert!(matches!(reconcile(&progress, &edited, 0), Err(Error::InvalidInput(_))));
        assert!(matches!(apply_credit(&progress, i64::MAX), Err(Error::InvalidInput(_))));

        let deep = RankProgress { days_attended: 5, ..progress };
        assert!(matches!(rederive_days_left(&deep, i64::MIN), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_find_duplicate_order() {
        assert_eq!(find_duplicate_order([1, 2, 3]), None);
        assert_eq!(find_duplicate_order([1, 2, 1, 3]), Some(1));
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("Promote".parse::<Direction>().unwrap(), Direction::Promote);
        assert_eq!("demote".parse::<Direction>().unwrap(), Direction::Demote);
        assert!("sideways".parse::<Direction>().is_err());
        assert_eq!(Direction::Demote.past_tense(), "demoted");
    }
}
