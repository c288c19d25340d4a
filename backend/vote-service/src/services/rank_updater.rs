// ============================================
// Rank Updater
// ============================================
//
// Turns a winner/loser outcome into a move on the dense rank table:
//
//   neither ranked        -> append W, then L, at the bottom
//   W new, L ranked       -> W takes L's rank, everything from there moves down
//   L new, W ranked       -> L slots in right below W
//   both, W behind L      -> W jumps to L's rank, [L.rank, W.rank) moves down
//   both, W ahead of L    -> ranks unchanged, stats only
//
// The planner is pure; stores apply the plan and append the ledger record
// inside one atomic unit.

use crate::domain::models::{Identity, RankChange, RankEntry, SubmitOutcome};
use crate::error::{VoteError, VoteResult};
use crate::repository::{ItemCatalog, RankStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Decide how an outcome moves the table.
///
/// `table_len` is the number of ranked entries before the outcome.
pub fn plan_outcome(
    winner: Option<&RankEntry>,
    loser: Option<&RankEntry>,
    table_len: i32,
) -> RankChange {
    match (winner, loser) {
        (None, None) => RankChange::AppendBoth {
            winner_rank: table_len + 1,
            loser_rank: table_len + 2,
        },
        (None, Some(loser)) => RankChange::InsertWinner { at: loser.rank },
        (Some(winner), None) => RankChange::InsertLoser {
            at: winner.rank + 1,
        },
        (Some(winner), Some(loser)) if winner.rank > loser.rank => RankChange::Promote {
            from: winner.rank,
            to: loser.rank,
        },
        (Some(_), Some(_)) => RankChange::Confirm,
    }
}

/// Validates votes and hands them to the rank store
pub struct RankUpdater {
    ranks: Arc<dyn RankStore>,
    catalog: Arc<dyn ItemCatalog>,
}

impl RankUpdater {
    pub fn new(ranks: Arc<dyn RankStore>, catalog: Arc<dyn ItemCatalog>) -> Self {
        Self { ranks, catalog }
    }

    /// Record that `winner_id` beat `loser_id`
    pub async fn submit_outcome(
        &self,
        voter: Option<&Identity>,
        winner_id: Uuid,
        loser_id: Uuid,
    ) -> VoteResult<SubmitOutcome> {
        if winner_id == loser_id {
            return Err(VoteError::InvalidArgument(
                "winnerId and loserId must differ".to_string(),
            ));
        }
        if winner_id.is_nil() || loser_id.is_nil() {
            return Err(VoteError::InvalidArgument(
                "winnerId and loserId are required".to_string(),
            ));
        }

        let known = self.catalog.items_by_ids(&[winner_id, loser_id]).await?;
        for id in [winner_id, loser_id] {
            if !known.iter().any(|item| item.id == id) {
                return Err(VoteError::NotFound(format!("card {}", id)));
            }
        }

        debug!(winner = %winner_id, loser = %loser_id, "Applying vote outcome");

        let outcome = self
            .ranks
            .apply_outcome(winner_id, loser_id, voter.cloned(), Utc::now())
            .await?;

        info!(
            winner = %winner_id,
            loser = %loser_id,
            change = outcome.change.as_str(),
            winner_rank = outcome.winner.rank,
            loser_rank = outcome.loser.rank,
            "Vote recorded"
        );

        Ok(outcome)
    }
}
