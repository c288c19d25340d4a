use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Who a preference or a vote belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Identity {
    User(Uuid),
    Session(String),
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::User(id) => write!(f, "user:{}", id),
            Identity::Session(id) => write!(f, "session:{}", id),
        }
    }
}

/// Card shown to the voter (owned by the item catalog)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Item {
    pub id: Uuid,
    pub text: String,
}

/// Direction of a swipe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwipeDirection {
    Preferred,
    Rejected,
}

impl SwipeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwipeDirection::Preferred => "preferred",
            SwipeDirection::Rejected => "rejected",
        }
    }
}

/// Item the identity marked as preferred, with the time of the most recent mark
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PreferredItem {
    pub item_id: Uuid,
    pub marked_at: DateTime<Utc>,
}

/// Ranked position of a single item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RankEntry {
    pub item_id: Uuid,
    pub rank: i32,
    pub wins: i32,
    pub total_comparisons: i32,
    /// Bumped on every write of this entry
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl RankEntry {
    /// Fresh entry for an item entering the ranking through its first comparison
    pub fn first_comparison(item_id: Uuid, rank: i32, won: bool, now: DateTime<Utc>) -> Self {
        Self {
            item_id,
            rank,
            wins: i32::from(won),
            total_comparisons: 1,
            version: 1,
            updated_at: now,
        }
    }

    pub fn win_rate(&self) -> i32 {
        win_rate(self.wins, self.total_comparisons)
    }
}

/// `round(100 * wins / total)`, or 0 when the item was never compared
pub fn win_rate(wins: i32, total_comparisons: i32) -> i32 {
    if total_comparisons > 0 {
        (100.0 * wins as f64 / total_comparisons as f64).round() as i32
    } else {
        0
    }
}

/// One submitted vote. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRecord {
    pub id: Uuid,
    pub winner_id: Uuid,
    pub loser_id: Uuid,
    pub voter: Option<Identity>,
    pub created_at: DateTime<Utc>,
}

impl ComparisonRecord {
    pub fn new(winner_id: Uuid, loser_id: Uuid, voter: Option<Identity>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            winner_id,
            loser_id,
            voter,
            created_at: now,
        }
    }
}

// ============================================================================
// Pair selection
// ============================================================================

/// Why a given pair was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Nothing preferred is ranked yet
    Initial,
    /// Merging an unranked item into the existing order
    Ranking { current_rank: i32 },
    /// Everything preferred is ranked; re-testing an arbitrary pair
    Refinement { rank1: i32, rank2: i32 },
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Initial => "initial",
            Scenario::Ranking { .. } => "ranking",
            Scenario::Refinement { .. } => "refinement",
        }
    }

    /// Informational ranks attached to the scenario
    pub fn extra(&self) -> Option<serde_json::Value> {
        match self {
            Scenario::Initial => None,
            Scenario::Ranking { current_rank } => {
                Some(serde_json::json!({ "currentRank": current_rank }))
            }
            Scenario::Refinement { rank1, rank2 } => {
                Some(serde_json::json!({ "rank1": rank1, "rank2": rank2 }))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairItem {
    pub id: Uuid,
    pub text: String,
}

/// Two distinct items to compare next
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairSelection {
    pub item_a: PairItem,
    pub item_b: PairItem,
    pub scenario: Scenario,
}

// ============================================================================
// Rank updates
// ============================================================================

/// How an outcome moves the rank table.
///
/// Stats are implied: the winner always gains a win and a comparison, the
/// loser always gains a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RankChange {
    /// Neither item was ranked; both are appended at the bottom
    AppendBoth { winner_rank: i32, loser_rank: i32 },
    /// Winner enters at the loser's old rank; `rank >= at` moves down one
    InsertWinner { at: i32 },
    /// Loser enters right below the winner; `rank >= at` moves down one
    InsertLoser { at: i32 },
    /// Winner jumps from `from` to `to`; `to <= rank < from` moves down one
    Promote { from: i32, to: i32 },
    /// Winner already ahead of the loser; ranks unchanged
    Confirm,
}

impl RankChange {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankChange::AppendBoth { .. } => "append_both",
            RankChange::InsertWinner { .. } => "insert_winner",
            RankChange::InsertLoser { .. } => "insert_loser",
            RankChange::Promote { .. } => "promote",
            RankChange::Confirm => "confirm",
        }
    }
}

/// Entries of both items after an outcome was applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub winner: RankEntry,
    pub loser: RankEntry,
    pub change: RankChange,
}

// ============================================================================
// Reporting
// ============================================================================

/// Rank entry decorated for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingRow {
    pub item_id: Uuid,
    pub item_text: String,
    pub rank: i32,
    pub wins: i32,
    pub total_comparisons: i32,
    pub win_rate: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingsSummary {
    pub rankings: Vec<RankingRow>,
    pub total_items: i64,
    pub total_comparisons: i64,
    pub average_comparisons_per_item: f64,
}

/// Preferred item as seen by one identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalRankingRow {
    pub item_id: Uuid,
    pub item_text: String,
    /// Global rank, absent when the identity never compared this item
    pub rank: Option<i32>,
    pub wins: i32,
    pub total_comparisons: i32,
    pub win_rate: i32,
    pub marked_at: DateTime<Utc>,
}
