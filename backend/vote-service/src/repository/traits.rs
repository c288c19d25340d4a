use crate::domain::models::{
    ComparisonRecord, Identity, Item, PreferredItem, RankEntry, SubmitOutcome,
};
use crate::error::VoteResult;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

/// Read-only view of swipe history.
#[async_trait::async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Collapse a session onto the user it belongs to, if any
    async fn resolve_identity(&self, identity: &Identity) -> VoteResult<Identity>;

    /// Deduplicated preferred items, most recently marked first.
    /// A user identity merges the marks of every session linked to that user.
    async fn preferred_items(&self, identity: &Identity) -> VoteResult<Vec<PreferredItem>>;
}

/// Read-only card lookup
#[async_trait::async_trait]
pub trait ItemCatalog: Send + Sync {
    /// Items for the given ids; unknown ids are silently absent from the result
    async fn items_by_ids(&self, ids: &[Uuid]) -> VoteResult<Vec<Item>>;

    /// Display text for one item, `None` when the item does not exist
    async fn item_text(&self, id: Uuid) -> VoteResult<Option<String>> {
        let items = self.items_by_ids(&[id]).await?;
        Ok(items.into_iter().next().map(|item| item.text))
    }
}

/// Dense rank table plus the write path that also feeds the comparison ledger.
#[async_trait::async_trait]
pub trait RankStore: Send + Sync {
    /// Entries for whichever of `item_ids` are ranked
    async fn entries_for(&self, item_ids: &[Uuid]) -> VoteResult<Vec<RankEntry>>;

    /// All entries, ascending by rank
    async fn list_entries(&self) -> VoteResult<Vec<RankEntry>>;

    /// Apply one outcome atomically: rank moves, stat updates and the ledger
    /// append either all happen or none do.
    async fn apply_outcome(
        &self,
        winner_id: Uuid,
        loser_id: Uuid,
        voter: Option<Identity>,
        now: DateTime<Utc>,
    ) -> VoteResult<SubmitOutcome>;
}

/// Append-only comparison log (writes go through `RankStore::apply_outcome`)
#[async_trait::async_trait]
pub trait ComparisonLedger: Send + Sync {
    async fn comparison_count(&self) -> VoteResult<i64>;

    /// Newest first
    async fn recent_comparisons(&self, limit: i64) -> VoteResult<Vec<ComparisonRecord>>;

    /// Every item the voter has put into at least one comparison
    async fn items_compared_by(&self, voter: &Identity) -> VoteResult<HashSet<Uuid>>;
}
