use super::{ComparisonLedger, ItemCatalog, PreferenceStore, RankStore};
use crate::domain::models::{
    ComparisonRecord, Identity, Item, PreferredItem, RankChange, RankEntry, SubmitOutcome,
    SwipeDirection,
};
use crate::error::{VoteError, VoteResult};
use crate::services::rank_updater::plan_outcome;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Rank arena: `order[i]` holds the item at rank `i + 1`.
#[derive(Debug, Default, Clone)]
pub struct RankTable {
    order: Vec<Uuid>,
    entries: HashMap<Uuid, RankEntry>,
}

fn position(rank: i32) -> usize {
    (rank - 1).max(0) as usize
}

impl RankTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, item_id: &Uuid) -> Option<&RankEntry> {
        self.entries.get(item_id)
    }

    /// Entries ascending by rank
    pub fn entries(&self) -> Vec<RankEntry> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).cloned())
            .collect()
    }

    /// Ranks are exactly 1..=N, one entry each, and no entry has more wins than comparisons
    pub fn is_dense(&self) -> bool {
        self.order.len() == self.entries.len()
            && self.order.iter().enumerate().all(|(idx, id)| {
                self.entries
                    .get(id)
                    .map(|e| e.rank == idx as i32 + 1 && e.wins <= e.total_comparisons)
                    .unwrap_or(false)
            })
    }

    /// Apply one outcome and return both entries afterwards.
    ///
    /// The table is untouched when the outcome is rejected.
    pub fn apply(
        &mut self,
        winner_id: Uuid,
        loser_id: Uuid,
        now: DateTime<Utc>,
    ) -> VoteResult<SubmitOutcome> {
        if winner_id == loser_id {
            return Err(VoteError::InvalidArgument(
                "winner and loser must be different items".to_string(),
            ));
        }

        let change = plan_outcome(
            self.entries.get(&winner_id),
            self.entries.get(&loser_id),
            self.order.len() as i32,
        );

        match change {
            RankChange::AppendBoth {
                winner_rank,
                loser_rank,
            } => {
                self.order.push(winner_id);
                self.order.push(loser_id);
                self.entries.insert(
                    winner_id,
                    RankEntry::first_comparison(winner_id, winner_rank, true, now),
                );
                self.entries.insert(
                    loser_id,
                    RankEntry::first_comparison(loser_id, loser_rank, false, now),
                );
            }
            RankChange::InsertWinner { at } => {
                self.order.insert(position(at), winner_id);
                self.entries
                    .insert(winner_id, RankEntry::first_comparison(winner_id, at, true, now));
                self.renumber(position(at) + 1, self.order.len(), now);
                self.credit(loser_id, false, now);
            }
            RankChange::InsertLoser { at } => {
                self.order.insert(position(at), loser_id);
                self.entries
                    .insert(loser_id, RankEntry::first_comparison(loser_id, at, false, now));
                self.renumber(position(at) + 1, self.order.len(), now);
                self.credit(winner_id, true, now);
            }
            RankChange::Promote { from, to } => {
                let moved = self.order.remove(position(from));
                self.order.insert(position(to), moved);
                self.renumber(position(to), position(from) + 1, now);
                self.credit(winner_id, true, now);
                self.credit(loser_id, false, now);
            }
            RankChange::Confirm => {
                self.credit(winner_id, true, now);
                self.credit(loser_id, false, now);
            }
        }

        debug_assert!(self.is_dense());

        Ok(SubmitOutcome {
            winner: self.entries[&winner_id].clone(),
            loser: self.entries[&loser_id].clone(),
            change,
        })
    }

    /// Re-derive ranks for positions `[start, end)` from their place in `order`
    fn renumber(&mut self, start: usize, end: usize, now: DateTime<Utc>) {
        for idx in start..end.min(self.order.len()) {
            let rank = idx as i32 + 1;
            if let Some(entry) = self.entries.get_mut(&self.order[idx]) {
                if entry.rank != rank {
                    entry.rank = rank;
                    entry.version += 1;
                    entry.updated_at = now;
                }
            }
        }
    }

    fn credit(&mut self, item_id: Uuid, won: bool, now: DateTime<Utc>) {
        if let Some(entry) = self.entries.get_mut(&item_id) {
            entry.total_comparisons += 1;
            if won {
                entry.wins += 1;
            }
            entry.version += 1;
            entry.updated_at = now;
        }
    }
}

#[derive(Debug, Clone)]
struct SwipeMark {
    identity: Identity,
    item_id: Uuid,
    direction: SwipeDirection,
    marked_at: DateTime<Utc>,
}

/// `marker` is `owner` itself, or a session linked to the user `owner`
fn belongs_to(owner: &Identity, marker: &Identity, sessions: &HashMap<String, Uuid>) -> bool {
    match (owner, marker) {
        (Identity::User(user), Identity::Session(session)) => sessions.get(session) == Some(user),
        (owner, marker) => owner == marker,
    }
}

/// Ranks and ledger share one lock so an outcome lands as a unit
#[derive(Debug, Default)]
struct VoteState {
    table: RankTable,
    ledger: Vec<ComparisonRecord>,
}

/// Process-local implementation of every store trait.
///
/// Used by the test-suite and by callers embedding the engine without PostgreSQL.
#[derive(Debug, Default)]
pub struct InMemoryVoteStore {
    cards: RwLock<HashMap<Uuid, Item>>,
    swipes: RwLock<Vec<SwipeMark>>,
    sessions: RwLock<HashMap<String, Uuid>>,
    state: RwLock<VoteState>,
}

impl InMemoryVoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a card and return its id
    pub async fn add_card(&self, text: &str) -> Uuid {
        let item = Item {
            id: Uuid::new_v4(),
            text: text.to_string(),
        };
        let id = item.id;
        self.cards.write().await.insert(id, item);
        id
    }

    pub async fn record_swipe(&self, identity: Identity, item_id: Uuid, direction: SwipeDirection) {
        self.swipes.write().await.push(SwipeMark {
            identity,
            item_id,
            direction,
            marked_at: Utc::now(),
        });
    }

    pub async fn link_session(&self, session_id: &str, user_id: Uuid) {
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), user_id);
    }

    /// Copy of the rank table, for invariant checks
    pub async fn snapshot(&self) -> RankTable {
        self.state.read().await.table.clone()
    }
}

#[async_trait::async_trait]
impl PreferenceStore for InMemoryVoteStore {
    async fn resolve_identity(&self, identity: &Identity) -> VoteResult<Identity> {
        if let Identity::Session(session_id) = identity {
            if let Some(user_id) = self.sessions.read().await.get(session_id) {
                return Ok(Identity::User(*user_id));
            }
        }
        Ok(identity.clone())
    }

    async fn preferred_items(&self, identity: &Identity) -> VoteResult<Vec<PreferredItem>> {
        let resolved = self.resolve_identity(identity).await?;
        let sessions = self.sessions.read().await;

        // Later marks override earlier ones for the same card
        let swipes = self.swipes.read().await;
        let mut latest: HashMap<Uuid, (usize, &SwipeMark)> = HashMap::new();
        for (seq, mark) in swipes
            .iter()
            .enumerate()
            .filter(|(_, m)| belongs_to(&resolved, &m.identity, &sessions))
        {
            latest.insert(mark.item_id, (seq, mark));
        }

        let mut preferred: Vec<(usize, &SwipeMark)> = latest
            .into_values()
            .filter(|(_, mark)| mark.direction == SwipeDirection::Preferred)
            .collect();
        preferred.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(preferred
            .into_iter()
            .map(|(_, mark)| PreferredItem {
                item_id: mark.item_id,
                marked_at: mark.marked_at,
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl ItemCatalog for InMemoryVoteStore {
    async fn items_by_ids(&self, ids: &[Uuid]) -> VoteResult<Vec<Item>> {
        let cards = self.cards.read().await;
        Ok(ids.iter().filter_map(|id| cards.get(id).cloned()).collect())
    }
}

#[async_trait::async_trait]
impl RankStore for InMemoryVoteStore {
    async fn entries_for(&self, item_ids: &[Uuid]) -> VoteResult<Vec<RankEntry>> {
        let state = self.state.read().await;
        Ok(item_ids
            .iter()
            .filter_map(|id| state.table.get(id).cloned())
            .collect())
    }

    async fn list_entries(&self) -> VoteResult<Vec<RankEntry>> {
        Ok(self.state.read().await.table.entries())
    }

    async fn apply_outcome(
        &self,
        winner_id: Uuid,
        loser_id: Uuid,
        voter: Option<Identity>,
        now: DateTime<Utc>,
    ) -> VoteResult<SubmitOutcome> {
        let mut state = self.state.write().await;
        let outcome = state.table.apply(winner_id, loser_id, now)?;
        state
            .ledger
            .push(ComparisonRecord::new(winner_id, loser_id, voter, now));
        Ok(outcome)
    }
}

#[async_trait::async_trait]
impl ComparisonLedger for InMemoryVoteStore {
    async fn comparison_count(&self) -> VoteResult<i64> {
        Ok(self.state.read().await.ledger.len() as i64)
    }

    async fn recent_comparisons(&self, limit: i64) -> VoteResult<Vec<ComparisonRecord>> {
        let state = self.state.read().await;
        Ok(state
            .ledger
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn items_compared_by(&self, voter: &Identity) -> VoteResult<HashSet<Uuid>> {
        let resolved = self.resolve_identity(voter).await?;
        let sessions = self.sessions.read().await;
        let state = self.state.read().await;
        Ok(state
            .ledger
            .iter()
            .filter(|record| {
                record
                    .voter
                    .as_ref()
                    .is_some_and(|v| belongs_to(&resolved, v, &sessions))
            })
            .flat_map(|record| [record.winner_id, record.loser_id])
            .collect())
    }
}
