use crate::domain::models::{
    win_rate, ComparisonRecord, Identity, Item, PersonalRankingRow, RankingRow, RankingsSummary,
};
use crate::error::VoteResult;
use crate::repository::{ComparisonLedger, ItemCatalog, PreferenceStore, RankStore};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Read-only projections of the rank table
pub struct RankingsReporter {
    ranks: Arc<dyn RankStore>,
    ledger: Arc<dyn ComparisonLedger>,
    catalog: Arc<dyn ItemCatalog>,
    preferences: Arc<dyn PreferenceStore>,
}

impl RankingsReporter {
    pub fn new(
        ranks: Arc<dyn RankStore>,
        ledger: Arc<dyn ComparisonLedger>,
        catalog: Arc<dyn ItemCatalog>,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Self {
        Self {
            ranks,
            ledger,
            catalog,
            preferences,
        }
    }

    async fn texts(&self, ids: &[Uuid]) -> VoteResult<HashMap<Uuid, String>> {
        let items = self.catalog.items_by_ids(ids).await?;
        Ok(items
            .into_iter()
            .map(|Item { id, text }| (id, text))
            .collect())
    }

    fn text_for(texts: &HashMap<Uuid, String>, id: Uuid) -> String {
        match texts.get(&id) {
            Some(text) => text.clone(),
            None => {
                warn!(item_id = %id, "Ranked card missing from catalog");
                String::new()
            }
        }
    }

    /// Every ranked item, ascending by rank
    pub async fn list_rankings(&self) -> VoteResult<Vec<RankingRow>> {
        let entries = self.ranks.list_entries().await?;
        let ids: Vec<Uuid> = entries.iter().map(|e| e.item_id).collect();
        let texts = self.texts(&ids).await?;

        Ok(entries
            .into_iter()
            .map(|entry| RankingRow {
                item_id: entry.item_id,
                item_text: Self::text_for(&texts, entry.item_id),
                rank: entry.rank,
                wins: entry.wins,
                total_comparisons: entry.total_comparisons,
                win_rate: entry.win_rate(),
            })
            .collect())
    }

    /// Rankings plus aggregate counters
    pub async fn summary(&self) -> VoteResult<RankingsSummary> {
        let rankings = self.list_rankings().await?;
        let total_comparisons = self.ledger.comparison_count().await?;

        let total_items = rankings.len() as i64;
        let compared: i64 = rankings.iter().map(|r| r.total_comparisons as i64).sum();
        let average_comparisons_per_item = if total_items > 0 {
            (compared as f64 / total_items as f64 * 10.0).round() / 10.0
        } else {
            0.0
        };

        Ok(RankingsSummary {
            rankings,
            total_items,
            total_comparisons,
            average_comparisons_per_item,
        })
    }

    /// The identity's preferred items with the stats of those it actually compared
    pub async fn personal_rankings(&self, identity: &Identity) -> VoteResult<Vec<PersonalRankingRow>> {
        let preferred = self.preferences.preferred_items(identity).await?;
        let ids: Vec<Uuid> = preferred.iter().map(|p| p.item_id).collect();

        let compared = self.ledger.items_compared_by(identity).await?;
        let entries: HashMap<Uuid, _> = self
            .ranks
            .entries_for(&ids)
            .await?
            .into_iter()
            .map(|e| (e.item_id, e))
            .collect();
        let texts = self.texts(&ids).await?;

        let mut rows: Vec<PersonalRankingRow> = preferred
            .into_iter()
            .map(|mark| {
                let item_text = Self::text_for(&texts, mark.item_id);
                match entries.get(&mark.item_id) {
                    Some(entry) if compared.contains(&mark.item_id) => PersonalRankingRow {
                        item_id: mark.item_id,
                        item_text,
                        rank: Some(entry.rank),
                        wins: entry.wins,
                        total_comparisons: entry.total_comparisons,
                        win_rate: win_rate(entry.wins, entry.total_comparisons),
                        marked_at: mark.marked_at,
                    },
                    _ => PersonalRankingRow {
                        item_id: mark.item_id,
                        item_text,
                        rank: None,
                        wins: 0,
                        total_comparisons: 0,
                        win_rate: 0,
                        marked_at: mark.marked_at,
                    },
                }
            })
            .collect();

        rows.sort_by(personal_order);
        Ok(rows)
    }

    /// Newest comparisons first
    pub async fn recent_comparisons(&self, limit: i64) -> VoteResult<Vec<ComparisonRecord>> {
        self.ledger.recent_comparisons(limit).await
    }
}

/// Win rate when both rows have been compared, then comparison count, then recency
pub fn personal_order(a: &PersonalRankingRow, b: &PersonalRankingRow) -> Ordering {
    let by_win_rate = if a.total_comparisons > 0 && b.total_comparisons > 0 {
        b.win_rate.cmp(&a.win_rate)
    } else {
        Ordering::Equal
    };

    by_win_rate
        .then_with(|| b.total_comparisons.cmp(&a.total_comparisons))
        .then_with(|| b.marked_at.cmp(&a.marked_at))
}
