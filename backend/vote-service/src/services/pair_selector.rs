// ============================================
// Pair Selector
// ============================================
//
// Picks the next two preferred items to compare:
//
//   initial     nothing preferred is ranked yet -> two unranked items
//   ranking     some ranked, some not           -> one unranked vs one ranked
//   refinement  everything preferred is ranked  -> two ranked items
//
// Candidate pools are uniform samples capped at `candidate_pool_size`,
// so the final pick stays uniform over the whole pool.

use crate::domain::models::{Identity, PairItem, PairSelection, RankEntry, Scenario};
use crate::error::{VoteError, VoteResult};
use crate::repository::{ItemCatalog, PreferenceStore, RankStore};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

/// Choose a pair and its scenario from already-loaded data.
///
/// `preferred` may contain duplicates; `ranked` may contain entries for items
/// outside `preferred`, which are ignored.
pub fn choose_pair<R: Rng + ?Sized>(
    preferred: &[Uuid],
    ranked: &[RankEntry],
    candidate_pool_size: usize,
    rng: &mut R,
) -> VoteResult<(Uuid, Uuid, Scenario)> {
    let mut seen = HashSet::with_capacity(preferred.len());
    let preferred: Vec<Uuid> = preferred
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect();

    if preferred.len() < 2 {
        return Err(VoteError::InsufficientPreferences {
            available: preferred.len(),
        });
    }

    let ranks: HashMap<Uuid, i32> = ranked.iter().map(|e| (e.item_id, e.rank)).collect();
    let (ranked_ids, unranked_ids): (Vec<Uuid>, Vec<Uuid>) =
        preferred.iter().copied().partition(|id| ranks.contains_key(id));

    let pool_size = candidate_pool_size.max(2);
    let unranked_pool: Vec<Uuid> = unranked_ids
        .choose_multiple(rng, pool_size)
        .copied()
        .collect();
    let ranked_pool: Vec<Uuid> = ranked_ids.choose_multiple(rng, pool_size).copied().collect();

    if ranked_pool.is_empty() {
        let picked: Vec<Uuid> = unranked_pool.choose_multiple(rng, 2).copied().collect();
        if let [a, b] = picked.as_slice() {
            return Ok((*a, *b, Scenario::Initial));
        }
    }

    if let (Some(&fresh), Some(&anchor)) = (unranked_pool.choose(rng), ranked_pool.choose(rng)) {
        return Ok((
            fresh,
            anchor,
            Scenario::Ranking {
                current_rank: ranks[&anchor],
            },
        ));
    }

    let picked: Vec<Uuid> = ranked_pool.choose_multiple(rng, 2).copied().collect();
    if let [a, b] = picked.as_slice() {
        return Ok((
            *a,
            *b,
            Scenario::Refinement {
                rank1: ranks[a],
                rank2: ranks[b],
            },
        ));
    }

    Err(VoteError::InsufficientPreferences {
        available: preferred.len(),
    })
}

/// Loads an identity's preferred and ranked items and draws the next pair
pub struct PairSelector {
    preferences: Arc<dyn PreferenceStore>,
    ranks: Arc<dyn RankStore>,
    catalog: Arc<dyn ItemCatalog>,
    candidate_pool_size: usize,
    rng: Mutex<StdRng>,
}

impl PairSelector {
    pub fn new(
        preferences: Arc<dyn PreferenceStore>,
        ranks: Arc<dyn RankStore>,
        catalog: Arc<dyn ItemCatalog>,
        candidate_pool_size: usize,
    ) -> Self {
        Self {
            preferences,
            ranks,
            catalog,
            candidate_pool_size,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Replace the random source (fixed seeds make selection reproducible)
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    async fn describe(&self, id: Uuid) -> VoteResult<PairItem> {
        let text = self
            .catalog
            .item_text(id)
            .await?
            .ok_or_else(|| VoteError::NotFound(format!("card {}", id)))?;
        Ok(PairItem { id, text })
    }

    pub async fn select_pair(&self, identity: &Identity) -> VoteResult<PairSelection> {
        let preferred: Vec<Uuid> = self
            .preferences
            .preferred_items(identity)
            .await?
            .into_iter()
            .map(|p| p.item_id)
            .collect();

        if preferred.len() < 2 {
            debug!(identity = %identity, available = preferred.len(), "Not enough preferred items");
            return Err(VoteError::InsufficientPreferences {
                available: preferred.len(),
            });
        }

        let ranked = self.ranks.entries_for(&preferred).await?;

        let (a, b, scenario) = {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            choose_pair(&preferred, &ranked, self.candidate_pool_size, &mut *rng)?
        };

        let selection = PairSelection {
            item_a: self.describe(a).await?,
            item_b: self.describe(b).await?,
            scenario,
        };

        info!(
            identity = %identity,
            scenario = scenario.as_str(),
            preferred = preferred.len(),
            ranked = ranked.len(),
            "Pair selected"
        );

        Ok(selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ranked(item_id: Uuid, rank: i32) -> RankEntry {
        RankEntry {
            item_id,
            rank,
            wins: 0,
            total_comparisons: 1,
            version: 1,
            updated_at: Utc::now(),
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_fewer_than_two_preferred_fails() {
        let a = Uuid::new_v4();
        let result = choose_pair(&[a], &[], 10, &mut rng());
        assert!(matches!(
            result,
            Err(VoteError::InsufficientPreferences { available: 1 })
        ));
    }

    #[test]
    fn test_duplicates_do_not_count_twice() {
        let a = Uuid::new_v4();
        let result = choose_pair(&[a, a], &[], 10, &mut rng());
        assert!(matches!(
            result,
            Err(VoteError::InsufficientPreferences { available: 1 })
        ));
    }

    #[test]
    fn test_initial_when_nothing_ranked() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (x, y, scenario) = choose_pair(&[a, b], &[], 10, &mut rng()).unwrap();

        assert_eq!(scenario, Scenario::Initial);
        let mut got = vec![x, y];
        got.sort();
        let mut want = vec![a, b];
        want.sort();
        assert_eq!(got, want);
    }

    #[test]
    fn test_ranking_pairs_unranked_against_ranked() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let entries = vec![ranked(a, 1), ranked(b, 2)];

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let (fresh, anchor, scenario) = choose_pair(&[a, b, c], &entries, 10, &mut rng).unwrap();

            assert_eq!(fresh, c);
            assert!(anchor == a || anchor == b);
            let expected_rank = if anchor == a { 1 } else { 2 };
            assert_eq!(
                scenario,
                Scenario::Ranking {
                    current_rank: expected_rank
                }
            );
        }
    }

    #[test]
    fn test_refinement_returns_distinct_ranked_items() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let entries: Vec<RankEntry> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| ranked(*id, i as i32 + 1))
            .collect();

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let (a, b, scenario) = choose_pair(&ids, &entries, 10, &mut rng).unwrap();

            assert_ne!(a, b);
            assert!(ids.contains(&a) && ids.contains(&b));
            match scenario {
                Scenario::Refinement { rank1, rank2 } => {
                    assert_ne!(rank1, rank2);
                }
                other => panic!("expected refinement, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_entries_outside_preferred_set_are_ignored() {
        let (a, b, stranger) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let entries = vec![ranked(stranger, 1)];

        let (_, _, scenario) = choose_pair(&[a, b], &entries, 10, &mut rng()).unwrap();

        assert_eq!(scenario, Scenario::Initial);
    }

    #[test]
    fn test_tiny_pool_still_reaches_every_candidate() {
        let ids: Vec<Uuid> = (0..6).map(|_| Uuid::new_v4()).collect();
        let mut seen = HashSet::new();

        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let (a, b, _) = choose_pair(&ids, &[], 2, &mut rng).unwrap();
            seen.insert(a);
            seen.insert(b);
        }

        assert_eq!(seen.len(), ids.len());
    }
}
