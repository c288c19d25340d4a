use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use uuid::Uuid;

use vote_service::config::VoteConfig;
use vote_service::domain::models::Identity;
use vote_service::repository::{ComparisonLedger, InMemoryVoteStore};
use vote_service::AppState;

const CARDS: usize = 12;
const VOTES: usize = 400;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_votes_keep_ranks_dense() {
    let store = Arc::new(InMemoryVoteStore::new());
    let mut cards = Vec::with_capacity(CARDS);
    for i in 0..CARDS {
        cards.push(store.add_card(&format!("card {}", i)).await);
    }
    let state = Arc::new(AppState::in_memory(store.clone(), &VoteConfig::default()));

    let mut rng = StdRng::seed_from_u64(11);
    let mut handles = Vec::with_capacity(VOTES);
    for _ in 0..VOTES {
        let winner = cards[rng.gen_range(0..CARDS)];
        let mut loser = cards[rng.gen_range(0..CARDS)];
        while loser == winner {
            loser = cards[rng.gen_range(0..CARDS)];
        }

        let state = state.clone();
        let voter = Identity::User(Uuid::new_v4());
        handles.push(tokio::spawn(async move {
            state
                .updater
                .submit_outcome(Some(&voter), winner, loser)
                .await
        }));
    }

    for handle in handles {
        let outcome = handle.await.expect("task panicked").expect("vote rejected");
        assert!(outcome.winner.rank < outcome.loser.rank);
    }

    let table = store.snapshot().await;
    assert!(table.is_dense());
    assert_eq!(table.len(), CARDS);
    assert_eq!(store.comparison_count().await.unwrap(), VOTES as i64);

    let entries = table.entries();
    let wins: i32 = entries.iter().map(|e| e.wins).sum();
    let compared: i32 = entries.iter().map(|e| e.total_comparisons).sum();
    assert_eq!(wins as usize, VOTES);
    assert_eq!(compared as usize, VOTES * 2);
}
