//! PostgreSQL store tests.
//!
//! Need a disposable database:
//!   DATABASE_URL=postgres://... cargo test --test postgres_store_tests -- --ignored
//!
//! The rank table is global, so everything that writes it lives in one test.

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use vote_service::domain::models::{Identity, RankChange};
use vote_service::repository::{
    ComparisonLedger, PreferenceRepository, PreferenceStore, RankStore, RankingRepository,
};
use vote_service::VoteError;

async fn bootstrap_pool() -> Pool<Postgres> {
    let db_url = std::env::var("DATABASE_URL").expect("DATABASE_URL env var required");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await
        .expect("failed to connect to DATABASE_URL");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");

    pool
}

async fn create_card(pool: &Pool<Postgres>, text: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO cards (id, text) VALUES ($1, $2)")
        .bind(id)
        .bind(text)
        .execute(pool)
        .await
        .expect("Failed to create card");
    id
}

async fn create_session(pool: &Pool<Postgres>, user_id: Option<Uuid>) -> String {
    let id = format!("test-{}", Uuid::new_v4());
    sqlx::query("INSERT INTO sessions (id, user_id) VALUES ($1, $2)")
        .bind(&id)
        .bind(user_id)
        .execute(pool)
        .await
        .expect("Failed to create session");
    id
}

async fn create_swipe(
    pool: &Pool<Postgres>,
    card_id: Uuid,
    user_id: Option<Uuid>,
    session_id: Option<&str>,
    direction: &str,
    minutes_ago: i64,
) {
    sqlx::query(
        "INSERT INTO swipes (id, card_id, user_id, session_id, direction, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(Uuid::new_v4())
    .bind(card_id)
    .bind(user_id)
    .bind(session_id)
    .bind(direction)
    .bind(Utc::now() - Duration::minutes(minutes_ago))
    .execute(pool)
    .await
    .expect("Failed to create swipe");
}

async fn assert_dense(repo: &RankingRepository) {
    let entries = repo.list_entries().await.unwrap();
    let ranks: Vec<i32> = entries.iter().map(|e| e.rank).collect();
    let expected: Vec<i32> = (1..=entries.len() as i32).collect();
    assert_eq!(ranks, expected, "ranks must be exactly 1..N");
    for entry in &entries {
        assert!(entry.wins <= entry.total_comparisons);
    }
}

async fn rank_of(repo: &RankingRepository, id: Uuid) -> i32 {
    repo.entries_for(&[id]).await.unwrap()[0].rank
}

#[tokio::test]
#[ignore] // Run with: cargo test --test postgres_store_tests -- --ignored
async fn test_rank_changes_against_postgres() {
    let pool = bootstrap_pool().await;
    sqlx::query("TRUNCATE comparisons, rank_entries")
        .execute(&pool)
        .await
        .expect("Failed to reset rank tables");
    let repo = RankingRepository::new(pool.clone());

    let a = create_card(&pool, "A").await;
    let b = create_card(&pool, "B").await;
    let c = create_card(&pool, "C").await;
    let d = create_card(&pool, "D").await;

    let user = Uuid::new_v4();
    let session = create_session(&pool, Some(user)).await;
    let voter = Identity::Session(session.clone());

    // Neither ranked
    let outcome = repo
        .apply_outcome(a, b, Some(voter.clone()), Utc::now())
        .await
        .unwrap();
    assert_eq!(
        outcome.change,
        RankChange::AppendBoth {
            winner_rank: 1,
            loser_rank: 2
        }
    );
    assert_eq!((outcome.winner.wins, outcome.winner.total_comparisons), (1, 1));
    assert_eq!((outcome.loser.wins, outcome.loser.total_comparisons), (0, 1));

    // Winner already ahead
    let outcome = repo.apply_outcome(a, b, None, Utc::now()).await.unwrap();
    assert_eq!(outcome.change, RankChange::Confirm);
    assert_eq!(outcome.winner.total_comparisons, 2);
    assert!(outcome.winner.version > 1);

    // New winner takes the loser's rank: a, c, b
    let outcome = repo.apply_outcome(c, b, None, Utc::now()).await.unwrap();
    assert_eq!(outcome.change, RankChange::InsertWinner { at: 2 });
    assert_eq!(rank_of(&repo, b).await, 3);

    // New loser lands below the winner: a, d, c, b
    let outcome = repo.apply_outcome(a, d, None, Utc::now()).await.unwrap();
    assert_eq!(outcome.change, RankChange::InsertLoser { at: 2 });
    assert_eq!(rank_of(&repo, c).await, 3);
    assert_eq!(rank_of(&repo, b).await, 4);

    // Upset from the bottom: b, a, d, c
    let outcome = repo.apply_outcome(b, a, None, Utc::now()).await.unwrap();
    assert_eq!(outcome.change, RankChange::Promote { from: 4, to: 1 });
    assert_eq!(rank_of(&repo, b).await, 1);
    assert_eq!(rank_of(&repo, a).await, 2);
    assert_eq!(rank_of(&repo, d).await, 3);
    assert_eq!(rank_of(&repo, c).await, 4);
    assert_dense(&repo).await;

    // Self comparison never reaches the database
    assert!(matches!(
        repo.apply_outcome(d, d, None, Utc::now()).await,
        Err(VoteError::InvalidArgument(_))
    ));
    assert_eq!(repo.comparison_count().await.unwrap(), 5);

    // Session votes count for the user the session is linked to
    let expected: std::collections::HashSet<Uuid> = [a, b].into_iter().collect();
    assert_eq!(
        repo.items_compared_by(&Identity::User(user)).await.unwrap(),
        expected
    );
    assert_eq!(repo.items_compared_by(&voter).await.unwrap(), expected);

    // Random sequence over more cards
    let mut cards = vec![a, b, c, d];
    for i in 0..4 {
        cards.push(create_card(&pool, &format!("extra {}", i)).await);
    }
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..120 {
        let winner = cards[rng.gen_range(0..cards.len())];
        let loser = cards[rng.gen_range(0..cards.len())];
        if winner == loser {
            continue;
        }
        let outcome = repo.apply_outcome(winner, loser, None, Utc::now()).await.unwrap();
        assert!(outcome.winner.rank < outcome.loser.rank);
    }
    assert_dense(&repo).await;

    // Ranked cards and the ledger rows pointing at them cannot be deleted
    let deleted = sqlx::query("DELETE FROM cards WHERE id = $1")
        .bind(a)
        .execute(&pool)
        .await;
    assert!(deleted.is_err());
    assert_dense(&repo).await;

    let recent = repo.recent_comparisons(3).await.unwrap();
    assert_eq!(recent.len(), 3);
    assert!(recent[0].created_at >= recent[1].created_at);
}

#[tokio::test]
#[ignore] // Run with: cargo test --test postgres_store_tests -- --ignored
async fn test_preferred_items_merge_linked_sessions() {
    let pool = bootstrap_pool().await;
    let repo = PreferenceRepository::new(pool.clone());

    let x = create_card(&pool, "X").await;
    let y = create_card(&pool, "Y").await;
    let z = create_card(&pool, "Z").await;

    let user = Uuid::new_v4();
    let linked = create_session(&pool, Some(user)).await;
    let anonymous = create_session(&pool, None).await;

    create_swipe(&pool, x, Some(user), None, "preferred", 30).await;
    create_swipe(&pool, y, None, Some(&linked), "preferred", 20).await;
    create_swipe(&pool, z, Some(user), None, "preferred", 15).await;
    create_swipe(&pool, z, None, Some(&linked), "rejected", 10).await;
    create_swipe(&pool, z, None, Some(&anonymous), "preferred", 5).await;

    let from_user: Vec<Uuid> = repo
        .preferred_items(&Identity::User(user))
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.item_id)
        .collect();
    assert_eq!(from_user, vec![y, x]);

    let from_session: Vec<Uuid> = repo
        .preferred_items(&Identity::Session(linked.clone()))
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.item_id)
        .collect();
    assert_eq!(from_session, from_user);

    assert_eq!(
        repo.resolve_identity(&Identity::Session(anonymous.clone()))
            .await
            .unwrap(),
        Identity::Session(anonymous.clone())
    );
    let from_anonymous: Vec<Uuid> = repo
        .preferred_items(&Identity::Session(anonymous))
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.item_id)
        .collect();
    assert_eq!(from_anonymous, vec![z]);
}
