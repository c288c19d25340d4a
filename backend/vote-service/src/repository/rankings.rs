use super::preferences::linked_user;
use super::{ComparisonLedger, RankStore};
use crate::domain::models::{ComparisonRecord, Identity, RankChange, RankEntry, SubmitOutcome};
use crate::error::{VoteError, VoteResult};
use crate::services::rank_updater::plan_outcome;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

/// PostgreSQL repository for rank entries and the comparison ledger
#[derive(Clone)]
pub struct RankingRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct ComparisonRow {
    id: Uuid,
    winner_id: Uuid,
    loser_id: Uuid,
    voter_kind: Option<String>,
    voter_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ComparisonRow> for ComparisonRecord {
    fn from(row: ComparisonRow) -> Self {
        ComparisonRecord {
            id: row.id,
            winner_id: row.winner_id,
            loser_id: row.loser_id,
            voter: voter_from_columns(row.voter_kind.as_deref(), row.voter_id),
            created_at: row.created_at,
        }
    }
}

fn voter_columns(voter: Option<&Identity>) -> (Option<&'static str>, Option<String>) {
    match voter {
        Some(Identity::User(id)) => (Some("user"), Some(id.to_string())),
        Some(Identity::Session(id)) => (Some("session"), Some(id.clone())),
        None => (None, None),
    }
}

fn voter_from_columns(kind: Option<&str>, id: Option<String>) -> Option<Identity> {
    match (kind, id) {
        (Some("user"), Some(id)) => Uuid::parse_str(&id).ok().map(Identity::User),
        (Some("session"), Some(id)) => Some(Identity::Session(id)),
        _ => None,
    }
}

impl RankingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Health check
    pub async fn health_check(&self) -> VoteResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn shift_down_from(
        tx: &mut Transaction<'_, Postgres>,
        from_rank: i32,
        until_rank: Option<i32>,
        now: DateTime<Utc>,
    ) -> VoteResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE rank_entries
            SET rank = rank + 1, version = version + 1, updated_at = $3
            WHERE rank >= $1 AND ($2::INT IS NULL OR rank < $2)
            "#,
        )
        .bind(from_rank)
        .bind(until_rank)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_entry(
        tx: &mut Transaction<'_, Postgres>,
        entry: &RankEntry,
    ) -> VoteResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rank_entries (item_id, rank, wins, total_comparisons, version, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.item_id)
        .bind(entry.rank)
        .bind(entry.wins)
        .bind(entry.total_comparisons)
        .bind(entry.version)
        .bind(entry.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Count one more comparison (and optionally a win); optionally move the entry
    async fn credit(
        tx: &mut Transaction<'_, Postgres>,
        item_id: Uuid,
        won: bool,
        new_rank: Option<i32>,
        now: DateTime<Utc>,
    ) -> VoteResult<()> {
        sqlx::query(
            r#"
            UPDATE rank_entries
            SET total_comparisons = total_comparisons + 1,
                wins = wins + CASE WHEN $2 THEN 1 ELSE 0 END,
                rank = COALESCE($3, rank),
                version = version + 1,
                updated_at = $4
            WHERE item_id = $1
            "#,
        )
        .bind(item_id)
        .bind(won)
        .bind(new_rank)
        .bind(now)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn fetch_entry(
        tx: &mut Transaction<'_, Postgres>,
        item_id: Uuid,
    ) -> VoteResult<RankEntry> {
        let entry = sqlx::query_as::<_, RankEntry>(
            r#"
            SELECT item_id, rank, wins, total_comparisons, version, updated_at
            FROM rank_entries
            WHERE item_id = $1
            "#,
        )
        .bind(item_id)
        .fetch_optional(&mut **tx)
        .await?;

        entry.ok_or_else(|| VoteError::NotFound(format!("rank entry for {}", item_id)))
    }
}

#[async_trait::async_trait]
impl RankStore for RankingRepository {
    async fn entries_for(&self, item_ids: &[Uuid]) -> VoteResult<Vec<RankEntry>> {
        if item_ids.is_empty() {
            return Ok(Vec::new());
        }

        let entries = sqlx::query_as::<_, RankEntry>(
            r#"
            SELECT item_id, rank, wins, total_comparisons, version, updated_at
            FROM rank_entries
            WHERE item_id = ANY($1)
            ORDER BY rank ASC
            "#,
        )
        .bind(item_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn list_entries(&self) -> VoteResult<Vec<RankEntry>> {
        let entries = sqlx::query_as::<_, RankEntry>(
            r#"
            SELECT item_id, rank, wins, total_comparisons, version, updated_at
            FROM rank_entries
            ORDER BY rank ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn apply_outcome(
        &self,
        winner_id: Uuid,
        loser_id: Uuid,
        voter: Option<Identity>,
        now: DateTime<Utc>,
    ) -> VoteResult<SubmitOutcome> {
        if winner_id == loser_id {
            return Err(VoteError::InvalidArgument(
                "winner and loser must be different items".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        // Serialize rank writers; plain readers are not blocked
        sqlx::query("LOCK TABLE rank_entries IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let current = sqlx::query_as::<_, RankEntry>(
            r#"
            SELECT item_id, rank, wins, total_comparisons, version, updated_at
            FROM rank_entries
            WHERE item_id = ANY($1)
            "#,
        )
        .bind(&[winner_id, loser_id][..])
        .fetch_all(&mut *tx)
        .await?;

        let table_len: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rank_entries")
            .fetch_one(&mut *tx)
            .await?;

        let winner = current.iter().find(|e| e.item_id == winner_id);
        let loser = current.iter().find(|e| e.item_id == loser_id);
        let change = plan_outcome(winner, loser, table_len as i32);

        match change {
            RankChange::AppendBoth {
                winner_rank,
                loser_rank,
            } => {
                Self::insert_entry(
                    &mut tx,
                    &RankEntry::first_comparison(winner_id, winner_rank, true, now),
                )
                .await?;
                Self::insert_entry(
                    &mut tx,
                    &RankEntry::first_comparison(loser_id, loser_rank, false, now),
                )
                .await?;
            }
            RankChange::InsertWinner { at } => {
                let shifted = Self::shift_down_from(&mut tx, at, None, now).await?;
                debug!(at, shifted, "Shifted entries for new winner");
                Self::insert_entry(
                    &mut tx,
                    &RankEntry::first_comparison(winner_id, at, true, now),
                )
                .await?;
                Self::credit(&mut tx, loser_id, false, None, now).await?;
            }
            RankChange::InsertLoser { at } => {
                let shifted = Self::shift_down_from(&mut tx, at, None, now).await?;
                debug!(at, shifted, "Shifted entries for new loser");
                Self::insert_entry(
                    &mut tx,
                    &RankEntry::first_comparison(loser_id, at, false, now),
                )
                .await?;
                Self::credit(&mut tx, winner_id, true, None, now).await?;
            }
            RankChange::Promote { from, to } => {
                let shifted = Self::shift_down_from(&mut tx, to, Some(from), now).await?;
                debug!(from, to, shifted, "Shifted entries for promotion");
                Self::credit(&mut tx, winner_id, true, Some(to), now).await?;
                Self::credit(&mut tx, loser_id, false, None, now).await?;
            }
            RankChange::Confirm => {
                Self::credit(&mut tx, winner_id, true, None, now).await?;
                Self::credit(&mut tx, loser_id, false, None, now).await?;
            }
        }

        let record = ComparisonRecord::new(winner_id, loser_id, voter, now);
        let (voter_kind, voter_id) = voter_columns(record.voter.as_ref());
        sqlx::query(
            r#"
            INSERT INTO comparisons (id, winner_id, loser_id, voter_kind, voter_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(record.winner_id)
        .bind(record.loser_id)
        .bind(voter_kind)
        .bind(voter_id)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        let winner = Self::fetch_entry(&mut tx, winner_id).await?;
        let loser = Self::fetch_entry(&mut tx, loser_id).await?;

        // Deferred rank uniqueness is checked here
        tx.commit().await?;

        Ok(SubmitOutcome {
            winner,
            loser,
            change,
        })
    }
}

#[async_trait::async_trait]
impl ComparisonLedger for RankingRepository {
    async fn comparison_count(&self) -> VoteResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comparisons")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn recent_comparisons(&self, limit: i64) -> VoteResult<Vec<ComparisonRecord>> {
        let rows = sqlx::query_as::<_, ComparisonRow>(
            r#"
            SELECT id, winner_id, loser_id, voter_kind, voter_id, created_at
            FROM comparisons
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ComparisonRecord::from).collect())
    }

    async fn items_compared_by(&self, voter: &Identity) -> VoteResult<HashSet<Uuid>> {
        let user_id = match voter {
            Identity::User(user_id) => Some(*user_id),
            Identity::Session(session_id) => linked_user(&self.pool, session_id).await?,
        };

        let pairs = match user_id {
            // The user's own votes plus those cast from any of its sessions
            Some(user_id) => {
                sqlx::query_as::<_, (Uuid, Uuid)>(
                    r#"
                    SELECT winner_id, loser_id
                    FROM comparisons
                    WHERE (voter_kind = 'user' AND voter_id = $1)
                       OR (voter_kind = 'session'
                           AND voter_id IN (SELECT id FROM sessions WHERE user_id = $2))
                    "#,
                )
                .bind(user_id.to_string())
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                let (voter_kind, voter_id) = voter_columns(Some(voter));
                sqlx::query_as::<_, (Uuid, Uuid)>(
                    r#"
                    SELECT winner_id, loser_id
                    FROM comparisons
                    WHERE voter_kind = $1 AND voter_id = $2
                    "#,
                )
                .bind(voter_kind)
                .bind(voter_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(pairs
            .into_iter()
            .flat_map(|(winner, loser)| [winner, loser])
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voter_columns_round_trip_user() {
        let user = Uuid::new_v4();
        let (kind, id) = voter_columns(Some(&Identity::User(user)));
        assert_eq!(kind, Some("user"));
        assert_eq!(voter_from_columns(kind, id), Some(Identity::User(user)));
    }

    #[test]
    fn test_anonymous_vote_has_no_voter() {
        assert_eq!(voter_columns(None), (None, None));
        assert_eq!(voter_from_columns(None, None), None);
        assert_eq!(voter_from_columns(Some("user"), Some("not-a-uuid".into())), None);
    }
}
