use super::ItemCatalog;
use crate::domain::models::Item;
use crate::error::VoteResult;
use sqlx::PgPool;
use uuid::Uuid;

/// Read-only repository for card text
#[derive(Clone)]
pub struct CardRepository {
    pool: PgPool,
}

impl CardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ItemCatalog for CardRepository {
    async fn items_by_ids(&self, ids: &[Uuid]) -> VoteResult<Vec<Item>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, text
            FROM cards
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}
