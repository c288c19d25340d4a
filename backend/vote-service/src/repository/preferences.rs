use super::PreferenceStore;
use crate::domain::models::{Identity, PreferredItem, SwipeDirection};
use crate::error::VoteResult;
use sqlx::PgPool;
use uuid::Uuid;

/// User a session has been linked to, if any
pub(super) async fn linked_user(pool: &PgPool, session_id: &str) -> VoteResult<Option<Uuid>> {
    let user_id: Option<Option<Uuid>> =
        sqlx::query_scalar("SELECT user_id FROM sessions WHERE id = $1")
            .bind(session_id)
            .fetch_optional(pool)
            .await?;

    Ok(user_id.flatten())
}

/// Read-only repository over swipe history
#[derive(Clone)]
pub struct PreferenceRepository {
    pool: PgPool,
}

impl PreferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Latest mark per card for a user, including every session linked to that user
    async fn preferred_for_user(&self, user_id: Uuid) -> VoteResult<Vec<PreferredItem>> {
        let items = sqlx::query_as::<_, PreferredItem>(
            r#"
            SELECT item_id, marked_at
            FROM (
                SELECT DISTINCT ON (s.card_id)
                       s.card_id AS item_id, s.direction, s.created_at AS marked_at
                FROM swipes s
                WHERE s.user_id = $1
                   OR s.session_id IN (SELECT id FROM sessions WHERE user_id = $1)
                ORDER BY s.card_id, s.created_at DESC
            ) latest
            WHERE direction = $2
            ORDER BY marked_at DESC
            "#,
        )
        .bind(user_id)
        .bind(SwipeDirection::Preferred.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn preferred_for_session(&self, session_id: &str) -> VoteResult<Vec<PreferredItem>> {
        let items = sqlx::query_as::<_, PreferredItem>(
            r#"
            SELECT item_id, marked_at
            FROM (
                SELECT DISTINCT ON (s.card_id)
                       s.card_id AS item_id, s.direction, s.created_at AS marked_at
                FROM swipes s
                WHERE s.session_id = $1
                ORDER BY s.card_id, s.created_at DESC
            ) latest
            WHERE direction = $2
            ORDER BY marked_at DESC
            "#,
        )
        .bind(session_id)
        .bind(SwipeDirection::Preferred.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}

#[async_trait::async_trait]
impl PreferenceStore for PreferenceRepository {
    async fn resolve_identity(&self, identity: &Identity) -> VoteResult<Identity> {
        if let Identity::Session(session_id) = identity {
            if let Some(user_id) = linked_user(&self.pool, session_id).await? {
                return Ok(Identity::User(user_id));
            }
        }
        Ok(identity.clone())
    }

    async fn preferred_items(&self, identity: &Identity) -> VoteResult<Vec<PreferredItem>> {
        match self.resolve_identity(identity).await? {
            Identity::User(user_id) => self.preferred_for_user(user_id).await,
            Identity::Session(session_id) => self.preferred_for_session(&session_id).await,
        }
    }
}
