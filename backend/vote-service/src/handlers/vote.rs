/// Vote handlers - HTTP endpoints for pair selection, submission and rankings
use super::identity::Voter;
use crate::domain::models::{PairItem, PairSelection};
use crate::error::{VoteError, VoteResult};
use crate::AppState;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_HISTORY_LIMIT: i64 = 20;

/// Response body for `POST /vote/pair`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairResponse {
    pub item_a: PairItem,
    pub item_b: PairItem,
    pub scenario: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl From<PairSelection> for PairResponse {
    fn from(pair: PairSelection) -> Self {
        Self {
            extra: pair.scenario.extra(),
            scenario: pair.scenario.as_str(),
            item_a: pair.item_a,
            item_b: pair.item_b,
        }
    }
}

/// Request body for `POST /vote/submit`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVoteRequest {
    pub winner_id: Option<Uuid>,
    pub loser_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// Pick the next pair for the caller
pub async fn request_pair(state: web::Data<AppState>, voter: Voter) -> VoteResult<HttpResponse> {
    let pair = state.selector.select_pair(voter.identity()).await?;

    Ok(HttpResponse::Ok().json(PairResponse::from(pair)))
}

/// Record the caller's choice between two cards
pub async fn submit_vote(
    state: web::Data<AppState>,
    voter: Voter,
    req: web::Json<SubmitVoteRequest>,
) -> VoteResult<HttpResponse> {
    let winner_id = req
        .winner_id
        .ok_or_else(|| VoteError::InvalidArgument("winnerId is required".to_string()))?;
    let loser_id = req
        .loser_id
        .ok_or_else(|| VoteError::InvalidArgument("loserId is required".to_string()))?;

    let outcome = state
        .updater
        .submit_outcome(Some(voter.identity()), winner_id, loser_id)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "change": outcome.change.as_str(),
        "winner": outcome.winner,
        "loser": outcome.loser,
    })))
}

/// Global rankings with aggregate counters
pub async fn get_rankings(state: web::Data<AppState>) -> VoteResult<HttpResponse> {
    let summary = state.reporter.summary().await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// The caller's preferred cards with their stats
pub async fn get_my_rankings(state: web::Data<AppState>, voter: Voter) -> VoteResult<HttpResponse> {
    let rankings = state.reporter.personal_rankings(voter.identity()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "rankings": rankings,
        "totalItems": rankings.len(),
    })))
}

/// Most recent comparisons
pub async fn get_history(
    state: web::Data<AppState>,
    query: web::Query<HistoryQuery>,
) -> VoteResult<HttpResponse> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, state.history_max_limit);
    let comparisons = state.reporter.recent_comparisons(limit).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "comparisons": comparisons,
        "limit": limit,
    })))
}
