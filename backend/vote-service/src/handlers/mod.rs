/// HTTP handlers for vote-related endpoints
///
/// - `POST /vote/pair`: next pair to compare
/// - `POST /vote/submit`: record a winner/loser outcome
/// - `GET /vote/rankings`: global rankings
/// - `GET /vote/rankings/me`: the caller's preferred cards
/// - `GET /vote/history`: most recent comparisons
pub mod identity;
pub mod vote;

use crate::error::VoteError;
use actix_web::web;

pub use identity::Voter;
pub use vote::{get_history, get_my_rankings, get_rankings, request_pair, submit_vote};

/// Register the `/vote` routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/vote")
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                VoteError::InvalidArgument(err.to_string()).into()
            }))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                VoteError::InvalidArgument(err.to_string()).into()
            }))
            .route("/pair", web::post().to(request_pair))
            .route("/submit", web::post().to(submit_vote))
            .route("/rankings", web::get().to(get_rankings))
            .route("/rankings/me", web::get().to(get_my_rankings))
            .route("/history", web::get().to(get_history)),
    );
}
