/// Vote Service Library
///
/// Pairwise-preference ranking engine: picks which two preferred cards a
/// voter compares next and keeps a dense, gap-free rank table up to date
/// after every vote.
///
/// # Modules
///
/// - `domain`: Rank entries, comparison records, pair selections
/// - `repository`: Store traits with PostgreSQL and in-memory implementations
/// - `services`: Pair selector, rank updater, rankings reporter
/// - `handlers`: HTTP request handlers
/// - `error`: Error types and HTTP mapping
/// - `config`: Configuration management
pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod repository;
pub mod services;

pub use config::Config;
pub use error::{VoteError, VoteResult};

use config::VoteConfig;
use rand::rngs::StdRng;
use repository::{ComparisonLedger, InMemoryVoteStore, ItemCatalog, PreferenceStore, RankStore};
use services::{PairSelector, RankUpdater, RankingsReporter};
use std::sync::Arc;

/// Shared state handed to every HTTP handler
pub struct AppState {
    pub selector: PairSelector,
    pub updater: RankUpdater,
    pub reporter: RankingsReporter,
    pub history_max_limit: i64,
}

impl AppState {
    pub fn new(
        preferences: Arc<dyn PreferenceStore>,
        catalog: Arc<dyn ItemCatalog>,
        ranks: Arc<dyn RankStore>,
        ledger: Arc<dyn ComparisonLedger>,
        config: &VoteConfig,
    ) -> Self {
        Self {
            selector: PairSelector::new(
                preferences.clone(),
                ranks.clone(),
                catalog.clone(),
                config.candidate_pool_size,
            ),
            updater: RankUpdater::new(ranks.clone(), catalog.clone()),
            reporter: RankingsReporter::new(ranks, ledger, catalog, preferences),
            history_max_limit: config.history_max_limit,
        }
    }

    /// Everything backed by a single in-memory store
    pub fn in_memory(store: Arc<InMemoryVoteStore>, config: &VoteConfig) -> Self {
        Self::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            config,
        )
    }

    /// Seed the pair selector for reproducible draws
    pub fn with_selector_rng(mut self, rng: StdRng) -> Self {
        self.selector = self.selector.with_rng(rng);
        self
    }
}
