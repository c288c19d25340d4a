pub mod pair_selector;
pub mod rank_updater;
pub mod rankings_reporter;

pub use pair_selector::PairSelector;
pub use rank_updater::RankUpdater;
pub use rankings_reporter::RankingsReporter;
