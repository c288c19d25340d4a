mod cards;
mod memory;
mod preferences;
mod rankings;
mod traits;

pub use cards::CardRepository;
pub use memory::{InMemoryVoteStore, RankTable};
pub use preferences::PreferenceRepository;
pub use rankings::RankingRepository;
pub use traits::{ComparisonLedger, ItemCatalog, PreferenceStore, RankStore};
