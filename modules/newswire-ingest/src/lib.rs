pub mod entities;
pub mod extract;
pub mod fetcher;
pub mod normalizer;
pub mod scheduler;

pub use entities::EntityExtractor;
pub use extract::PageExtractor;
pub use fetcher::{FeedFetcher, FetchPolicy, FetchedFeed, RawItem};
pub use normalizer::{NormalizeOutcome, Normalizer};
pub use scheduler::{CycleStats, FeedScheduler, SchedulerConfig};
