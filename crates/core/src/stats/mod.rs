//! Career-stats pipeline: keys, cache, resolver, team enrichment

pub mod cache;
pub mod enricher;
pub mod key;
pub mod resolver;

pub use cache::StatsCache;
pub use key::{StatKey, StatsMode};
pub use resolver::{StatsResolver, StatsStore};
