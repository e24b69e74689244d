//! Blitz Analyzer Core Library
//!
//! Batch analyser for tank-battle replay records: normalises per-battle
//! JSON documents, resolves per-player career stats through a cached
//! vendor API, and aggregates the enriched battles into categorised
//! reports.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

pub mod aggregate;
pub mod error;
pub mod pipeline;
pub mod refdata;
pub mod replay;
pub mod report;
pub mod stats;
pub mod wg;

pub use error::{Error, Result};
pub use pipeline::{Analysis, PipelineConfig};
pub use refdata::{RefData, Tankopedia};
pub use replay::{BattleRecord, ReplayReader};
pub use stats::{StatsCache, StatsMode, StatsResolver};
pub use wg::{ReplayServiceClient, VendorClient};

/// Per-run mutable state, passed explicitly instead of living in
/// globals: the monotonic battle index and progress counters.
#[derive(Debug, Default)]
pub struct RunContext {
    battle_counter: AtomicU32,
    replays_read: AtomicUsize,
}

impl RunContext {
    /// Next battle index, starting from 1; assigned serially as
    /// records leave the reader, so it is stable per run only.
    pub fn next_battle_i(&self) -> u32 {
        self.replays_read.fetch_add(1, Ordering::Relaxed);
        self.battle_counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn replays_read(&self) -> usize {
        self.replays_read.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battle_index_starts_at_one() {
        let ctx = RunContext::default();
        assert_eq!(ctx.next_battle_i(), 1);
        assert_eq!(ctx.next_battle_i(), 2);
        assert_eq!(ctx.replays_read(), 2);
    }
}
