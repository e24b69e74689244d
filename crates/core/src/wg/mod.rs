//! Wargaming vendor API: stats endpoints and the replay-analysis service

pub mod client;
pub mod replays;
pub mod types;

pub use client::VendorClient;
pub use replays::ReplayServiceClient;
pub use types::{PlayerStats, Region, TankStatsEntry};
