//! Replay ingestion: wire schema and battle-record normalisation

pub mod reader;
pub mod types;

pub use reader::{BattleRecord, ReplayReader};
pub use types::ReplayDocument;
