//! Replay JSON wire schema
//!
//! The shape returned by the replay-analysis service: an envelope with
//! `data.summary` carrying battle metadata and a `details` list with
//! one entry per participant.

use serde::{Deserialize, Serialize};

use crate::refdata::{AccountId, TankId};

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayDocument {
    pub status: String,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    pub data: Option<ReplayData>,
}

impl ReplayDocument {
    /// Schema check from §"replay inputs": an `"ok"` envelope with a
    /// summary whose protagonist is set.
    pub fn summary(&self) -> Option<&ReplaySummary> {
        if self.status != "ok" {
            return None;
        }
        let summary = self.data.as_ref()?.summary.as_ref()?;
        summary.protagonist?;
        Some(summary)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayData {
    #[serde(default)]
    pub summary: Option<ReplaySummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplaySummary {
    pub battle_result: i32,
    #[serde(default)]
    pub battle_type: i32,
    #[serde(default)]
    pub room_type: i32,
    #[serde(default)]
    pub map_name: String,
    #[serde(default)]
    pub battle_duration: f64,
    pub protagonist: Option<AccountId>,
    #[serde(default)]
    pub player_name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub mastery_badge: i32,
    #[serde(default)]
    pub allies: Vec<AccountId>,
    #[serde(default)]
    pub enemies: Vec<AccountId>,
    #[serde(default)]
    pub battle_start_timestamp: f64,
    #[serde(default)]
    pub view_url: Option<String>,
    #[serde(default)]
    pub details: Vec<ReplayDetail>,
}

/// Per-participant entry. The measurement block is the union field set
/// of the two analyser generations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayDetail {
    pub dbid: AccountId,
    #[serde(default)]
    pub vehicle_descr: TankId,
    #[serde(default)]
    pub squad_index: Option<u32>,
    /// `-1` means the player survived the battle.
    #[serde(default)]
    pub death_reason: i32,
    #[serde(default)]
    pub hitpoints_left: i64,
    #[serde(default)]
    pub time_alive: f64,

    #[serde(default)]
    pub damage_made: f64,
    #[serde(default)]
    pub damage_assisted: f64,
    #[serde(default)]
    pub damage_assisted_track: f64,
    #[serde(default)]
    pub damage_received: f64,
    #[serde(default)]
    pub damage_blocked: f64,
    #[serde(default)]
    pub hits_made: f64,
    #[serde(default)]
    pub hits_bounced: f64,
    #[serde(default)]
    pub hits_splash: f64,
    #[serde(default)]
    pub hits_pen: f64,
    #[serde(default)]
    pub shots_made: f64,
    #[serde(default)]
    pub shots_hit: f64,
    #[serde(default)]
    pub shots_pen: f64,
    #[serde(default)]
    pub shots_splash: f64,
    #[serde(default)]
    pub enemies_damaged: f64,
    #[serde(default)]
    pub enemies_destroyed: f64,
    #[serde(default)]
    pub enemies_spotted: f64,
    #[serde(default)]
    pub base_capture_points: f64,
    #[serde(default)]
    pub base_defend_points: f64,
    #[serde(default)]
    pub wp_points_earned: f64,
    #[serde(default)]
    pub wp_points_stolen: f64,
    #[serde(default)]
    pub distance_travelled: f64,
}

impl ReplayDetail {
    pub fn survived(&self) -> bool {
        self.death_reason == -1
    }
}
