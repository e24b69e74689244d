//! Team enrichment
//!
//! Folds resolved career stats into each battle record: the subject's
//! own values, per-side means over the resolved allies and enemies,
//! the survivor scoreline, and the missing-stats count.

use super::resolver::ResolvedStats;
use crate::replay::reader::{BattleRecord, TeamValues};
use crate::stats::key::StatKey;
use crate::wg::types::{PlayerStats, TeamField};

fn side_mean(
    keys: &[StatKey],
    resolved: &ResolvedStats,
    missing: &mut usize,
) -> TeamValues {
    let stats: Vec<&PlayerStats> = keys
        .iter()
        .filter_map(|key| {
            let found = resolved.lookup(key);
            if found.is_none() {
                *missing += 1;
            }
            found
        })
        .collect();

    let mean = |field: TeamField| -> Option<f64> {
        let values: Vec<f64> = stats.iter().filter_map(|s| s.field(field)).collect();
        if values.is_empty() {
            // No resolved players on this side: absent, not zero.
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    };

    TeamValues {
        wins: mean(TeamField::Wins),
        battles: mean(TeamField::Battles),
        damage_dealt: mean(TeamField::DamageDealt),
    }
}

/// Enrich every record in place. Records are otherwise unchanged.
pub fn enrich(records: &mut [BattleRecord], resolved: &ResolvedStats) {
    for record in records {
        let mut missing = 0;

        record.allies_avg = side_mean(&record.allies, resolved, &mut missing);
        record.enemies_avg = side_mean(&record.enemies, resolved, &mut missing);

        record.player = match resolved.lookup(&record.subject_key()) {
            Some(stats) => TeamValues {
                wins: stats.field(TeamField::Wins),
                battles: stats.field(TeamField::Battles),
                damage_dealt: stats.field(TeamField::DamageDealt),
            },
            None => TeamValues::default(),
        };

        record.team_result = format!("{}-{}", record.allies_survived, record.enemies_survived);
        record.n_players = record.allies.len() + record.enemies.len();
        record.missing_stats = missing;
    }
}
