//! Player-stat histograms
//!
//! Bucketises every resolved participant (allies and enemies of every
//! battle) along a few career-stat axes and reports counts with
//! per-side percentages.

use super::categories::{bucket_index, bucket_label, BucketFormat};
use crate::replay::reader::BattleRecord;
use crate::stats::resolver::ResolvedStats;
use crate::wg::types::PlayerStats;

#[derive(Debug, Clone, Copy)]
pub enum HistAxis {
    WinRate,
    AvgDamage,
    Battles,
}

impl HistAxis {
    fn value(&self, stats: &PlayerStats) -> Option<f64> {
        match self {
            HistAxis::WinRate => stats.win_rate(),
            HistAxis::AvgDamage => stats.avg_damage(),
            HistAxis::Battles => Some(stats.battles as f64),
        }
    }
}

pub struct HistSpec {
    pub name: &'static str,
    pub axis: HistAxis,
    pub breakpoints: &'static [f64],
    pub format: BucketFormat,
}

pub const HISTOGRAMS: &[HistSpec] = &[
    HistSpec {
        name: "Win Rate",
        axis: HistAxis::WinRate,
        breakpoints: &[0.0, 0.35, 0.45, 0.50, 0.55, 0.65],
        format: BucketFormat::Percent,
    },
    HistSpec {
        name: "Average Damage",
        axis: HistAxis::AvgDamage,
        breakpoints: &[0.0, 500.0, 1000.0, 1500.0, 2000.0],
        format: BucketFormat::Raw,
    },
    HistSpec {
        name: "Battles",
        axis: HistAxis::Battles,
        breakpoints: &[0.0, 1000.0, 2500.0, 5000.0, 10_000.0, 25_000.0],
        format: BucketFormat::Raw,
    },
];

#[derive(Debug, Clone)]
pub struct HistRow {
    pub label: String,
    pub allies: u64,
    pub enemies: u64,
    pub total: u64,
    pub allies_pct: f64,
    pub enemies_pct: f64,
    pub total_pct: f64,
}

#[derive(Debug, Clone)]
pub struct Histogram {
    pub name: &'static str,
    pub rows: Vec<HistRow>,
}

fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

pub fn build_histograms(records: &[BattleRecord], resolved: &ResolvedStats) -> Vec<Histogram> {
    HISTOGRAMS
        .iter()
        .map(|spec| {
            let n = spec.breakpoints.len();
            let mut allies = vec![0u64; n];
            let mut enemies = vec![0u64; n];

            for record in records {
                for key in &record.allies {
                    if let Some(v) = resolved.lookup(key).and_then(|s| spec.axis.value(s)) {
                        allies[bucket_index(spec.breakpoints, v)] += 1;
                    }
                }
                for key in &record.enemies {
                    if let Some(v) = resolved.lookup(key).and_then(|s| spec.axis.value(s)) {
                        enemies[bucket_index(spec.breakpoints, v)] += 1;
                    }
                }
            }

            let allies_total: u64 = allies.iter().sum();
            let enemies_total: u64 = enemies.iter().sum();
            let grand_total = allies_total + enemies_total;

            let rows = (0..n)
                .map(|i| HistRow {
                    label: bucket_label(spec.breakpoints, i, spec.format),
                    allies: allies[i],
                    enemies: enemies[i],
                    total: allies[i] + enemies[i],
                    allies_pct: percentage(allies[i], allies_total),
                    enemies_pct: percentage(enemies[i], enemies_total),
                    total_pct: percentage(allies[i] + enemies[i], grand_total),
                })
                .collect();

            Histogram {
                name: spec.name,
                rows,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::key::StatKey;
    use std::collections::HashMap;

    use crate::refdata::{RefData, Tankopedia};
    use crate::replay::reader::ReplayReader;
    use crate::replay::types::ReplayDocument;
    use crate::RunContext;
    use std::sync::Arc;

    fn record() -> BattleRecord {
        let doc: ReplayDocument = serde_json::from_value(serde_json::json!({
            "status": "ok",
            "data": {"summary": {
                "battle_result": 1,
                "protagonist": 100,
                "allies": [100, 101],
                "enemies": [200, 201],
                "battle_start_timestamp": 1_700_000_000.0,
                "battle_duration": 300.0,
                "details": [
                    {"dbid": 100, "vehicle_descr": 1, "death_reason": -1, "hitpoints_left": 1, "time_alive": 300.0},
                    {"dbid": 101, "vehicle_descr": 1, "death_reason": -1, "time_alive": 300.0},
                    {"dbid": 200, "vehicle_descr": 1, "death_reason": 0, "time_alive": 100.0},
                    {"dbid": 201, "vehicle_descr": 1, "death_reason": 0, "time_alive": 100.0}
                ]
            }}
        }))
        .unwrap();
        let refdata = Arc::new(RefData {
            tankopedia: Tankopedia::default(),
            maps: Default::default(),
        });
        ReplayReader::new(refdata, Arc::new(RunContext::default()), None, false)
            .read(&doc)
            .unwrap()
    }

    fn resolved_for(keys: &[(StatKey, PlayerStats)]) -> ResolvedStats {
        let mut stats = HashMap::new();
        let mut remap = HashMap::new();
        for (key, value) in keys {
            let canonical = format!("{}:0", key.account);
            remap.insert(key.to_string(), canonical.clone());
            stats.insert(canonical, *value);
        }
        ResolvedStats { stats, remap }
    }

    #[test]
    fn test_histogram_counts_and_percentages() {
        let rec = record();
        let ally = rec.allies[0];
        let enemy_a = rec.enemies[0];
        let enemy_b = rec.enemies[1];
        let resolved = resolved_for(&[
            // 60% win rate → (0.55, 0.65] bucket
            (
                ally,
                PlayerStats {
                    battles: 10,
                    wins: 6,
                    damage_dealt: 10_000,
                },
            ),
            // 40% → (0.35, 0.45]
            (
                enemy_a,
                PlayerStats {
                    battles: 10,
                    wins: 4,
                    damage_dealt: 10_000,
                },
            ),
            // 70% → (0.65, )
            (
                enemy_b,
                PlayerStats {
                    battles: 10,
                    wins: 7,
                    damage_dealt: 10_000,
                },
            ),
        ]);

        let histograms = build_histograms(&[rec], &resolved);
        let wr = &histograms[0];
        assert_eq!(wr.name, "Win Rate");
        assert_eq!(wr.rows[4].allies, 1); // 55%-65%
        assert_eq!(wr.rows[1].enemies, 1); // 35%-45%
        assert_eq!(wr.rows[5].enemies, 1); // 65%-
        assert_eq!(wr.rows[4].allies_pct, 1.0);
        assert!((wr.rows[1].enemies_pct - 0.5).abs() < 1e-9);
        let total: u64 = wr.rows.iter().map(|r| r.total).sum();
        assert_eq!(total, 3);
    }
}
