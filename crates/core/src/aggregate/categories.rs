//! Category axes
//!
//! Each category partitions battles into buckets: a single total
//! bucket, an enumerated label list, one bucket per distinct number or
//! string, or breakpoint-bucketed numeric values. Rows sort by integer
//! value for numeric categories, in breakpoint order for bucketed
//! ones, and case-insensitively otherwise.

use tracing::warn;

use super::fields::Source;
use crate::replay::reader::BattleRecord;

/// String-valued accessors for string categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrSource {
    MapName,
    TankName,
    TeamResult,
    PlayerName,
}

impl StrSource {
    fn value(&self, r: &BattleRecord) -> Option<String> {
        let s = match self {
            StrSource::MapName => &r.map_name,
            StrSource::TankName => &r.tank_name,
            StrSource::TeamResult => &r.team_result,
            StrSource::PlayerName => &r.player_name,
        };
        if s.is_empty() {
            None
        } else {
            Some(s.clone())
        }
    }
}

/// How bucket boundary labels are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketFormat {
    Percent,
    Ratio,
    Raw,
}

impl BucketFormat {
    fn render(&self, v: f64) -> String {
        match self {
            BucketFormat::Percent => format!("{:.0}%", v * 100.0),
            BucketFormat::Ratio => format!("{:.2}", v),
            BucketFormat::Raw => format!("{:.0}", v),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum CategoryKind {
    Total,
    /// Integer source indexing into the label list.
    Enum {
        source: Source,
        labels: &'static [&'static str],
    },
    /// One bucket per distinct integer value.
    Numeric { source: Source },
    /// One bucket per distinct string.
    Str { source: StrSource },
    /// Numeric value bucketed by ascending breakpoints; bucket `i`
    /// covers `(bp[i], bp[i+1]]`, the last one is open-ended.
    Bucket {
        source: Source,
        breakpoints: &'static [f64],
        format: BucketFormat,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct Category {
    pub key: &'static str,
    pub name: &'static str,
    pub kind: CategoryKind,
}

/// Sort key for output rows within one category.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SortKey {
    Index(usize),
    Int(i64),
    Str(String),
}

/// Place a value among breakpoints: the largest bucket whose lower
/// boundary is strictly below the value, clamped to the first bucket.
pub fn bucket_index(breakpoints: &[f64], value: f64) -> usize {
    let below = breakpoints.iter().filter(|bp| **bp < value).count();
    below.max(1) - 1
}

pub fn bucket_label(breakpoints: &[f64], index: usize, format: BucketFormat) -> String {
    let low = format.render(breakpoints[index]);
    match breakpoints.get(index + 1) {
        Some(high) => format!("{}-{}", low, format.render(*high)),
        None => format!("{}-", low),
    }
}

impl Category {
    /// Bucket for one record: `(sort key, label)`, or `None` when the
    /// record has no value on this axis.
    pub fn categorize(&self, r: &BattleRecord) -> Option<(SortKey, String)> {
        match self.kind {
            CategoryKind::Total => Some((SortKey::Index(0), "Total".to_string())),
            CategoryKind::Enum { source, labels } => {
                let v = source.value(r)?;
                if !v.is_finite() || v < 0.0 {
                    return None;
                }
                let idx = v as usize;
                let label = labels.get(idx).copied().unwrap_or("?");
                Some((SortKey::Index(idx), label.to_string()))
            }
            CategoryKind::Numeric { source } => {
                let v = source.value(r)?;
                if !v.is_finite() {
                    return None;
                }
                let n = v as i64;
                Some((SortKey::Int(n), n.to_string()))
            }
            CategoryKind::Str { source } => {
                let s = source.value(r)?;
                Some((SortKey::Str(s.to_lowercase()), s))
            }
            CategoryKind::Bucket {
                source,
                breakpoints,
                format,
            } => {
                let v = source.value(r)?;
                if !v.is_finite() {
                    return None;
                }
                let idx = bucket_index(breakpoints, v);
                Some((SortKey::Index(idx), bucket_label(breakpoints, idx, format)))
            }
        }
    }
}

const WIN_RATE_BREAKS: &[f64] = &[0.0, 0.35, 0.45, 0.50, 0.55, 0.65];
const AVG_DAMAGE_BREAKS: &[f64] = &[0.0, 500.0, 1000.0, 1500.0, 2000.0];

const BATTLE_TYPES: &[&str] = &["Any", "Regular", "Training", "Tournament", "Rating"];
const ROOM_TYPES: &[&str] = &["Any", "Regular", "Training", "Tournament", "Tournament", "Tournament", "Tournament", "Rating"];
const TOP_TIER: &[&str] = &["Bottom tier", "Top tier"];
const MASTERY: &[&str] = &["-", "3rd Class", "2nd Class", "1st Class", "Mastery"];

/// Canonical category catalog; selection preserves this order.
pub const CATALOG: &[Category] = &[
    Category {
        key: "total",
        name: "Total",
        kind: CategoryKind::Total,
    },
    Category {
        key: "battle_type",
        name: "Battle Type",
        kind: CategoryKind::Enum {
            source: Source::BattleType,
            labels: BATTLE_TYPES,
        },
    },
    Category {
        key: "room_type",
        name: "Room Type",
        kind: CategoryKind::Enum {
            source: Source::RoomType,
            labels: ROOM_TYPES,
        },
    },
    Category {
        key: "map",
        name: "Map",
        kind: CategoryKind::Str {
            source: StrSource::MapName,
        },
    },
    Category {
        key: "tank",
        name: "Tank",
        kind: CategoryKind::Str {
            source: StrSource::TankName,
        },
    },
    Category {
        key: "tier",
        name: "Tank Tier",
        kind: CategoryKind::Numeric {
            source: Source::TankTier,
        },
    },
    Category {
        key: "battle_tier",
        name: "Battle Tier",
        kind: CategoryKind::Numeric {
            source: Source::BattleTier,
        },
    },
    Category {
        key: "top_tier",
        name: "Top Tier",
        kind: CategoryKind::Enum {
            source: Source::TopTier,
            labels: TOP_TIER,
        },
    },
    Category {
        key: "mastery",
        name: "Mastery Badge",
        kind: CategoryKind::Enum {
            source: Source::MasteryBadge,
            labels: MASTERY,
        },
    },
    Category {
        key: "team_result",
        name: "Team Result",
        kind: CategoryKind::Str {
            source: StrSource::TeamResult,
        },
    },
    Category {
        key: "allies_wins",
        name: "Allies Win Rate",
        kind: CategoryKind::Bucket {
            source: Source::AlliesWins,
            breakpoints: WIN_RATE_BREAKS,
            format: BucketFormat::Percent,
        },
    },
    Category {
        key: "enemies_wins",
        name: "Enemies Win Rate",
        kind: CategoryKind::Bucket {
            source: Source::EnemiesWins,
            breakpoints: WIN_RATE_BREAKS,
            format: BucketFormat::Percent,
        },
    },
    Category {
        key: "allies_damage",
        name: "Allies Avg Damage",
        kind: CategoryKind::Bucket {
            source: Source::AlliesDamage,
            breakpoints: AVG_DAMAGE_BREAKS,
            format: BucketFormat::Raw,
        },
    },
    Category {
        key: "enemies_damage",
        name: "Enemies Avg Damage",
        kind: CategoryKind::Bucket {
            source: Source::EnemiesDamage,
            breakpoints: AVG_DAMAGE_BREAKS,
            format: BucketFormat::Raw,
        },
    },
];

const DEFAULT_KEYS: &[&str] = &["total"];

/// Resolve the category selection: the default set plus `extra`, or
/// `extra` alone with `only_extra`. Unknown names warn and drop;
/// duplicates collapse; canonical catalog order is preserved.
pub fn select_categories(extra: &[String], only_extra: bool) -> Vec<&'static Category> {
    let mut wanted: Vec<&str> = if only_extra {
        Vec::new()
    } else {
        DEFAULT_KEYS.to_vec()
    };
    for name in extra {
        wanted.push(name.as_str());
    }

    for name in &wanted {
        if !CATALOG.iter().any(|c| c.key == *name) {
            warn!(category = name, "unknown category, ignoring");
        }
    }

    CATALOG
        .iter()
        .filter(|c| wanted.contains(&c.key))
        .collect()
}
