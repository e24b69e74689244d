//! Reporting fields
//!
//! A field is one of count, share-of-battles, average, or ratio, with
//! a display format. Averages divide an accumulated sum by the bucket's
//! battle count at finalisation; ratios divide two accumulated sums.

use crate::replay::reader::BattleRecord;

/// A numeric accessor on an enriched battle record. `None` excludes
/// the record's contribution from sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Win,
    Survived,
    Destroyed,
    TopTier,
    TimeAlivePct,
    BattleDuration,
    DamageMade,
    DamageAssisted,
    DamageReceived,
    DamageBlocked,
    ShotsMade,
    ShotsHit,
    ShotsPen,
    ShotsSplash,
    HitsBounced,
    EnemiesDamaged,
    EnemiesDestroyed,
    EnemiesSpotted,
    BaseCapturePoints,
    BaseDefendPoints,
    WpPointsEarned,
    WpPointsStolen,
    DistanceTravelled,
    HitpointsLeft,
    BattleTier,
    TankTier,
    MasteryBadge,
    BattleType,
    RoomType,
    PlayerWins,
    PlayerBattles,
    PlayerDamage,
    AlliesWins,
    AlliesBattles,
    AlliesDamage,
    EnemiesWins,
    EnemiesBattles,
    EnemiesDamage,
    MissingStats,
    NPlayers,
}

impl Source {
    pub fn value(&self, r: &BattleRecord) -> Option<f64> {
        match self {
            Source::Win => Some(f64::from(r.win)),
            Source::Survived => Some(f64::from(r.survived)),
            Source::Destroyed => Some(f64::from(r.destroyed)),
            Source::TopTier => Some(f64::from(r.top_tier)),
            Source::TimeAlivePct => Some(r.time_alive_pct),
            Source::BattleDuration => Some(r.battle_duration),
            Source::DamageMade => Some(r.detail.damage_made),
            Source::DamageAssisted => {
                Some(r.detail.damage_assisted + r.detail.damage_assisted_track)
            }
            Source::DamageReceived => Some(r.detail.damage_received),
            Source::DamageBlocked => Some(r.detail.damage_blocked),
            Source::ShotsMade => Some(r.detail.shots_made),
            Source::ShotsHit => Some(r.detail.shots_hit),
            Source::ShotsPen => Some(r.detail.shots_pen),
            Source::ShotsSplash => Some(r.detail.shots_splash),
            Source::HitsBounced => Some(r.detail.hits_bounced),
            Source::EnemiesDamaged => Some(r.detail.enemies_damaged),
            Source::EnemiesDestroyed => Some(r.detail.enemies_destroyed),
            Source::EnemiesSpotted => Some(r.detail.enemies_spotted),
            Source::BaseCapturePoints => Some(r.detail.base_capture_points),
            Source::BaseDefendPoints => Some(r.detail.base_defend_points),
            Source::WpPointsEarned => Some(r.detail.wp_points_earned),
            Source::WpPointsStolen => Some(r.detail.wp_points_stolen),
            Source::DistanceTravelled => Some(r.detail.distance_travelled),
            Source::HitpointsLeft => Some(r.detail.hitpoints_left as f64),
            Source::BattleTier => Some(f64::from(r.battle_tier)),
            Source::TankTier => Some(f64::from(r.tank_tier)),
            Source::MasteryBadge => Some(f64::from(r.mastery_badge)),
            Source::BattleType => Some(f64::from(r.battle_type)),
            Source::RoomType => Some(f64::from(r.room_type)),
            Source::PlayerWins => r.player.wins,
            Source::PlayerBattles => r.player.battles,
            Source::PlayerDamage => r.player.damage_dealt,
            Source::AlliesWins => r.allies_avg.wins,
            Source::AlliesBattles => r.allies_avg.battles,
            Source::AlliesDamage => r.allies_avg.damage_dealt,
            Source::EnemiesWins => r.enemies_avg.wins,
            Source::EnemiesBattles => r.enemies_avg.battles,
            Source::EnemiesDamage => r.enemies_avg.damage_dealt,
            Source::MissingStats => Some(r.missing_stats as f64),
            Source::NPlayers => Some(r.n_players as f64),
        }
    }
}

/// Field classification: how contributions accumulate and finalise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// Bucket battle count.
    Count,
    /// Bucket battles divided by the category's total battles.
    Share,
    /// Accumulated sum divided by battles.
    Average(Source),
    /// Accumulated numerator sum divided by accumulated denominator
    /// sum; zero denominators finalise to +inf.
    Ratio(Source, Source),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Int,
    Float(usize),
    Percent(usize),
}

impl Format {
    pub fn render(&self, value: f64) -> String {
        if value.is_infinite() {
            return "-".to_string();
        }
        match self {
            Format::Int => format!("{:.0}", value),
            Format::Float(prec) => format!("{:.*}", prec, value),
            Format::Percent(prec) => format!("{:.*}%", prec, value * 100.0),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReportField {
    pub key: &'static str,
    pub name: &'static str,
    pub width: usize,
    pub format: Format,
    pub kind: FieldKind,
}

/// Disjoint field presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldMode {
    #[default]
    Default,
    Team,
    Extended,
}

const DEFAULT_FIELDS: &[ReportField] = &[
    ReportField {
        key: "battles",
        name: "Battles",
        width: 8,
        format: Format::Int,
        kind: FieldKind::Count,
    },
    ReportField {
        key: "battles_pct",
        name: "B%",
        width: 7,
        format: Format::Percent(0),
        kind: FieldKind::Share,
    },
    ReportField {
        key: "win",
        name: "WR",
        width: 7,
        format: Format::Percent(1),
        kind: FieldKind::Average(Source::Win),
    },
    ReportField {
        key: "damage_made",
        name: "Avg Dmg",
        width: 8,
        format: Format::Int,
        kind: FieldKind::Average(Source::DamageMade),
    },
    ReportField {
        key: "kdr",
        name: "KDR",
        width: 6,
        format: Format::Float(2),
        kind: FieldKind::Ratio(Source::EnemiesDestroyed, Source::Destroyed),
    },
    ReportField {
        key: "hit_rate",
        name: "Hit%",
        width: 7,
        format: Format::Percent(1),
        kind: FieldKind::Ratio(Source::ShotsHit, Source::ShotsMade),
    },
    ReportField {
        key: "dmg_ratio",
        name: "DR",
        width: 6,
        format: Format::Float(2),
        kind: FieldKind::Ratio(Source::DamageMade, Source::DamageReceived),
    },
    ReportField {
        key: "survived",
        name: "Surv%",
        width: 7,
        format: Format::Percent(0),
        kind: FieldKind::Average(Source::Survived),
    },
    ReportField {
        key: "time_alive_pct",
        name: "Alive%",
        width: 7,
        format: Format::Percent(0),
        kind: FieldKind::Average(Source::TimeAlivePct),
    },
    ReportField {
        key: "top_tier",
        name: "Top%",
        width: 6,
        format: Format::Percent(0),
        kind: FieldKind::Average(Source::TopTier),
    },
];

const TEAM_FIELDS: &[ReportField] = &[
    ReportField {
        key: "battles",
        name: "Battles",
        width: 8,
        format: Format::Int,
        kind: FieldKind::Count,
    },
    ReportField {
        key: "win",
        name: "WR",
        width: 7,
        format: Format::Percent(1),
        kind: FieldKind::Average(Source::Win),
    },
    ReportField {
        key: "player_wins",
        name: "Player WR",
        width: 10,
        format: Format::Percent(1),
        kind: FieldKind::Average(Source::PlayerWins),
    },
    ReportField {
        key: "allies_wins",
        name: "Allies WR",
        width: 10,
        format: Format::Percent(1),
        kind: FieldKind::Average(Source::AlliesWins),
    },
    ReportField {
        key: "enemies_wins",
        name: "Enemies WR",
        width: 11,
        format: Format::Percent(1),
        kind: FieldKind::Average(Source::EnemiesWins),
    },
    ReportField {
        key: "allies_damage",
        name: "Allies Dmg",
        width: 11,
        format: Format::Int,
        kind: FieldKind::Average(Source::AlliesDamage),
    },
    ReportField {
        key: "enemies_damage",
        name: "Enemies Dmg",
        width: 12,
        format: Format::Int,
        kind: FieldKind::Average(Source::EnemiesDamage),
    },
    ReportField {
        key: "allies_battles",
        name: "Allies Btls",
        width: 12,
        format: Format::Int,
        kind: FieldKind::Average(Source::AlliesBattles),
    },
    ReportField {
        key: "enemies_battles",
        name: "Enemies Btls",
        width: 13,
        format: Format::Int,
        kind: FieldKind::Average(Source::EnemiesBattles),
    },
    ReportField {
        key: "missing_rate",
        name: "Missing%",
        width: 9,
        format: Format::Percent(1),
        kind: FieldKind::Ratio(Source::MissingStats, Source::NPlayers),
    },
];

const EXTENDED_FIELDS: &[ReportField] = &[
    ReportField {
        key: "battles",
        name: "Battles",
        width: 8,
        format: Format::Int,
        kind: FieldKind::Count,
    },
    ReportField {
        key: "win",
        name: "WR",
        width: 7,
        format: Format::Percent(1),
        kind: FieldKind::Average(Source::Win),
    },
    ReportField {
        key: "damage_assisted",
        name: "Assist",
        width: 7,
        format: Format::Int,
        kind: FieldKind::Average(Source::DamageAssisted),
    },
    ReportField {
        key: "damage_blocked",
        name: "Blocked",
        width: 8,
        format: Format::Int,
        kind: FieldKind::Average(Source::DamageBlocked),
    },
    ReportField {
        key: "pen_rate",
        name: "Pen%",
        width: 7,
        format: Format::Percent(1),
        kind: FieldKind::Ratio(Source::ShotsPen, Source::ShotsHit),
    },
    ReportField {
        key: "spotted",
        name: "Spotted",
        width: 8,
        format: Format::Float(1),
        kind: FieldKind::Average(Source::EnemiesSpotted),
    },
    ReportField {
        key: "distance",
        name: "Distance",
        width: 9,
        format: Format::Int,
        kind: FieldKind::Average(Source::DistanceTravelled),
    },
    ReportField {
        key: "capture",
        name: "Cap",
        width: 6,
        format: Format::Float(1),
        kind: FieldKind::Average(Source::BaseCapturePoints),
    },
    ReportField {
        key: "defend",
        name: "Def",
        width: 6,
        format: Format::Float(1),
        kind: FieldKind::Average(Source::BaseDefendPoints),
    },
    ReportField {
        key: "wp_earned",
        name: "WP+",
        width: 6,
        format: Format::Float(1),
        kind: FieldKind::Average(Source::WpPointsEarned),
    },
    ReportField {
        key: "wp_stolen",
        name: "WP-",
        width: 6,
        format: Format::Float(1),
        kind: FieldKind::Average(Source::WpPointsStolen),
    },
];

pub fn fields_for(mode: FieldMode) -> &'static [ReportField] {
    match mode {
        FieldMode::Default => DEFAULT_FIELDS,
        FieldMode::Team => TEAM_FIELDS,
        FieldMode::Extended => EXTENDED_FIELDS,
    }
}
