//! Vendor API data types

use serde::{Deserialize, Serialize};

use crate::refdata::{AccountId, TankId};

/// Regional API servers, selected by account-id range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Ru,
    Eu,
    Na,
    Asia,
}

impl Region {
    /// Half-open account-id ranges per regional shard.
    pub fn from_account_id(account_id: AccountId) -> Option<Region> {
        match account_id {
            0..=499_999_999 => Some(Region::Ru),
            500_000_000..=999_999_999 => Some(Region::Eu),
            1_000_000_000..=1_999_999_999 => Some(Region::Na),
            2_000_000_000..=3_999_999_999 => Some(Region::Asia),
            _ => None,
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Region::Ru => "https://api.wotblitz.ru/wotb",
            Region::Eu => "https://api.wotblitz.eu/wotb",
            Region::Na => "https://api.wotblitz.com/wotb",
            Region::Asia => "https://api.wotblitz.asia/wotb",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Ru => "ru",
            Region::Eu => "eu",
            Region::Na => "na",
            Region::Asia => "asia",
        }
    }

    pub fn parse(s: &str) -> Option<Region> {
        match s.to_ascii_lowercase().as_str() {
            "ru" => Some(Region::Ru),
            "eu" => Some(Region::Eu),
            "na" | "com" => Some(Region::Na),
            "asia" => Some(Region::Asia),
            _ => None,
        }
    }
}

/// Top-level envelope shared by every vendor endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    pub status: String,
    #[serde(default)]
    pub error: Option<ApiError>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

/// Career counters for one player, either overall or for one tank.
///
/// `battles == 0` means the vendor has never seen the player fight;
/// such records carry no usable averages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    #[serde(default)]
    pub battles: u64,
    #[serde(default)]
    pub wins: u64,
    #[serde(default)]
    pub damage_dealt: u64,
}

impl PlayerStats {
    pub fn is_empty(&self) -> bool {
        self.battles == 0
    }

    /// Win ratio in `[0, 1]`; `None` without battles.
    pub fn win_rate(&self) -> Option<f64> {
        if self.battles == 0 {
            None
        } else {
            Some(self.wins as f64 / self.battles as f64)
        }
    }

    /// Average damage per battle; `None` without battles.
    pub fn avg_damage(&self) -> Option<f64> {
        if self.battles == 0 {
            None
        } else {
            Some(self.damage_dealt as f64 / self.battles as f64)
        }
    }

    pub fn add(&mut self, other: &PlayerStats) {
        self.battles += other.battles;
        self.wins += other.wins;
        self.damage_dealt += other.damage_dealt;
    }

    /// Value of one team field in its reported form (ratios for wins
    /// and damage, raw count for battles).
    pub fn field(&self, field: TeamField) -> Option<f64> {
        match field {
            TeamField::Wins => self.win_rate(),
            TeamField::Battles => Some(self.battles as f64),
            TeamField::DamageDealt => self.avg_damage(),
        }
    }
}

/// The stat fields folded into each battle per team side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeamField {
    Wins,
    Battles,
    DamageDealt,
}

impl TeamField {
    pub const ALL: [TeamField; 3] = [TeamField::Wins, TeamField::Battles, TeamField::DamageDealt];

    pub fn as_str(&self) -> &'static str {
        match self {
            TeamField::Wins => "wins",
            TeamField::Battles => "battles",
            TeamField::DamageDealt => "damage_dealt",
        }
    }
}

/// `account/info` payload: statistics block per account id.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub statistics: Option<AccountStatistics>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountStatistics {
    pub all: PlayerStats,
}

/// One element of the `tanks/stats` payload list.
#[derive(Debug, Clone, Deserialize)]
pub struct TankStatsEntry {
    pub tank_id: TankId,
    pub all: PlayerStats,
}

/// `account/list` payload element (nickname search).
#[derive(Debug, Clone, Deserialize)]
pub struct AccountListEntry {
    pub nickname: String,
    pub account_id: AccountId,
}

/// `clans/accountinfo` payload element.
#[derive(Debug, Clone, Deserialize)]
pub struct ClanAccountInfo {
    pub account_id: AccountId,
    #[serde(default)]
    pub clan_id: Option<u64>,
    #[serde(default)]
    pub clan: Option<ClanInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClanInfo {
    pub name: String,
    pub tag: String,
    #[serde(default)]
    pub members_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_routing_boundaries() {
        let cases: [(AccountId, Region); 8] = [
            (1, Region::Ru),
            (499_999_999, Region::Ru),
            (500_000_000, Region::Eu),
            (999_999_999, Region::Eu),
            (1_000_000_000, Region::Na),
            (1_999_999_999, Region::Na),
            (2_000_000_000, Region::Asia),
            (3_999_999_999, Region::Asia),
        ];
        for (id, region) in cases {
            assert_eq!(Region::from_account_id(id), Some(region), "account {}", id);
        }
        assert_eq!(Region::from_account_id(4_000_000_000), None);
    }

    #[test]
    fn test_region_parse() {
        assert_eq!(Region::parse("EU"), Some(Region::Eu));
        assert_eq!(Region::parse("com"), Some(Region::Na));
        assert_eq!(Region::parse("mars"), None);
    }

    #[test]
    fn test_player_stats_ratios() {
        let stats = PlayerStats {
            battles: 10,
            wins: 6,
            damage_dealt: 15_000,
        };
        assert_eq!(stats.win_rate(), Some(0.6));
        assert_eq!(stats.avg_damage(), Some(1500.0));
        assert_eq!(stats.field(TeamField::Battles), Some(10.0));
    }

    #[test]
    fn test_empty_stats_have_no_ratios() {
        let stats = PlayerStats::default();
        assert!(stats.is_empty());
        assert_eq!(stats.win_rate(), None);
        assert_eq!(stats.avg_damage(), None);
    }
}
