//! Stat keys and canonicalisation
//!
//! A raw key identifies one participant of one battle:
//! `account:tank:battletime`. Canonical keys bucketise the battle time
//! into 14-day windows and, depending on the selected mode, project
//! the tank down to its tier, so many raw keys can share one fetched
//! stats record.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::refdata::{AccountId, TankId, Tankopedia};

/// 14 days, the width of a battle-time bucket.
pub const BUCKET_SECS: u64 = 1_209_600;

/// Floor a battle timestamp to its bucket start.
pub fn bucket(battle_time: u64) -> u64 {
    battle_time / BUCKET_SECS * BUCKET_SECS
}

/// Key-canonicalisation mode, selectable at configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatsMode {
    /// Canonical key `account:bucket`; stats are the player's overall career.
    #[default]
    Player,
    /// Canonical key `account:tier:bucket`; stats are the player's
    /// career over all tanks of the battle tier.
    TankTier,
}

impl StatsMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatsMode::Player => "player",
            StatsMode::TankTier => "tank_tier",
        }
    }
}

/// Raw per-participant key: `account:tank:battletime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatKey {
    pub account: AccountId,
    pub tank_id: TankId,
    pub battle_time: u64,
}

impl StatKey {
    pub fn new(account: AccountId, tank_id: TankId, battle_time: u64) -> Self {
        Self {
            account,
            tank_id,
            battle_time,
        }
    }

    /// Project onto the canonical key for the given mode.
    pub fn canonical(&self, mode: StatsMode, tankopedia: &Tankopedia) -> CanonicalKey {
        match mode {
            StatsMode::Player => CanonicalKey {
                account: self.account,
                tier: None,
                bucket: bucket(self.battle_time),
            },
            StatsMode::TankTier => CanonicalKey {
                account: self.account,
                tier: Some(tankopedia.tier(self.tank_id)),
                bucket: bucket(self.battle_time),
            },
        }
    }
}

impl fmt::Display for StatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.account, self.tank_id, self.battle_time)
    }
}

impl FromStr for StatKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let parse = |part: Option<&str>| -> Result<u64, Error> {
            part.and_then(|p| p.parse().ok())
                .ok_or_else(|| Error::Schema(format!("malformed stat key '{}'", s)))
        };
        let account = parse(parts.next())?;
        let tank_id = parse(parts.next())? as TankId;
        let battle_time = parse(parts.next())?;
        if parts.next().is_some() {
            return Err(Error::Schema(format!("malformed stat key '{}'", s)));
        }
        Ok(StatKey::new(account, tank_id, battle_time))
    }
}

/// Canonical key, the identity stats are fetched and cached under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanonicalKey {
    pub account: AccountId,
    /// Set in `tank_tier` mode only.
    pub tier: Option<u8>,
    pub bucket: u64,
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tier {
            Some(tier) => write!(f, "{}:{}:{}", self.account, tier, self.bucket),
            None => write!(f, "{}:{}", self.account, self.bucket),
        }
    }
}
