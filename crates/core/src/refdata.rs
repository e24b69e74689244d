//! Reference data: tankopedia and map names
//!
//! Loaded once from JSON files at startup and immutable afterwards.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub type AccountId = u64;
pub type TankId = u32;

/// One of the nine vehicle nations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nation {
    Ussr,
    Germany,
    Usa,
    China,
    France,
    Uk,
    Japan,
    European,
    Other,
}

impl Nation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Nation::Ussr => "ussr",
            Nation::Germany => "germany",
            Nation::Usa => "usa",
            Nation::China => "china",
            Nation::France => "france",
            Nation::Uk => "uk",
            Nation::Japan => "japan",
            Nation::European => "european",
            Nation::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TankType {
    #[serde(rename = "lightTank")]
    Light,
    #[serde(rename = "mediumTank")]
    Medium,
    #[serde(rename = "heavyTank")]
    Heavy,
    #[serde(rename = "AT-SPG")]
    TankDestroyer,
}

impl TankType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TankType::Light => "Light Tank",
            TankType::Medium => "Medium Tank",
            TankType::Heavy => "Heavy Tank",
            TankType::TankDestroyer => "Tank Destroyer",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tank {
    pub tank_id: TankId,
    pub tier: u8,
    pub name: String,
    pub nation: Nation,
    #[serde(rename = "type")]
    pub tank_type: TankType,
    #[serde(default)]
    pub is_premium: bool,
}

/// Wire shape of `tanks.json`.
#[derive(Debug, Deserialize)]
struct TankopediaFile {
    status: String,
    #[serde(default)]
    meta: Option<TankopediaMeta>,
    data: HashMap<String, Tank>,
}

#[derive(Debug, Deserialize)]
struct TankopediaMeta {
    #[serde(default)]
    count: usize,
}

/// Immutable tank lookup table with a grouped-by-tier index.
#[derive(Debug, Default)]
pub struct Tankopedia {
    tanks: HashMap<TankId, Tank>,
    by_tier: HashMap<u8, Vec<TankId>>,
}

impl Tankopedia {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!(
                "cannot read tankopedia {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_str(&contents)
    }

    pub fn from_str(contents: &str) -> Result<Self> {
        let file: TankopediaFile = serde_json::from_str(contents)?;
        if file.status != "ok" {
            return Err(Error::Config(format!(
                "tankopedia status is '{}', expected 'ok'",
                file.status
            )));
        }
        if let Some(meta) = &file.meta {
            if meta.count != 0 && meta.count != file.data.len() {
                tracing::warn!(
                    declared = meta.count,
                    actual = file.data.len(),
                    "tankopedia meta.count does not match data"
                );
            }
        }

        let mut ref_data = Self::default();
        for tank in file.data.into_values() {
            ref_data.insert(tank);
        }
        Ok(ref_data)
    }

    fn insert(&mut self, tank: Tank) {
        self.by_tier.entry(tank.tier).or_default().push(tank.tank_id);
        self.tanks.insert(tank.tank_id, tank);
    }

    /// Merge pre-extracted tank definitions, e.g. from a game-archive
    /// extraction run. Later entries win on id collision.
    pub fn merge<I: IntoIterator<Item = Tank>>(&mut self, tanks: I) {
        for tank in tanks {
            if let Some(old) = self.tanks.remove(&tank.tank_id) {
                if let Some(ids) = self.by_tier.get_mut(&old.tier) {
                    ids.retain(|id| *id != old.tank_id);
                }
            }
            self.insert(tank);
        }
    }

    pub fn get(&self, tank_id: TankId) -> Option<&Tank> {
        self.tanks.get(&tank_id)
    }

    /// Tier of a tank; 0 when the tank is unknown.
    pub fn tier(&self, tank_id: TankId) -> u8 {
        self.tanks.get(&tank_id).map(|t| t.tier).unwrap_or(0)
    }

    pub fn name(&self, tank_id: TankId) -> Option<&str> {
        self.tanks.get(&tank_id).map(|t| t.name.as_str())
    }

    /// All tank ids of a tier, unordered.
    pub fn by_tier(&self, tier: u8) -> &[TankId] {
        self.by_tier.get(&tier).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.tanks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tanks.is_empty()
    }
}

/// Map code → human-readable name, from `maps.json`.
#[derive(Debug, Default)]
pub struct MapNames {
    names: HashMap<String, String>,
}

impl MapNames {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!(
                "cannot read map names {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let names: HashMap<String, String> = serde_json::from_str(&contents)?;
        Ok(Self { names })
    }

    /// Resolve a map code; falls back to the code itself when unknown.
    pub fn resolve<'a>(&'a self, code: &'a str) -> &'a str {
        self.names.get(code).map(String::as_str).unwrap_or(code)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Everything the pipeline needs to look up, bundled for sharing.
#[derive(Debug, Default)]
pub struct RefData {
    pub tankopedia: Tankopedia,
    pub maps: MapNames,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TANKS: &str = r#"{
        "status": "ok",
        "meta": { "count": 3 },
        "data": {
            "1": {"tank_id": 1, "tier": 5, "name": "T-34", "nation": "ussr", "type": "mediumTank", "is_premium": false},
            "2": {"tank_id": 2, "tier": 5, "name": "Pz.Kpfw. IV", "nation": "germany", "type": "mediumTank", "is_premium": false},
            "3": {"tank_id": 3, "tier": 8, "name": "IS-6", "nation": "ussr", "type": "heavyTank", "is_premium": true}
        }
    }"#;

    #[test]
    fn test_load_tankopedia() {
        let tp = Tankopedia::from_str(SAMPLE_TANKS).unwrap();
        assert_eq!(tp.len(), 3);
        assert_eq!(tp.tier(1), 5);
        assert_eq!(tp.name(3), Some("IS-6"));
        assert!(tp.get(3).unwrap().is_premium);
    }

    #[test]
    fn test_tier_index() {
        let tp = Tankopedia::from_str(SAMPLE_TANKS).unwrap();
        let mut tier5 = tp.by_tier(5).to_vec();
        tier5.sort();
        assert_eq!(tier5, vec![1, 2]);
        assert_eq!(tp.by_tier(9), &[] as &[TankId]);
    }

    #[test]
    fn test_unknown_tank_is_tier_zero() {
        let tp = Tankopedia::from_str(SAMPLE_TANKS).unwrap();
        assert_eq!(tp.tier(999), 0);
        assert_eq!(tp.name(999), None);
    }

    #[test]
    fn test_bad_status_rejected() {
        let result = Tankopedia::from_str(r#"{"status": "error", "data": {}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_replaces_tier_index() {
        let mut tp = Tankopedia::from_str(SAMPLE_TANKS).unwrap();
        tp.merge(vec![Tank {
            tank_id: 1,
            tier: 6,
            name: "T-34-85".to_string(),
            nation: Nation::Ussr,
            tank_type: TankType::Medium,
            is_premium: false,
        }]);
        assert_eq!(tp.tier(1), 6);
        assert!(!tp.by_tier(5).contains(&1));
        assert!(tp.by_tier(6).contains(&1));
    }

    #[test]
    fn test_map_names_fallback() {
        let maps = MapNames {
            names: HashMap::from([("desert_sands".to_string(), "Desert Sands".to_string())]),
        };
        assert_eq!(maps.resolve("desert_sands"), "Desert Sands");
        assert_eq!(maps.resolve("unknown_map"), "unknown_map");
    }
}
