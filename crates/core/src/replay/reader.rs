//! Battle-record normalisation
//!
//! Turns one replay document into a subject-oriented `BattleRecord`:
//! resolves the subject (swapping teams when the subject fought on the
//! enemy side), copies the summary and measurement fields, removes the
//! platoon mate from the ally set, and derives the per-battle metrics.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::types::{ReplayDetail, ReplayDocument};
use crate::refdata::{AccountId, RefData};
use crate::stats::key::StatKey;
use crate::RunContext;

pub const RESULT_LOSS: i32 = 0;
pub const RESULT_WIN: i32 = 1;
pub const RESULT_DRAW: i32 = 2;

/// Per-side stat averages folded in by the team enricher. `None`
/// means "no resolved players on that side", which the aggregator
/// excludes rather than treating as zero.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TeamValues {
    pub wins: Option<f64>,
    pub battles: Option<f64>,
    pub damage_dealt: Option<f64>,
}

/// One normalised battle, oriented around the subject player.
#[derive(Debug, Clone)]
pub struct BattleRecord {
    // identity
    pub player_name: String,
    pub account_id: AccountId,
    pub tank_id: u32,
    pub tank_tier: u8,
    pub tank_name: String,
    pub battle_start_timestamp: u64,
    /// Monotonic per-run index, assigned as records leave the reader.
    pub battle_i: u32,
    pub url: Option<String>,
    pub title: Option<String>,

    // outcome
    pub battle_result: i32,
    pub win: u8,
    pub battle_type: i32,
    pub room_type: i32,
    pub mastery_badge: i32,
    pub map_name: String,
    pub battle_duration: f64,
    pub battle_tier: u8,
    pub top_tier: u8,
    pub survived: u8,
    pub destroyed: u8,
    pub time_alive_pct: f64,

    /// The subject's measurement block, copied from its details entry.
    pub detail: ReplayDetail,

    // teams (subject and platoon mate excluded from allies)
    pub allies: Vec<StatKey>,
    pub enemies: Vec<StatKey>,
    pub allies_survived: u32,
    pub enemies_survived: u32,

    // populated by the team enricher
    pub player: TeamValues,
    pub allies_avg: TeamValues,
    pub enemies_avg: TeamValues,
    pub team_result: String,
    pub n_players: usize,
    pub missing_stats: usize,
}

impl BattleRecord {
    /// Raw stat key of the subject player itself.
    pub fn subject_key(&self) -> StatKey {
        StatKey::new(self.account_id, self.tank_id, self.battle_start_timestamp)
    }

    /// All raw keys this record needs resolved: both teams plus the
    /// subject.
    pub fn required_keys(&self) -> impl Iterator<Item = StatKey> + '_ {
        self.allies
            .iter()
            .chain(self.enemies.iter())
            .copied()
            .chain(std::iter::once(self.subject_key()))
    }
}

pub struct ReplayReader {
    refdata: Arc<RefData>,
    ctx: Arc<RunContext>,
    subject: Option<AccountId>,
    include_url: bool,
}

impl ReplayReader {
    pub fn new(
        refdata: Arc<RefData>,
        ctx: Arc<RunContext>,
        subject: Option<AccountId>,
        include_url: bool,
    ) -> Self {
        Self {
            refdata,
            ctx,
            subject,
            include_url,
        }
    }

    /// Normalise one replay document. `None` means the document failed
    /// the schema check; the caller counts it as a skip.
    pub fn read(&self, doc: &ReplayDocument) -> Option<BattleRecord> {
        let summary = doc.summary()?;
        let protagonist = summary.protagonist?;

        // Resolve the subject and orient the teams around it.
        let mut allies: HashSet<AccountId> = summary.allies.iter().copied().collect();
        let mut enemies: HashSet<AccountId> = summary.enemies.iter().copied().collect();
        let mut battle_result = summary.battle_result;

        let subject = match self.subject {
            None => protagonist,
            Some(id) if id == protagonist || allies.contains(&id) => id,
            Some(id) if enemies.contains(&id) => {
                std::mem::swap(&mut allies, &mut enemies);
                if battle_result != RESULT_DRAW {
                    battle_result = match battle_result {
                        RESULT_WIN => RESULT_LOSS,
                        _ => RESULT_WIN,
                    };
                }
                id
            }
            Some(id) => {
                // Subject not in this battle at all; re-anchor on the
                // protagonist rather than dropping the replay.
                debug!(subject = id, protagonist, "subject absent, using protagonist");
                protagonist
            }
        };

        let battle_start = summary.battle_start_timestamp as u64;

        let mut record = BattleRecord {
            player_name: summary.player_name.clone(),
            account_id: subject,
            tank_id: 0,
            tank_tier: 0,
            tank_name: String::new(),
            battle_start_timestamp: battle_start,
            battle_i: 0,
            url: if self.include_url {
                summary.view_url.clone()
            } else {
                None
            },
            title: summary.title.clone(),
            battle_result,
            win: 0,
            battle_type: summary.battle_type,
            room_type: summary.room_type,
            mastery_badge: summary.mastery_badge,
            map_name: self.refdata.maps.resolve(&summary.map_name).to_string(),
            battle_duration: summary.battle_duration,
            battle_tier: 0,
            top_tier: 0,
            survived: 0,
            destroyed: 0,
            time_alive_pct: 0.0,
            detail: ReplayDetail::default(),
            allies: Vec::new(),
            enemies: Vec::new(),
            allies_survived: 0,
            enemies_survived: 0,
            player: TeamValues::default(),
            allies_avg: TeamValues::default(),
            enemies_avg: TeamValues::default(),
            team_result: String::new(),
            n_players: 0,
            missing_stats: 0,
        };

        let mut subject_squad: Option<u32> = None;
        for detail in &summary.details {
            record.battle_duration = record.battle_duration.max(detail.time_alive);
            record.battle_tier = record
                .battle_tier
                .max(self.refdata.tankopedia.tier(detail.vehicle_descr));

            if detail.dbid == subject {
                record.detail = detail.clone();
                record.tank_id = detail.vehicle_descr;
                record.tank_tier = self.refdata.tankopedia.tier(detail.vehicle_descr);
                record.tank_name = self
                    .refdata
                    .tankopedia
                    .name(detail.vehicle_descr)
                    .unwrap_or_default()
                    .to_string();
                record.survived = u8::from(detail.hitpoints_left > 0);
                record.destroyed = u8::from(detail.hitpoints_left <= 0);
                subject_squad = detail.squad_index.filter(|s| *s > 0);
                if detail.survived() {
                    record.allies_survived += 1;
                }
                continue;
            }

            let key = StatKey::new(detail.dbid, detail.vehicle_descr, battle_start);
            if allies.contains(&detail.dbid) {
                record.allies.push(key);
                if detail.survived() {
                    record.allies_survived += 1;
                }
            } else if enemies.contains(&detail.dbid) {
                record.enemies.push(key);
                if detail.survived() {
                    record.enemies_survived += 1;
                }
            }
        }

        // Platoon filter: drop the one ally sharing the subject's squad.
        // Squad indices are per-team, so an enemy platoon may carry the
        // same index; only ally entries count.
        if let Some(squad) = subject_squad {
            if let Some(mate) = summary.details.iter().find(|d| {
                d.dbid != subject && allies.contains(&d.dbid) && d.squad_index == Some(squad)
            }) {
                record.allies.retain(|k| k.account != mate.dbid);
            }
        }

        record.time_alive_pct = if record.battle_duration > 0.0 {
            record.detail.time_alive / record.battle_duration
        } else {
            f64::INFINITY
        };
        record.top_tier = u8::from(record.battle_tier == record.tank_tier);
        record.win = u8::from(record.battle_result == RESULT_WIN);
        record.battle_i = self.ctx.next_battle_i();

        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refdata::Tankopedia;

    fn refdata() -> Arc<RefData> {
        let tankopedia = Tankopedia::from_str(
            r#"{"status": "ok", "data": {
                "10": {"tank_id": 10, "tier": 5, "name": "T-34", "nation": "ussr", "type": "mediumTank"},
                "11": {"tank_id": 11, "tier": 6, "name": "KV-2", "nation": "ussr", "type": "heavyTank"},
                "12": {"tank_id": 12, "tier": 5, "name": "M4", "nation": "usa", "type": "mediumTank"}
            }}"#,
        )
        .unwrap();
        Arc::new(RefData {
            tankopedia,
            maps: Default::default(),
        })
    }

    fn reader(subject: Option<AccountId>) -> ReplayReader {
        ReplayReader::new(refdata(), Arc::new(RunContext::default()), subject, false)
    }

    fn detail(dbid: AccountId, tank: u32, time_alive: f64, death_reason: i32) -> serde_json::Value {
        serde_json::json!({
            "dbid": dbid,
            "vehicle_descr": tank,
            "death_reason": death_reason,
            "hitpoints_left": if death_reason == -1 { 100 } else { 0 },
            "time_alive": time_alive,
            "damage_made": 500.0,
            "shots_made": 10.0,
            "shots_hit": 7.0
        })
    }

    fn document(
        protagonist: AccountId,
        allies: &[AccountId],
        enemies: &[AccountId],
        battle_result: i32,
        details: Vec<serde_json::Value>,
    ) -> ReplayDocument {
        serde_json::from_value(serde_json::json!({
            "status": "ok",
            "data": {"summary": {
                "battle_result": battle_result,
                "battle_type": 1,
                "room_type": 1,
                "map_name": "desert_sands",
                "battle_duration": 0.0,
                "protagonist": protagonist,
                "player_name": "tester",
                "mastery_badge": 0,
                "allies": allies,
                "enemies": enemies,
                "battle_start_timestamp": 1_700_000_000.0,
                "details": details
            }}
        }))
        .unwrap()
    }

    #[test]
    fn test_protagonist_record() {
        let doc = document(
            100,
            &[100, 101],
            &[200, 201],
            RESULT_WIN,
            vec![
                detail(100, 10, 300.0, -1),
                detail(101, 11, 250.0, 0),
                detail(200, 12, 280.0, 0),
                detail(201, 11, 310.0, -1),
            ],
        );
        let record = reader(None).read(&doc).unwrap();

        assert_eq!(record.account_id, 100);
        assert_eq!(record.battle_result, RESULT_WIN);
        assert_eq!(record.win, 1);
        assert_eq!(record.tank_id, 10);
        assert_eq!(record.tank_tier, 5);
        assert_eq!(record.battle_tier, 6);
        assert_eq!(record.top_tier, 0);
        assert_eq!(record.battle_duration, 310.0);
        assert_eq!(record.allies.len(), 1);
        assert_eq!(record.enemies.len(), 2);
        // subject is in neither team set
        assert!(record.allies.iter().all(|k| k.account != 100));
        assert!(record.enemies.iter().all(|k| k.account != 100));
        assert_eq!(record.allies_survived, 1);
        assert_eq!(record.enemies_survived, 1);
        assert_eq!(record.detail.damage_made, 500.0);
    }

    #[test]
    fn test_subject_on_enemy_team_swaps() {
        // protagonist=A(100), allies=[A,B], enemies=[C,D], result=win;
        // reading for subject C must invert the result and flip teams.
        let doc = document(
            100,
            &[100, 101],
            &[200, 201],
            RESULT_WIN,
            vec![
                detail(100, 10, 300.0, -1),
                detail(101, 11, 250.0, 0),
                detail(200, 12, 280.0, 0),
                detail(201, 11, 310.0, -1),
            ],
        );
        let record = reader(Some(200)).read(&doc).unwrap();

        assert_eq!(record.account_id, 200);
        assert_eq!(record.battle_result, RESULT_LOSS);
        assert_eq!(record.win, 0);
        // measurements come from C's entry
        assert_eq!(record.tank_id, 12);
        let allies: Vec<_> = record.allies.iter().map(|k| k.account).collect();
        let enemies: Vec<_> = record.enemies.iter().map(|k| k.account).collect();
        assert_eq!(allies, vec![201]);
        assert_eq!(enemies, vec![100, 101]);
    }

    #[test]
    fn test_swap_keeps_draw() {
        let doc = document(
            100,
            &[100],
            &[200],
            RESULT_DRAW,
            vec![detail(100, 10, 300.0, 0), detail(200, 12, 300.0, 0)],
        );
        let record = reader(Some(200)).read(&doc).unwrap();
        assert_eq!(record.battle_result, RESULT_DRAW);
        assert_eq!(record.win, 0);
    }

    #[test]
    fn test_swap_is_idempotent_against_protagonist_view() {
        // Reading as the protagonist after reading as an enemy yields
        // the protagonist's original orientation.
        let doc = document(
            100,
            &[100, 101],
            &[200, 201],
            RESULT_LOSS,
            vec![
                detail(100, 10, 300.0, 0),
                detail(101, 11, 250.0, 0),
                detail(200, 12, 280.0, -1),
                detail(201, 11, 310.0, -1),
            ],
        );
        let first = reader(None).read(&doc).unwrap();
        let second = reader(Some(100)).read(&doc).unwrap();
        assert_eq!(first.battle_result, second.battle_result);
        assert_eq!(first.account_id, second.account_id);
        let a1: Vec<_> = first.allies.iter().map(|k| k.account).collect();
        let a2: Vec<_> = second.allies.iter().map(|k| k.account).collect();
        assert_eq!(a1, a2);
    }

    #[test]
    fn test_absent_subject_falls_back_to_protagonist() {
        let doc = document(
            100,
            &[100],
            &[200],
            RESULT_WIN,
            vec![detail(100, 10, 300.0, -1), detail(200, 12, 280.0, 0)],
        );
        let record = reader(Some(999)).read(&doc).unwrap();
        assert_eq!(record.account_id, 100);
        assert_eq!(record.battle_result, RESULT_WIN);
    }

    #[test]
    fn test_platoon_mate_removed() {
        let mut d_subject = detail(100, 10, 300.0, -1);
        d_subject["squad_index"] = serde_json::json!(2);
        let mut d_mate = detail(101, 11, 250.0, -1);
        d_mate["squad_index"] = serde_json::json!(2);
        let doc = document(
            100,
            &[100, 101, 102],
            &[200],
            RESULT_WIN,
            vec![
                d_subject,
                d_mate,
                detail(102, 12, 200.0, 0),
                detail(200, 12, 280.0, 0),
            ],
        );
        let record = reader(None).read(&doc).unwrap();
        let allies: Vec<_> = record.allies.iter().map(|k| k.account).collect();
        assert_eq!(allies, vec![102]);
    }

    #[test]
    fn test_platoon_filter_ignores_enemy_with_same_squad_index() {
        // Squad indices repeat across teams: enemy 200 also carries
        // index 2 and is listed before the real mate 101. Only the
        // ally mate may be removed, and the enemy team stays intact.
        let mut d_subject = detail(100, 10, 300.0, -1);
        d_subject["squad_index"] = serde_json::json!(2);
        let mut d_enemy = detail(200, 12, 280.0, 0);
        d_enemy["squad_index"] = serde_json::json!(2);
        let mut d_mate = detail(101, 11, 250.0, -1);
        d_mate["squad_index"] = serde_json::json!(2);
        let doc = document(
            100,
            &[100, 101, 102],
            &[200, 201],
            RESULT_WIN,
            vec![
                d_subject,
                d_enemy,
                d_mate,
                detail(102, 12, 200.0, 0),
                detail(201, 11, 310.0, 0),
            ],
        );
        let record = reader(None).read(&doc).unwrap();
        let allies: Vec<_> = record.allies.iter().map(|k| k.account).collect();
        let mut enemies: Vec<_> = record.enemies.iter().map(|k| k.account).collect();
        enemies.sort();
        assert_eq!(allies, vec![102]);
        assert_eq!(enemies, vec![200, 201]);
    }

    #[test]
    fn test_zero_duration_gives_infinite_time_alive() {
        let mut d = detail(100, 10, 0.0, 0);
        d["time_alive"] = serde_json::json!(0.0);
        let doc = document(100, &[100], &[200], RESULT_LOSS, vec![d]);
        let record = reader(None).read(&doc).unwrap();
        assert!(record.time_alive_pct.is_infinite());
    }

    #[test]
    fn test_unknown_tank_not_discarded() {
        let doc = document(
            100,
            &[100],
            &[200],
            RESULT_WIN,
            vec![detail(100, 9999, 300.0, -1), detail(200, 12, 280.0, 0)],
        );
        let record = reader(None).read(&doc).unwrap();
        assert_eq!(record.tank_tier, 0);
        assert_eq!(record.tank_name, "");
    }

    #[test]
    fn test_battle_index_is_monotonic() {
        let ctx = Arc::new(RunContext::default());
        let r = ReplayReader::new(refdata(), ctx, None, false);
        let doc = document(
            100,
            &[100],
            &[200],
            RESULT_WIN,
            vec![detail(100, 10, 300.0, -1), detail(200, 12, 280.0, 0)],
        );
        let first = r.read(&doc).unwrap();
        let second = r.read(&doc).unwrap();
        assert_eq!(first.battle_i, 1);
        assert_eq!(second.battle_i, 2);
    }
}
