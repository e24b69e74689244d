//! Embedded stats cache
//!
//! Two tables, one per fetch granularity: overall player stats and
//! per-player-tank stats. A row with NULL `stats_json` is a tombstone
//! ("vendor has no data"), so a fresh tombstone still counts as a hit
//! and suppresses refetching within the grace window.
//!
//! The connection is owned by a single writer task; callers talk to it
//! through an mpsc command queue, which linearises the
//! `INSERT OR REPLACE` traffic the same way SQLite would serialise it
//! anyway.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::refdata::{AccountId, TankId};
use crate::wg::types::{PlayerStats, TankStatsEntry};

/// Outcome of a player-stats probe. `Hit(None)` is a fresh tombstone:
/// the vendor is known to have nothing, do not fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerRead {
    Hit(Option<PlayerStats>),
    Miss,
}

/// Outcome of a tank-stats probe. The probe is a hit only when
/// `missing` is empty; partial coverage reports the uncovered ids.
#[derive(Debug, Clone, Default)]
pub struct TankRead {
    pub found: Vec<(TankId, Option<PlayerStats>)>,
    pub missing: Vec<TankId>,
}

impl TankRead {
    pub fn is_hit(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Synchronous store; owned by the writer task in production, used
/// directly in tests.
pub struct CacheDb {
    conn: Connection,
}

impl CacheDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS player_stats (
                account_id INTEGER PRIMARY KEY,
                update_time INTEGER NOT NULL,
                stats_json TEXT
            );

            CREATE TABLE IF NOT EXISTS tank_stats (
                account_id INTEGER NOT NULL,
                tank_id INTEGER NOT NULL,
                update_time INTEGER NOT NULL,
                stats_json TEXT,
                PRIMARY KEY (account_id, tank_id)
            );
            "#,
        )?;
        Ok(())
    }

    fn decode(account_id: AccountId, json: Option<String>) -> Option<PlayerStats> {
        let json = json?;
        match serde_json::from_str(&json) {
            Ok(stats) => Some(stats),
            Err(e) => {
                // Corrupt row: treat as absent, the caller refetches.
                warn!(account_id, error = %e, "discarding corrupt cache row");
                None
            }
        }
    }

    pub fn get_player(&self, account_id: AccountId, earliest: u64) -> Result<PlayerRead> {
        let row: Option<(u64, Option<String>)> = self
            .conn
            .query_row(
                "SELECT update_time, stats_json FROM player_stats WHERE account_id = ?1",
                params![account_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((update_time, json)) if update_time >= earliest => {
                let had_json = json.is_some();
                let stats = Self::decode(account_id, json);
                if had_json && stats.is_none() {
                    return Ok(PlayerRead::Miss);
                }
                Ok(PlayerRead::Hit(stats))
            }
            _ => Ok(PlayerRead::Miss),
        }
    }

    pub fn get_tanks(
        &self,
        account_id: AccountId,
        tank_ids: &[TankId],
        earliest: u64,
    ) -> Result<TankRead> {
        let mut stmt = self.conn.prepare(
            "SELECT update_time, stats_json FROM tank_stats
             WHERE account_id = ?1 AND tank_id = ?2",
        )?;

        let mut read = TankRead::default();
        for &tank_id in tank_ids {
            let row: Option<(u64, Option<String>)> = stmt
                .query_row(params![account_id, tank_id], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
                .optional()?;

            match row {
                Some((update_time, json)) if update_time >= earliest => {
                    let had_json = json.is_some();
                    let stats = Self::decode(account_id, json);
                    if had_json && stats.is_none() {
                        read.missing.push(tank_id);
                    } else {
                        read.found.push((tank_id, stats));
                    }
                }
                _ => read.missing.push(tank_id),
            }
        }
        Ok(read)
    }

    pub fn put_player(
        &self,
        account_id: AccountId,
        now: u64,
        stats: Option<&PlayerStats>,
    ) -> Result<()> {
        let json = stats.map(serde_json::to_string).transpose()?;
        self.conn.execute(
            "INSERT OR REPLACE INTO player_stats (account_id, update_time, stats_json)
             VALUES (?1, ?2, ?3)",
            params![account_id, now, json],
        )?;
        Ok(())
    }

    /// Store fetched tank entries; every requested id missing from the
    /// result gets a tombstone.
    pub fn put_tanks(
        &self,
        account_id: AccountId,
        tank_ids: &[TankId],
        now: u64,
        entries: &[TankStatsEntry],
    ) -> Result<()> {
        let mut stmt = self.conn.prepare(
            "INSERT OR REPLACE INTO tank_stats (account_id, tank_id, update_time, stats_json)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for &tank_id in tank_ids {
            let json = entries
                .iter()
                .find(|e| e.tank_id == tank_id)
                .map(|e| serde_json::to_string(&e.all))
                .transpose()?;
            stmt.execute(params![account_id, tank_id, now, json])?;
        }
        Ok(())
    }

    /// Drop every row older than the cutoff. Returns the row count.
    pub fn prune(&self, cutoff: u64) -> Result<usize> {
        let players = self.conn.execute(
            "DELETE FROM player_stats WHERE update_time < ?1",
            params![cutoff],
        )?;
        let tanks = self.conn.execute(
            "DELETE FROM tank_stats WHERE update_time < ?1",
            params![cutoff],
        )?;
        Ok(players + tanks)
    }
}

enum CacheCmd {
    GetPlayer {
        account_id: AccountId,
        earliest: u64,
        reply: oneshot::Sender<Result<PlayerRead>>,
    },
    GetTanks {
        account_id: AccountId,
        tank_ids: Vec<TankId>,
        earliest: u64,
        reply: oneshot::Sender<Result<TankRead>>,
    },
    PutPlayer {
        account_id: AccountId,
        now: u64,
        stats: Option<PlayerStats>,
    },
    PutTanks {
        account_id: AccountId,
        tank_ids: Vec<TankId>,
        now: u64,
        entries: Vec<TankStatsEntry>,
    },
    Prune {
        cutoff: u64,
        reply: oneshot::Sender<Result<usize>>,
    },
}

/// Async handle to the cache writer task. Cloneable; dropping every
/// handle closes the queue and lets the writer drain and exit.
#[derive(Clone)]
pub struct StatsCache {
    tx: mpsc::Sender<CacheCmd>,
}

impl StatsCache {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<(Self, JoinHandle<()>)> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let db = CacheDb::open(&path)?;
        debug!(path = %path.display(), "stats cache opened");
        Ok(Self::spawn(db))
    }

    pub fn open_in_memory() -> Result<(Self, JoinHandle<()>)> {
        Ok(Self::spawn(CacheDb::open_in_memory()?))
    }

    fn spawn(db: CacheDb) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(1024);
        let handle = tokio::task::spawn_blocking(move || writer_loop(db, rx));
        (Self { tx }, handle)
    }

    async fn send(&self, cmd: CacheCmd) -> Result<()> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| Error::CacheClosed("writer task has exited".to_string()))
    }

    pub async fn get_player(&self, account_id: AccountId, earliest: u64) -> Result<PlayerRead> {
        let (reply, rx) = oneshot::channel();
        self.send(CacheCmd::GetPlayer {
            account_id,
            earliest,
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| Error::CacheClosed("reply dropped".to_string()))?
    }

    pub async fn get_tanks(
        &self,
        account_id: AccountId,
        tank_ids: Vec<TankId>,
        earliest: u64,
    ) -> Result<TankRead> {
        let (reply, rx) = oneshot::channel();
        self.send(CacheCmd::GetTanks {
            account_id,
            tank_ids,
            earliest,
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| Error::CacheClosed("reply dropped".to_string()))?
    }

    pub async fn put_player(
        &self,
        account_id: AccountId,
        now: u64,
        stats: Option<PlayerStats>,
    ) -> Result<()> {
        self.send(CacheCmd::PutPlayer {
            account_id,
            now,
            stats,
        })
        .await
    }

    pub async fn put_tanks(
        &self,
        account_id: AccountId,
        tank_ids: Vec<TankId>,
        now: u64,
        entries: Vec<TankStatsEntry>,
    ) -> Result<()> {
        self.send(CacheCmd::PutTanks {
            account_id,
            tank_ids,
            now,
            entries,
        })
        .await
    }

    pub async fn prune(&self, cutoff: u64) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.send(CacheCmd::Prune { cutoff, reply }).await?;
        rx.await
            .map_err(|_| Error::CacheClosed("reply dropped".to_string()))?
    }
}

fn writer_loop(db: CacheDb, mut rx: mpsc::Receiver<CacheCmd>) {
    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            CacheCmd::GetPlayer {
                account_id,
                earliest,
                reply,
            } => {
                let _ = reply.send(db.get_player(account_id, earliest));
            }
            CacheCmd::GetTanks {
                account_id,
                tank_ids,
                earliest,
                reply,
            } => {
                let _ = reply.send(db.get_tanks(account_id, &tank_ids, earliest));
            }
            CacheCmd::PutPlayer {
                account_id,
                now,
                stats,
            } => {
                if let Err(e) = db.put_player(account_id, now, stats.as_ref()) {
                    warn!(account_id, error = %e, "cache write failed");
                }
            }
            CacheCmd::PutTanks {
                account_id,
                tank_ids,
                now,
                entries,
            } => {
                if let Err(e) = db.put_tanks(account_id, &tank_ids, now, &entries) {
                    warn!(account_id, error = %e, "cache write failed");
                }
            }
            CacheCmd::Prune { cutoff, reply } => {
                let _ = reply.send(db.prune(cutoff));
            }
        }
    }
    debug!("cache writer drained and closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(battles: u64, wins: u64) -> PlayerStats {
        PlayerStats {
            battles,
            wins,
            damage_dealt: battles * 1000,
        }
    }

    #[test]
    fn test_player_round_trip_within_grace() {
        let db = CacheDb::open_in_memory().unwrap();
        db.put_player(100, 1000, Some(&stats(10, 6))).unwrap();

        match db.get_player(100, 900).unwrap() {
            PlayerRead::Hit(Some(s)) => assert_eq!(s, stats(10, 6)),
            other => panic!("expected hit, got {:?}", other),
        }
    }

    #[test]
    fn test_stale_player_is_miss() {
        let db = CacheDb::open_in_memory().unwrap();
        db.put_player(100, 1000, Some(&stats(10, 6))).unwrap();
        assert_eq!(db.get_player(100, 1001).unwrap(), PlayerRead::Miss);
    }

    #[test]
    fn test_player_tombstone_is_known_absent() {
        let db = CacheDb::open_in_memory().unwrap();
        db.put_player(100, 1000, None).unwrap();
        assert_eq!(db.get_player(100, 900).unwrap(), PlayerRead::Hit(None));
    }

    #[test]
    fn test_unknown_player_is_miss() {
        let db = CacheDb::open_in_memory().unwrap();
        assert_eq!(db.get_player(100, 0).unwrap(), PlayerRead::Miss);
    }

    #[test]
    fn test_tanks_all_or_miss() {
        let db = CacheDb::open_in_memory().unwrap();
        let entries = vec![TankStatsEntry {
            tank_id: 1,
            all: stats(5, 2),
        }];
        // requested 1 and 2, the vendor only knew 1: 2 gets a tombstone
        db.put_tanks(100, &[1, 2], 1000, &entries).unwrap();

        let read = db.get_tanks(100, &[1, 2], 900).unwrap();
        assert!(read.is_hit());
        assert_eq!(read.found.len(), 2);
        assert!(read
            .found
            .iter()
            .any(|(id, s)| *id == 2 && s.is_none()));

        // a third tank was never requested, so the probe misses it
        let read = db.get_tanks(100, &[1, 2, 3], 900).unwrap();
        assert!(!read.is_hit());
        assert_eq!(read.missing, vec![3]);
    }

    #[test]
    fn test_stale_tank_reported_missing() {
        let db = CacheDb::open_in_memory().unwrap();
        db.put_tanks(
            100,
            &[1],
            1000,
            &[TankStatsEntry {
                tank_id: 1,
                all: stats(5, 2),
            }],
        )
        .unwrap();
        let read = db.get_tanks(100, &[1], 2000).unwrap();
        assert_eq!(read.missing, vec![1]);
    }

    #[test]
    fn test_corrupt_row_treated_as_miss() {
        let db = CacheDb::open_in_memory().unwrap();
        db.conn
            .execute(
                "INSERT INTO player_stats (account_id, update_time, stats_json)
                 VALUES (100, 1000, 'not json')",
                [],
            )
            .unwrap();
        assert_eq!(db.get_player(100, 900).unwrap(), PlayerRead::Miss);
    }

    #[test]
    fn test_prune_drops_old_rows() {
        let db = CacheDb::open_in_memory().unwrap();
        db.put_player(100, 500, Some(&stats(1, 1))).unwrap();
        db.put_player(200, 1500, Some(&stats(2, 1))).unwrap();
        db.put_tanks(
            100,
            &[1],
            500,
            &[TankStatsEntry {
                tank_id: 1,
                all: stats(1, 1),
            }],
        )
        .unwrap();

        let dropped = db.prune(1000).unwrap();
        assert_eq!(dropped, 2);
        assert_eq!(db.get_player(100, 0).unwrap(), PlayerRead::Miss);
        assert!(matches!(
            db.get_player(200, 0).unwrap(),
            PlayerRead::Hit(Some(_))
        ));
    }

    #[tokio::test]
    async fn test_actor_round_trip() {
        let (cache, handle) = StatsCache::open_in_memory().unwrap();
        cache.put_player(100, 1000, Some(stats(10, 6))).await.unwrap();
        match cache.get_player(100, 900).await.unwrap() {
            PlayerRead::Hit(Some(s)) => assert_eq!(s.battles, 10),
            other => panic!("expected hit, got {:?}", other),
        }
        drop(cache);
        handle.await.unwrap();
    }
}
