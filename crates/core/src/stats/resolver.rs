//! Stat-key resolution
//!
//! Raw keys from the replay readers are projected to canonical keys,
//! deduplicated, and drained by a worker pool. Each canonical key is
//! resolved through the cache, then the optional external store, then
//! the vendor API; vendor misses are tombstoned so the next run skips
//! the fetch for the length of the grace window.
//!
//! Workers fill per-worker shards that are merged at join, so the hot
//! path has no shared mutable state. Output is a two-level lookup:
//! `raw → canonical` beside `canonical → stats`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::cache::{PlayerRead, StatsCache};
use super::key::{CanonicalKey, StatKey, StatsMode};
use crate::error::Result;
use crate::refdata::{AccountId, TankId, Tankopedia};
use crate::wg::types::{PlayerStats, TankStatsEntry};
use crate::wg::VendorClient;

/// Default freshness window: 14 days.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(14 * 24 * 3600);

pub const DEFAULT_WORKERS: usize = 10;

/// Optional external stats store consulted between the cache and the
/// vendor API. Implemented elsewhere; the resolver only needs reads.
#[async_trait]
pub trait StatsStore: Send + Sync {
    async fn get_player(&self, account_id: AccountId) -> Result<Option<PlayerStats>>;

    async fn get_tanks(
        &self,
        account_id: AccountId,
        tank_ids: &[TankId],
    ) -> Result<Option<Vec<TankStatsEntry>>>;
}

/// Resolved stats keyed by canonical key string, plus the remap from
/// every raw key to its canonical form.
pub struct ResolvedStats {
    pub stats: HashMap<String, PlayerStats>,
    pub remap: HashMap<String, String>,
}

impl ResolvedStats {
    /// Stats for a raw key, through the remap.
    pub fn lookup(&self, raw: &StatKey) -> Option<&PlayerStats> {
        let canonical = self.remap.get(&raw.to_string())?;
        self.stats.get(canonical)
    }
}

pub struct StatsResolver {
    cache: StatsCache,
    client: Arc<VendorClient>,
    store: Option<Arc<dyn StatsStore>>,
    mode: StatsMode,
    workers: usize,
    grace: Duration,
    cancel: Arc<AtomicBool>,
}

impl StatsResolver {
    pub fn new(cache: StatsCache, client: Arc<VendorClient>, mode: StatsMode) -> Self {
        Self {
            cache,
            client,
            store: None,
            mode,
            workers: DEFAULT_WORKERS,
            grace: DEFAULT_GRACE,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn StatsStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Share an interrupt flag; once set, workers stop before their
    /// next fetch and unresolved keys stay unresolved.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    /// Resolve every raw key. Idempotent under re-ordering of the
    /// input; never touches battle records.
    pub async fn resolve(
        &self,
        raw_keys: impl IntoIterator<Item = StatKey>,
        tankopedia: &Tankopedia,
    ) -> Result<ResolvedStats> {
        let mut remap: HashMap<String, String> = HashMap::new();
        let mut unique: HashSet<CanonicalKey> = HashSet::new();
        for raw in raw_keys {
            let canonical = raw.canonical(self.mode, tankopedia);
            remap.insert(raw.to_string(), canonical.to_string());
            unique.insert(canonical);
        }
        debug!(
            raw = remap.len(),
            canonical = unique.len(),
            mode = self.mode.as_str(),
            "resolving stat keys"
        );

        let (tx, rx) = mpsc::channel::<WorkItem>(unique.len().max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let now = Self::now();
        let earliest = now.saturating_sub(self.grace.as_secs());

        let mut handles = Vec::with_capacity(self.workers);
        for _ in 0..self.workers {
            let rx = Arc::clone(&rx);
            let cancel = Arc::clone(&self.cancel);
            let worker = Worker {
                cache: self.cache.clone(),
                client: Arc::clone(&self.client),
                store: self.store.clone(),
                now,
                earliest,
            };
            handles.push(tokio::spawn(async move {
                let mut shard: HashMap<String, PlayerStats> = HashMap::new();
                loop {
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    let item = { rx.lock().await.recv().await };
                    let Some(item) = item else { break };
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    match worker.resolve_one(&item).await {
                        Ok(Some(stats)) => {
                            shard.insert(item.key.to_string(), stats);
                        }
                        Ok(None) => {}
                        Err(e) => warn!(key = %item.key, error = %e, "stat key failed"),
                    }
                }
                shard
            }));
        }

        for key in unique {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }
            let tank_ids = match key.tier {
                Some(tier) => tankopedia.by_tier(tier).to_vec(),
                None => Vec::new(),
            };
            // Receiver is only dropped when workers have panicked.
            if tx.send(WorkItem { key, tank_ids }).await.is_err() {
                break;
            }
        }
        drop(tx);

        let mut stats = HashMap::new();
        for shard in join_all(handles).await {
            match shard {
                Ok(shard) => stats.extend(shard),
                Err(e) => warn!(error = %e, "resolver worker panicked"),
            }
        }

        Ok(ResolvedStats { stats, remap })
    }
}

struct WorkItem {
    key: CanonicalKey,
    /// Tank ids of the key's tier; empty in player mode.
    tank_ids: Vec<TankId>,
}

struct Worker {
    cache: StatsCache,
    client: Arc<VendorClient>,
    store: Option<Arc<dyn StatsStore>>,
    now: u64,
    earliest: u64,
}

impl Worker {
    async fn resolve_one(&self, item: &WorkItem) -> Result<Option<PlayerStats>> {
        match item.key.tier {
            None => self.resolve_player(item.key.account).await,
            Some(_) => self.resolve_tier(item.key.account, &item.tank_ids).await,
        }
    }

    async fn resolve_player(&self, account_id: AccountId) -> Result<Option<PlayerStats>> {
        match self.cache.get_player(account_id, self.earliest).await? {
            PlayerRead::Hit(stats) => return Ok(stats.filter(|s| !s.is_empty())),
            PlayerRead::Miss => {}
        }

        if let Some(store) = &self.store {
            if let Some(stats) = store.get_player(account_id).await? {
                self.cache
                    .put_player(account_id, self.now, Some(stats))
                    .await?;
                return Ok(Some(stats).filter(|s| !s.is_empty()));
            }
        }

        let fetched = self.client.player_stats(account_id).await?;
        self.cache.put_player(account_id, self.now, fetched).await?;
        Ok(fetched.filter(|s| !s.is_empty()))
    }

    /// Tier mode: the player's career summed over every tank of the
    /// tier. The cache probe is all-or-miss over the tier's tank ids.
    async fn resolve_tier(
        &self,
        account_id: AccountId,
        tank_ids: &[TankId],
    ) -> Result<Option<PlayerStats>> {
        if tank_ids.is_empty() {
            return Ok(None);
        }

        let read = self
            .cache
            .get_tanks(account_id, tank_ids.to_vec(), self.earliest)
            .await?;
        let entries: Vec<TankStatsEntry> = if read.is_hit() {
            read.found
                .into_iter()
                .filter_map(|(tank_id, stats)| stats.map(|all| TankStatsEntry { tank_id, all }))
                .collect()
        } else {
            let fetched = match &self.store {
                Some(store) => match store.get_tanks(account_id, tank_ids).await? {
                    Some(entries) => Some(entries),
                    None => self.client.tank_stats(account_id, tank_ids).await?,
                },
                None => self.client.tank_stats(account_id, tank_ids).await?,
            };
            let entries = fetched.unwrap_or_default();
            self.cache
                .put_tanks(account_id, tank_ids.to_vec(), self.now, entries.clone())
                .await?;
            entries
        };

        let mut total = PlayerStats::default();
        for entry in &entries {
            total.add(&entry.all);
        }
        Ok(Some(total).filter(|s| !s.is_empty()))
    }
}
