//! Three-stage analysis pipeline
//!
//! Replay files drain through a bounded path queue into a reader pool;
//! the records' stat keys drain through the resolver pool; enrichment,
//! aggregation, and reporting run synchronously once both pools have
//! joined. A shared cancel flag (set on Ctrl-C) closes the queues
//! early; whatever was read so far is still enriched and reported.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::aggregate::categories::select_categories;
use crate::aggregate::engine::{Aggregator, Report};
use crate::aggregate::fields::{fields_for, FieldMode};
use crate::aggregate::histogram::{build_histograms, Histogram};
use crate::error::Result;
use crate::refdata::{AccountId, RefData};
use crate::replay::reader::{BattleRecord, ReplayReader};
use crate::replay::types::ReplayDocument;
use crate::stats::key::StatKey;
use crate::stats::resolver::{StatsResolver, StatsStore, DEFAULT_GRACE, DEFAULT_WORKERS};
use crate::stats::{StatsCache, StatsMode};
use crate::wg::VendorClient;
use crate::RunContext;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub subject: Option<AccountId>,
    pub include_url: bool,
    pub workers: usize,
    pub stats_mode: StatsMode,
    pub grace: Duration,
    pub field_mode: FieldMode,
    pub extra_categories: Vec<String>,
    pub only_extra: bool,
    pub histograms: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            subject: None,
            include_url: false,
            workers: DEFAULT_WORKERS,
            stats_mode: StatsMode::Player,
            grace: DEFAULT_GRACE,
            field_mode: FieldMode::Default,
            extra_categories: Vec::new(),
            only_extra: false,
            histograms: false,
        }
    }
}

/// Everything one run produces.
pub struct Analysis {
    pub report: Report,
    pub histograms: Option<Vec<Histogram>>,
    pub read: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Install a Ctrl-C watcher; the returned flag flips once on signal.
pub fn cancel_on_ctrl_c() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let watched = Arc::clone(&flag);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, draining");
            watched.store(true, Ordering::Relaxed);
        }
    });
    flag
}

/// Stage one: read and normalise every replay file through a worker
/// pool. Invalid documents count as skips, unreadable files as errors.
pub async fn read_replays(
    paths: Vec<PathBuf>,
    refdata: Arc<RefData>,
    ctx: Arc<RunContext>,
    config: &PipelineConfig,
    cancel: Arc<AtomicBool>,
) -> (Vec<BattleRecord>, usize, usize) {
    let workers = config.workers.max(1);
    let (path_tx, path_rx) = mpsc::channel::<PathBuf>(workers * 2);
    let path_rx = Arc::new(tokio::sync::Mutex::new(path_rx));
    let (record_tx, mut record_rx) = mpsc::channel::<BattleRecord>(workers * 2);

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let path_rx = Arc::clone(&path_rx);
        let record_tx = record_tx.clone();
        let cancel = Arc::clone(&cancel);
        let reader = ReplayReader::new(
            Arc::clone(&refdata),
            Arc::clone(&ctx),
            config.subject,
            config.include_url,
        );
        handles.push(tokio::spawn(async move {
            let mut skipped = 0usize;
            let mut errors = 0usize;
            loop {
                if cancel.load(Ordering::Relaxed) {
                    break;
                }
                let path = { path_rx.lock().await.recv().await };
                let Some(path) = path else { break };

                let bytes = match tokio::fs::read(&path).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "cannot read replay");
                        errors += 1;
                        continue;
                    }
                };
                let doc: ReplayDocument = match serde_json::from_slice(&bytes) {
                    Ok(doc) => doc,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "replay is not valid JSON");
                        skipped += 1;
                        continue;
                    }
                };
                match reader.read(&doc) {
                    Some(record) => {
                        if record_tx.send(record).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        debug!(path = %path.display(), "replay failed schema check");
                        skipped += 1;
                    }
                }
            }
            (skipped, errors)
        }));
    }
    drop(record_tx);

    let feeder = tokio::spawn(async move {
        for path in paths {
            if path_tx.send(path).await.is_err() {
                break;
            }
        }
    });

    let mut records = Vec::new();
    while let Some(record) = record_rx.recv().await {
        records.push(record);
    }
    let _ = feeder.await;

    let mut skipped = 0;
    let mut errors = 0;
    for handle in join_all(handles).await {
        match handle {
            Ok((s, e)) => {
                skipped += s;
                errors += e;
            }
            Err(e) => warn!(error = %e, "reader worker panicked"),
        }
    }
    (records, skipped, errors)
}

/// Run the whole pipeline over the given replay files.
pub async fn run(
    config: PipelineConfig,
    refdata: Arc<RefData>,
    cache: StatsCache,
    client: Arc<VendorClient>,
    store: Option<Arc<dyn StatsStore>>,
    paths: Vec<PathBuf>,
    cancel: Arc<AtomicBool>,
) -> Result<Analysis> {
    let ctx = Arc::new(RunContext::default());

    let (mut records, skipped, errors) = read_replays(
        paths,
        Arc::clone(&refdata),
        Arc::clone(&ctx),
        &config,
        Arc::clone(&cancel),
    )
    .await;
    info!(
        read = records.len(),
        skipped, errors, "replay ingestion finished"
    );

    let raw_keys: HashSet<StatKey> = records
        .iter()
        .flat_map(|record| record.required_keys())
        .collect();

    let mut resolver = StatsResolver::new(cache.clone(), client, config.stats_mode)
        .with_workers(config.workers)
        .with_grace(config.grace)
        .with_cancel(Arc::clone(&cancel));
    if let Some(store) = store {
        resolver = resolver.with_store(store);
    }
    let resolved = resolver.resolve(raw_keys, &refdata.tankopedia).await?;

    crate::stats::enricher::enrich(&mut records, &resolved);

    let mut aggregator = Aggregator::new(
        fields_for(config.field_mode),
        select_categories(&config.extra_categories, config.only_extra),
    );
    for record in &records {
        aggregator.add(record);
    }
    let report = aggregator.finalise();

    let histograms = config
        .histograms
        .then(|| build_histograms(&records, &resolved));

    // Shutdown housekeeping: drop rows that fell out of the grace
    // window so the cache file does not grow without bound.
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let pruned = cache.prune(now.saturating_sub(config.grace.as_secs())).await?;
    if pruned > 0 {
        debug!(pruned, "stale cache rows dropped");
    }

    Ok(Analysis {
        report,
        histograms,
        read: records.len(),
        skipped,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refdata::Tankopedia;
    use std::io::Write;

    fn write_replay(dir: &std::path::Path, name: &str, result: i32) -> PathBuf {
        let path = dir.join(name);
        let doc = serde_json::json!({
            "status": "ok",
            "data": {"summary": {
                "battle_result": result,
                "protagonist": 100,
                "allies": [100],
                "enemies": [200],
                "battle_start_timestamp": 1_700_000_000.0,
                "battle_duration": 300.0,
                "details": [
                    {"dbid": 100, "vehicle_descr": 1, "death_reason": -1,
                     "hitpoints_left": 10, "time_alive": 300.0, "damage_made": 800.0},
                    {"dbid": 200, "vehicle_descr": 1, "death_reason": 0, "time_alive": 100.0}
                ]
            }}
        });
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(doc.to_string().as_bytes()).unwrap();
        path
    }

    fn refdata() -> Arc<RefData> {
        Arc::new(RefData {
            tankopedia: Tankopedia::default(),
            maps: Default::default(),
        })
    }

    #[tokio::test]
    async fn test_read_replays_counts_and_indices() {
        let dir = std::env::temp_dir().join(format!("blitz-pipeline-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let good1 = write_replay(&dir, "a.json", 1);
        let good2 = write_replay(&dir, "b.json", 0);
        let bad = dir.join("c.json");
        std::fs::write(&bad, b"not json").unwrap();
        let missing = dir.join("missing.json");

        let config = PipelineConfig {
            workers: 3,
            ..Default::default()
        };
        let ctx = Arc::new(RunContext::default());
        let cancel = Arc::new(AtomicBool::new(false));
        let (records, skipped, errors) = read_replays(
            vec![good1, good2, bad, missing],
            refdata(),
            ctx,
            &config,
            cancel,
        )
        .await;

        assert_eq!(records.len(), 2);
        assert_eq!(skipped, 1);
        assert_eq!(errors, 1);
        let mut indices: Vec<u32> = records.iter().map(|r| r.battle_i).collect();
        indices.sort();
        assert_eq!(indices, vec![1, 2]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_cancel_stops_ingestion() {
        let dir = std::env::temp_dir().join(format!("blitz-cancel-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = write_replay(&dir, "a.json", 1);

        let config = PipelineConfig::default();
        let cancel = Arc::new(AtomicBool::new(true));
        let (records, _, _) = read_replays(
            vec![path],
            refdata(),
            Arc::new(RunContext::default()),
            &config,
            cancel,
        )
        .await;
        assert!(records.is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }
}
