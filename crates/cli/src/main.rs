//! blitz-analyzer command line front-end
//!
//! Thin layer over `blitz-analyzer-core`: argument parsing, tracing
//! setup, input expansion, and exit-code mapping. All analysis lives
//! in the core crate.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use blitz_analyzer_core::aggregate::fields::FieldMode;
use blitz_analyzer_core::pipeline::{self, PipelineConfig};
use blitz_analyzer_core::refdata::{AccountId, MapNames, RefData, Tankopedia};
use blitz_analyzer_core::report;
use blitz_analyzer_core::stats::resolver::DEFAULT_WORKERS;
use blitz_analyzer_core::stats::StatsMode;
use blitz_analyzer_core::wg::replays::UploadSummary;
use blitz_analyzer_core::wg::types::Region;
use blitz_analyzer_core::{ReplayServiceClient, StatsCache, VendorClient};

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum Mode {
    /// Core per-battle fields
    #[default]
    Default,
    /// Team-strength fields (player / allies / enemies averages)
    Team,
    /// Extended measurement fields
    Extended,
}

impl From<Mode> for FieldMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Default => FieldMode::Default,
            Mode::Team => FieldMode::Team,
            Mode::Extended => FieldMode::Extended,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum StatFunction {
    /// Overall career stats per player
    #[default]
    Player,
    /// Career stats over the tanks of the battle tier
    TankTier,
}

impl From<StatFunction> for StatsMode {
    fn from(function: StatFunction) -> Self {
        match function {
            StatFunction::Player => StatsMode::Player,
            StatFunction::TankTier => StatsMode::TankTier,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "blitz-analyzer", version)]
#[command(about = "Analyze tank-battle replays: win rate, damage, survival and team strength")]
struct Args {
    /// Subject player as NAME@SERVER (ru|eu|na|asia)
    #[arg(long, conflicts_with = "id")]
    account: Option<String>,

    /// Subject player by account id
    #[arg(long)]
    id: Option<AccountId>,

    /// Field preset
    #[arg(long, value_enum, default_value_t = Mode::Default)]
    mode: Mode,

    /// Extra categories to report (e.g. map tier tank team_result)
    #[arg(long, num_args = 1.., value_name = "CATEGORY")]
    extra: Vec<String>,

    /// Report only the --extra categories
    #[arg(long)]
    only_extra: bool,

    /// Emit player-stat histograms
    #[arg(long)]
    hist: bool,

    /// Stat-key canonicalisation
    #[arg(long, value_enum, default_value_t = StatFunction::Player)]
    stat_mode: StatFunction,

    /// Machine-readable JSON output
    #[arg(long)]
    json: bool,

    /// Write the report to a file instead of stdout
    #[arg(long, value_name = "PATH")]
    outfile: Option<PathBuf>,

    /// Tankopedia file
    #[arg(long, default_value = "tanks.json", value_name = "PATH")]
    tankopedia: PathBuf,

    /// Map-name file
    #[arg(long, default_value = "maps.json", value_name = "PATH")]
    maps: PathBuf,

    /// Stats cache database
    #[arg(long, default_value = ".blitz-analyzer_cache.sqlite3", value_name = "PATH")]
    cache: PathBuf,

    /// Cache freshness window in days
    #[arg(long, default_value_t = 14)]
    grace_days: u64,

    /// Worker count for reading and stat resolution
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Vendor application id (or env WG_APP_ID)
    #[arg(long, env = "WG_APP_ID", hide_env_values = true)]
    app_id: Option<String>,

    /// Upload replay archives instead of analysing JSON documents
    #[arg(long)]
    upload: bool,

    /// Include replay view URLs in records
    #[arg(long)]
    with_url: bool,

    /// Only warnings and errors
    #[arg(long, conflicts_with_all = ["verbose", "debug"])]
    silent: bool,

    /// Informational progress output
    #[arg(long, conflicts_with = "debug")]
    verbose: bool,

    /// Full debug output
    #[arg(long)]
    debug: bool,

    /// Replay files; a single `-` reads a newline-separated list from stdin
    #[arg(value_name = "REPLAYS", required = true)]
    inputs: Vec<String>,
}

/// The verbosity triad maps to warn/info/debug; the bare default is
/// warn as well, so `--silent` only pins it against `RUST_LOG`.
fn filter_directive(args: &Args) -> &'static str {
    if args.debug {
        "blitz_analyzer_core=debug,blitz_analyzer=debug"
    } else if args.verbose {
        "blitz_analyzer_core=info,blitz_analyzer=info"
    } else {
        "warn"
    }
}

fn init_tracing(args: &Args) {
    let filter = if args.silent {
        EnvFilter::new(filter_directive(args))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(filter_directive(args)))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Expand positional inputs: `-` pulls a file list from stdin.
fn expand_inputs(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        if input == "-" {
            for line in std::io::stdin().lock().lines() {
                let line = line.context("reading file list from stdin")?;
                let line = line.trim();
                if !line.is_empty() {
                    paths.push(PathBuf::from(line));
                }
            }
        } else {
            paths.push(PathBuf::from(input));
        }
    }
    if paths.is_empty() {
        bail!("no replay inputs given");
    }
    Ok(paths)
}

/// Resolve `NAME@SERVER` through the vendor account search.
async fn resolve_account(spec: &str, client: &VendorClient) -> Result<AccountId> {
    let (name, server) = spec
        .rsplit_once('@')
        .with_context(|| format!("--account must be NAME@SERVER, got '{}'", spec))?;
    let region = Region::parse(server)
        .with_context(|| format!("unknown server '{}' (ru|eu|na|asia)", server))?;
    client
        .account_id_by_nick(name, region)
        .await?
        .with_context(|| format!("player '{}' not found on {}", name, region.as_str()))
}

async fn run_upload(paths: Vec<PathBuf>) -> Result<()> {
    let client = ReplayServiceClient::new()?;
    let mut summary = UploadSummary::default();
    for path in paths {
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        match client.upload(&path, &title).await {
            Ok(doc) if doc.summary().is_some() => summary.uploaded += 1,
            Ok(_) => summary.skipped += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "upload failed");
                summary.errors += 1;
            }
        }
    }
    println!("{}", summary);
    Ok(())
}

async fn run_analysis(args: Args, paths: Vec<PathBuf>) -> Result<()> {
    let app_id = args
        .app_id
        .clone()
        .context("vendor application id missing: pass --app-id or set WG_APP_ID")?;
    let client = Arc::new(VendorClient::new(app_id)?);

    let subject = match (&args.account, args.id) {
        (Some(spec), _) => Some(resolve_account(spec, &client).await?),
        (None, Some(id)) => Some(id),
        (None, None) => None,
    };

    let refdata = Arc::new(RefData {
        tankopedia: Tankopedia::load(&args.tankopedia)?,
        maps: MapNames::load(&args.maps)?,
    });
    info!(
        tanks = refdata.tankopedia.len(),
        maps = refdata.maps.len(),
        "reference data loaded"
    );

    let (cache, cache_handle) = StatsCache::open(&args.cache)?;

    let config = PipelineConfig {
        subject,
        include_url: args.with_url,
        workers: args.workers.max(1),
        stats_mode: args.stat_mode.into(),
        grace: Duration::from_secs(args.grace_days * 24 * 3600),
        field_mode: args.mode.into(),
        extra_categories: args.extra.clone(),
        only_extra: args.only_extra,
        histograms: args.hist,
    };

    let cancel = pipeline::cancel_on_ctrl_c();
    let analysis = pipeline::run(
        config,
        refdata,
        cache.clone(),
        client,
        None,
        paths,
        cancel,
    )
    .await?;

    let mut out: Box<dyn Write> = match &args.outfile {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };

    if args.json {
        let value = report::to_json(&analysis.report, analysis.histograms.as_deref());
        serde_json::to_writer_pretty(&mut out, &value)?;
        writeln!(out)?;
    } else {
        report::render_text(&analysis.report, analysis.histograms.as_deref(), &mut out)?;
        writeln!(
            out,
            "\n{} replays: {} analysed, {} skipped, {} errors",
            analysis.read + analysis.skipped + analysis.errors,
            analysis.read,
            analysis.skipped,
            analysis.errors
        )?;
    }

    // Close the cache queue and let the writer drain before exit.
    drop(cache);
    cache_handle.await.ok();
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args);

    let paths = match expand_inputs(&args.inputs) {
        Ok(paths) => paths,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(1);
        }
    };

    let outcome = if args.upload {
        run_upload(paths).await
    } else {
        run_analysis(args, paths).await
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_mode_mapping() {
        assert_eq!(FieldMode::from(Mode::Team), FieldMode::Team);
        assert_eq!(StatsMode::from(StatFunction::TankTier), StatsMode::TankTier);
    }

    #[test]
    fn test_verbosity_triad_maps_to_warn_info_debug() {
        let parse = |flags: &[&str]| {
            let mut argv = vec!["blitz-analyzer"];
            argv.extend_from_slice(flags);
            argv.push("replay.json");
            Args::parse_from(argv)
        };
        assert_eq!(filter_directive(&parse(&[])), "warn");
        assert_eq!(filter_directive(&parse(&["--silent"])), "warn");
        assert_eq!(
            filter_directive(&parse(&["--verbose"])),
            "blitz_analyzer_core=info,blitz_analyzer=info"
        );
        assert_eq!(
            filter_directive(&parse(&["--debug"])),
            "blitz_analyzer_core=debug,blitz_analyzer=debug"
        );
    }

    #[test]
    fn test_expand_inputs_rejects_empty() {
        assert!(expand_inputs(&[]).is_err());
        let paths = expand_inputs(&["a.json".to_string(), "b.json".to_string()]).unwrap();
        assert_eq!(paths.len(), 2);
    }
}
