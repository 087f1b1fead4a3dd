use anyhow::{bail, Context, Result};
use clap::Parser;
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use trackmatch::config::MatchConfig;
use trackmatch::crates::JsonDirCrateLoader;
use trackmatch::engine::{
    identify_in_library, identify_with, locate_best_match_crates, IdentificationReport,
};
use trackmatch::error::MatchError;
use trackmatch::models::{precompute_normalized, CrateNode, LibraryTrack, RecognizedTrack};
use trackmatch::prefilter::PREFILTER_CHUNK_SIZE;
use trackmatch::progress::{
    create_progress_bar, create_spinner, format_duration, log_progress, set_log_only,
};
use trackmatch::safety::validate_output_path;

#[derive(Parser)]
#[command(name = "trackmatch")]
#[command(about = "Identify recognized tracks against a local music library")]
struct Args {
    /// Library snapshot: JSON array of tracks
    library: PathBuf,

    /// Recognized title (single query)
    #[arg(long, conflicts_with = "queries")]
    title: Option<String>,

    /// Recognized artist (single query)
    #[arg(long, requires = "title")]
    artist: Option<String>,

    /// JSON array of recognized tracks (batch)
    #[arg(long)]
    queries: Option<PathBuf>,

    /// Crate tree: JSON array of crate nodes
    #[arg(long)]
    crates: Option<PathBuf>,

    /// Directory of <crate_id>.json membership files (defaults to the tree's directory)
    #[arg(long, requires = "crates")]
    crate_dir: Option<PathBuf>,

    /// TOML threshold overrides
    #[arg(long)]
    config: Option<PathBuf>,

    /// Crate membership loads in flight
    #[arg(long, default_value = "1")]
    concurrency: usize,

    #[arg(long, default_value = "0")]
    workers: usize,

    /// Write the report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Hide progress bars, log periodic progress lines instead
    #[arg(long)]
    log_only: bool,
}

/// Progress line every N queries in log-only mode
const LOG_INTERVAL: u64 = 100;

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} {}", what, path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {} {}", what, path.display()))
}

fn load_library(path: &Path) -> Result<Vec<LibraryTrack>> {
    let spinner = create_spinner("Loading library");
    let mut library: Vec<LibraryTrack> = read_json(path, "library")?;
    library
        .par_chunks_mut(PREFILTER_CHUNK_SIZE)
        .for_each(precompute_normalized);
    spinner.finish_and_clear();
    info!(tracks = library.len(), path = %path.display(), "Loaded library");
    Ok(library)
}

fn collect_queries(args: &Args) -> Result<Vec<RecognizedTrack>> {
    match (&args.queries, &args.title) {
        (Some(path), _) => read_json(path, "queries"),
        (None, Some(title)) => Ok(vec![RecognizedTrack::new(
            title.clone(),
            args.artist.clone().unwrap_or_default(),
        )]),
        (None, None) => bail!("Provide --title (and --artist) or --queries"),
    }
}

fn write_report<T: serde::Serialize>(report: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write report {}", path.display()))?;
            info!(path = %path.display(), "Wrote report");
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    set_log_only(args.log_only);

    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    let crate_dir = args
        .crate_dir
        .clone()
        .or_else(|| args.crates.as_deref().and_then(Path::parent).map(Path::to_path_buf))
        .map(|dir| if dir.as_os_str().is_empty() { PathBuf::from(".") } else { dir });

    if let Some(output) = &args.output {
        let inputs: Vec<&Path> = [
            Some(&args.library),
            args.queries.as_ref(),
            args.crates.as_ref(),
            args.config.as_ref(),
        ]
        .into_iter()
        .flatten()
        .map(PathBuf::as_path)
        .collect();
        validate_output_path(output, &inputs, crate_dir.as_deref())?;
    }

    let config = match &args.config {
        Some(path) => MatchConfig::from_toml_file(path)?,
        None => MatchConfig::default(),
    };

    let start = Instant::now();
    let queries = collect_queries(&args)?;
    let library = Arc::new(load_library(&args.library)?);
    let crate_tree: Vec<CrateNode> = match &args.crates {
        Some(path) => read_json(path, "crate tree")?,
        None => Vec::new(),
    };
    let loader = JsonDirCrateLoader::new(crate_dir.unwrap_or_else(|| PathBuf::from(".")));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling identification");
            on_interrupt.cancel();
        }
    });

    if args.queries.is_none() {
        let query = queries.into_iter().next().context("No query given")?;
        let report = identify_with(
            query,
            Arc::clone(&library),
            &crate_tree,
            &loader,
            &config,
            &cancel,
            args.concurrency,
        )
        .await?;
        info!(
            matches = report.matches.len(),
            best = ?report.best_match.as_ref().map(|m| &m.track.id),
            variations = report.variations.len(),
            crates = report.crates.len(),
            elapsed = %format_duration(start.elapsed()),
            "Identification complete"
        );
        return write_report(&report, args.output.as_deref());
    }

    let total = queries.len() as u64;
    info!(queries = total, "Identifying batch");
    let pb = create_progress_bar(total, "Identifying");
    let done = AtomicU64::new(0);

    let mut reports: Vec<IdentificationReport> = tokio::task::block_in_place(|| {
        queries
            .par_iter()
            .map(|query| {
                let report = identify_in_library(query, &library, &config, &cancel);
                pb.inc(1);
                let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                log_progress("identify", current, total, LOG_INTERVAL);
                report
            })
            .collect::<std::result::Result<Vec<_>, MatchError>>()
    })?;
    pb.finish_and_clear();

    for report in &mut reports {
        locate_best_match_crates(report, &crate_tree, &loader, &cancel, args.concurrency).await?;
    }

    let matched = reports.iter().filter(|r| r.best_match.is_some()).count();
    info!(
        queries = reports.len(),
        matched,
        unmatched = reports.len() - matched,
        elapsed = %format_duration(start.elapsed()),
        "Identification complete"
    );

    write_report(&reports, args.output.as_deref())
}
