// src/main.rs
// CLI entry point: `export` decodes + parses + persists one compressed PGN
// archive to a Parquet shard; `build` loads every shard under a directory
// and runs one or all registered aggregation builders over the result.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use rayon::prelude::*;

mod accuracy;
mod builders;
mod checksum;
mod config;
mod error;
mod exporter;
mod loader;
mod model;
mod openings;
mod parser;
mod pipeline;
mod reader;
mod splitter;
mod stats;
mod visual;

use pipeline::ExportOptions;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Logging verbosity: error, warn, info, debug, trace.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode, parse, and persist one or more compressed PGN archives to Parquet
    /// shards. Multiple inputs are exported concurrently, one sequential
    /// pipeline per file -- only the per-file pipeline itself is single-threaded.
    Export {
        /// Paths to zstd-compressed PGN dumps (one shard is written per input).
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Directory the shard is written under (created if missing).
        #[arg(short, long, default_value = config::DEFAULT_SHARD_DIR)]
        shard_dir: PathBuf,
        /// Optional sha256sum-style manifest to verify `input` against first.
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Drop games with no numeric engine evaluation at all.
        #[arg(long)]
        eval_only: bool,
        /// Restrict the export to these time-control buckets (repeatable).
        #[arg(long = "time-control")]
        time_controls: Vec<String>,
        /// Hide the byte-progress bar.
        #[arg(long)]
        no_progress: bool,
    },
    /// Load every shard under a directory and run one or all registered builders.
    Build {
        /// Directory holding `*.parquet` shards.
        shard_dir: PathBuf,
        /// Directory aggregate JSON outputs are written under.
        #[arg(short, long, default_value = config::DEFAULT_BUILD_DIR)]
        out_dir: PathBuf,
        /// Run only this builder; omit to run every registered builder.
        #[arg(long)]
        builder: Option<String>,
        /// Explicit output filename stem (without `.json`); auto-derived if omitted.
        #[arg(long)]
        filename: Option<String>,
    },
}

fn setup_logger(level: &str) {
    env_logger::Builder::new()
        .filter_level(level.parse().unwrap_or(log::LevelFilter::Info))
        .init();
}

fn run_export(
    inputs: &[PathBuf],
    shard_dir: &PathBuf,
    manifest: Option<&PathBuf>,
    eval_only: bool,
    time_controls: Vec<String>,
    show_progress: bool,
) -> Result<()> {
    let manifest_map = manifest
        .map(|path| checksum::load_manifest(path).context("loading checksum manifest"))
        .transpose()?;

    let opts = ExportOptions {
        eval_only,
        only_time_controls: if time_controls.is_empty() { None } else { Some(time_controls) },
    };

    // A single input keeps its byte-progress bar; fanning out several at once
    // would mean interleaved redraws from different threads, so only the
    // lone-file case gets one. Each file's own decode -> export pipeline
    // still runs sequentially -- only the set of files runs concurrently.
    let per_file_progress = show_progress && inputs.len() == 1;

    let results: Vec<Result<pipeline::ExportOutcome>> = inputs
        .par_iter()
        .map(|input| -> Result<pipeline::ExportOutcome> {
            if let Some(map) = &manifest_map {
                checksum::verify(input, map)?;
            }
            pipeline::export_archive(input, shard_dir, &opts, per_file_progress)
                .with_context(|| format!("exporting {}", input.display()))
        })
        .collect();

    let mut combined_rejections: std::collections::HashMap<String, u64> = std::collections::HashMap::new();
    let mut first_err = None;
    for (input, result) in inputs.iter().zip(results) {
        match result {
            Ok(outcome) => {
                visual::print_export_summary(&outcome.output_path, outcome.stats.games_kept, outcome.stats.games_rejected);
                for (reason, count) in outcome.stats.rejection_reasons {
                    *combined_rejections.entry(reason).or_insert(0) += count;
                }
            }
            Err(e) => {
                visual::print_error(&format!("{}: {e:#}", input.display()));
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
    }
    visual::print_rejection_breakdown(&combined_rejections);

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn run_build(shard_dir: &PathBuf, out_dir: &PathBuf, builder: Option<String>, filename: Option<String>) -> Result<()> {
    let registry = builders::register_all()?;
    let loaded = loader::Loader::load(shard_dir).context("loading shards")?;
    info!("loaded {} rows from {}", loaded.rows.len(), shard_dir.display());

    let root = PathBuf::from(".");
    let out_dir_name = out_dir.to_string_lossy().to_string();

    let names: Vec<String> = match builder {
        Some(name) => vec![name],
        None => builders::known_names(&registry),
    };

    for name in names {
        let path = builders::run(&registry, &name, &loaded.rows, &root, &out_dir_name, filename.as_deref())
            .with_context(|| format!("running builder '{name}'"))?;
        visual::print_success(&format!("wrote {}", path.display()));
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logger(&args.log_level);

    let result = match &args.command {
        Command::Export {
            inputs,
            shard_dir,
            manifest,
            eval_only,
            time_controls,
            no_progress,
        } => run_export(inputs, shard_dir, manifest.as_ref(), *eval_only, time_controls.clone(), !no_progress),
        Command::Build { shard_dir, out_dir, builder, filename } => {
            run_build(shard_dir, out_dir, builder.clone(), filename.clone())
        }
    };

    if let Err(e) = &result {
        error!("{e:#}");
        visual::print_error(&format!("{e}"));
    }
    result
}
