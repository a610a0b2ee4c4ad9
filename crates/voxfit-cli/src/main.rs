// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! voxfit command-line driver
//!
//! Fits voxel-wise encoding models from pre-extracted features and per-subject
//! fMRI responses, appending one log block per configuration.
//!
//! # Usage
//!
//! ```bash
//! # Layer sweep over word-level features aligned to the TR grid
//! voxfit sweep --features-dir feats/ --alignment story.csv --fmri-dir fmri/ --layers 1,6,12
//!
//! # Kernel ridge on already aligned features
//! voxfit nonlinear --aligned-features out/aligned_layer6.npy --fmri-dir fmri/ --kernel rbf
//!
//! # Collect log files into a CSV table
//! voxfit summarize logs/*.txt --out summary.csv
//! ```

mod io;
mod sweep;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;
use voxfit_core::EncodingConfig;
use voxfit_eval::{
    KernelEncodingConfig, SummaryRow, best_per_model, merge_hemisphere_labels, parse_log,
    roi_summary, write_summary_csv,
};
use voxfit_ridge::Kernel;

use crate::io::{load_responses, read_alignment_csv, read_config, read_labels, read_vector};
use crate::sweep::{ConfigOutcome, LayerSweep, NonlinearRun, SweepOutput, grid_length};

/// Subjects of the narrative listening dataset used when none are given.
const DEFAULT_SUBJECTS: [u32; 25] = [
    75, 131, 190, 201, 235, 244, 249, 254, 255, 256, 257, 258, 259, 260, 261, 262, 263, 264, 265,
    266, 267, 268, 269, 270, 271,
];

/// Voxel-wise encoding models for fMRI
#[derive(Parser, Debug)]
#[command(name = "voxfit")]
#[command(author, version, about = "Voxel-wise encoding models for fMRI", long_about = None)]
struct Cli {
    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fit one encoder per layer feature file
    Sweep(SweepArgs),
    /// Concatenate and jointly reduce two aligned modalities, then fit
    Fuse(FuseArgs),
    /// Kernel ridge on one aligned feature file
    Nonlinear(NonlinearArgs),
    /// Parse result logs into a CSV table
    Summarize(SummarizeArgs),
    /// Per-region correlations from a correlation map and atlas labels
    Roi(RoiArgs),
}

#[derive(Args, Debug)]
struct SubjectArgs {
    /// Directory holding `sub-<id>.npy` response matrices
    #[arg(long)]
    fmri_dir: PathBuf,

    /// Comma-separated subject ids
    #[arg(long, value_delimiter = ',')]
    subjects: Vec<u32>,
}

impl SubjectArgs {
    fn subjects(&self) -> Vec<u32> {
        if self.subjects.is_empty() {
            DEFAULT_SUBJECTS.to_vec()
        } else {
            self.subjects.clone()
        }
    }
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// JSON encoding config; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    kfold: Option<usize>,

    /// Comma-separated ridge alphas
    #[arg(long, value_delimiter = ',')]
    alphas: Vec<f64>,

    /// PCA components; 0 disables reduction
    #[arg(long)]
    pca_dim: Option<usize>,

    #[arg(long)]
    fir_window: Option<usize>,

    #[arg(long)]
    fir_offset: Option<usize>,

    /// Repetition time in seconds
    #[arg(long)]
    tr: Option<f64>,

    #[arg(long)]
    excluded_start: Option<usize>,

    #[arg(long)]
    excluded_end: Option<usize>,
}

impl ConfigArgs {
    fn resolve(&self) -> anyhow::Result<EncodingConfig> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => EncodingConfig::default(),
        };
        if let Some(kfold) = self.kfold {
            config.kfold = kfold;
        }
        if !self.alphas.is_empty() {
            config.alphas = self.alphas.clone();
        }
        if let Some(pca_dim) = self.pca_dim {
            config.pca_dim = Some(pca_dim);
        }
        if let Some(window) = self.fir_window {
            config.fir_window = window;
        }
        if let Some(offset) = self.fir_offset {
            config.fir_offset = offset;
        }
        if let Some(tr) = self.tr {
            config.tr_seconds = tr;
        }
        if let Some(start) = self.excluded_start {
            config.excluded_start = start;
        }
        if let Some(end) = self.excluded_end {
            config.excluded_end = end;
        }
        voxfit_core::validate_config(&config)?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
struct SweepArgs {
    /// Directory holding `<prefix>layer<L>.npy` feature files
    #[arg(long)]
    features_dir: PathBuf,

    #[arg(long, default_value = "")]
    feature_prefix: String,

    /// Comma-separated layer indices
    #[arg(long, value_delimiter = ',', required = true)]
    layers: Vec<usize>,

    /// Word alignment CSV; omit when the feature files are already TR-level
    #[arg(long)]
    alignment: Option<PathBuf>,

    /// The alignment CSV starts with a header row
    #[arg(long)]
    alignment_has_header: bool,

    /// Model tag written to the log
    #[arg(long, default_value = "model")]
    model: String,

    #[command(flatten)]
    subjects: SubjectArgs,

    #[command(flatten)]
    config: ConfigArgs,

    #[arg(long, default_value = "results")]
    out_dir: PathBuf,

    #[arg(long, default_value = "encoding_log.txt")]
    log_name: String,
}

#[derive(Args, Debug)]
struct FuseArgs {
    /// TR-level text features
    #[arg(long)]
    text: PathBuf,

    /// TR-level audio features
    #[arg(long)]
    audio: PathBuf,

    #[command(flatten)]
    subjects: SubjectArgs,

    #[command(flatten)]
    config: ConfigArgs,

    #[arg(long, default_value = "results")]
    out_dir: PathBuf,

    #[arg(long, default_value = "fusion_log.txt")]
    log_name: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KernelKind {
    Linear,
    Rbf,
    Polynomial,
}

#[derive(Args, Debug)]
struct NonlinearArgs {
    #[arg(long)]
    aligned_features: PathBuf,

    #[command(flatten)]
    subjects: SubjectArgs,

    #[arg(long, value_enum, default_value = "rbf")]
    kernel: KernelKind,

    #[arg(long, default_value_t = 1.0)]
    alpha: f64,

    /// Kernel coefficient; defaults to 1 / n_features
    #[arg(long)]
    gamma: Option<f64>,

    #[arg(long, default_value_t = 3)]
    degree: u32,

    #[arg(long, default_value_t = 1.0)]
    coef0: f64,

    #[arg(long, default_value_t = 5)]
    kfold: usize,

    #[arg(long, default_value_t = voxfit_core::DEFAULT_FIR_WINDOW)]
    fir_window: usize,

    #[arg(long, default_value_t = voxfit_core::DEFAULT_FIR_OFFSET)]
    fir_offset: usize,

    #[arg(long, default_value_t = voxfit_core::DEFAULT_EXCLUDED)]
    excluded_start: usize,

    #[arg(long, default_value_t = voxfit_core::DEFAULT_EXCLUDED)]
    excluded_end: usize,

    #[arg(long, default_value = "results")]
    out_dir: PathBuf,

    #[arg(long, default_value = "nonlinear_log.txt")]
    log_name: String,
}

impl NonlinearArgs {
    fn kernel(&self) -> Kernel {
        match self.kernel {
            KernelKind::Linear => Kernel::Linear,
            KernelKind::Rbf => Kernel::Rbf { gamma: self.gamma },
            KernelKind::Polynomial => Kernel::Polynomial {
                degree: self.degree,
                gamma: self.gamma,
                coef0: self.coef0,
            },
        }
    }
}

#[derive(Args, Debug)]
struct SummarizeArgs {
    /// Log files written by `sweep`, `fuse` or `nonlinear`
    #[arg(required = true)]
    logs: Vec<PathBuf>,

    #[arg(long, default_value = "summary.csv")]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct RoiArgs {
    /// Region-level correlation map (`.npy`)
    #[arg(long)]
    corr: PathBuf,

    /// Left hemisphere vertex labels (`.npy`)
    #[arg(long)]
    labels_left: PathBuf,

    /// Right hemisphere vertex labels; offset past the left labels
    #[arg(long)]
    labels_right: Option<PathBuf>,

    #[arg(long, default_value = "roi.csv")]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("voxfit v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Sweep(args) => run_sweep(&args),
        Commands::Fuse(args) => run_fuse(&args),
        Commands::Nonlinear(args) => run_nonlinear(&args),
        Commands::Summarize(args) => run_summarize(&args),
        Commands::Roi(args) => run_roi(&args),
    }
}

fn report(outcomes: &[(String, ConfigOutcome)]) {
    let skipped = outcomes
        .iter()
        .filter(|(_, outcome)| matches!(outcome, ConfigOutcome::Skipped { .. }))
        .count();
    for (label, outcome) in outcomes {
        match outcome {
            ConfigOutcome::Completed { mean } => info!(config = %label, mean, "completed"),
            ConfigOutcome::Skipped { reason } => info!(config = %label, reason = %reason, "skipped"),
        }
    }
    info!(total = outcomes.len(), skipped, "run finished");
}

fn run_sweep(args: &SweepArgs) -> anyhow::Result<()> {
    let config = args.config.resolve()?;
    let subjects = args.subjects.subjects();
    let store = load_responses(&args.subjects.fmri_dir, &subjects)?;
    let n_trs = grid_length(&store, &subjects)?;
    let alignment = args
        .alignment
        .as_deref()
        .map(|path| read_alignment_csv(path, config.tr_seconds, args.alignment_has_header))
        .transpose()?;
    info!(
        layers = args.layers.len(),
        subjects = subjects.len(),
        n_trs,
        "starting layer sweep"
    );

    let sweep = LayerSweep {
        features_dir: &args.features_dir,
        feature_prefix: &args.feature_prefix,
        model: &args.model,
        layers: &args.layers,
        alignment: alignment.as_ref(),
        n_trs,
    };
    let output = SweepOutput::new(&args.out_dir, &args.log_name);
    let outcomes = sweep::run_layer_sweep(&sweep, &store, &subjects, &config, &output)?;
    let labelled: Vec<(String, ConfigOutcome)> = outcomes
        .into_iter()
        .map(|(layer, outcome)| (format!("layer{layer}"), outcome))
        .collect();
    report(&labelled);
    Ok(())
}

fn run_fuse(args: &FuseArgs) -> anyhow::Result<()> {
    let config = args.config.resolve()?;
    let subjects = args.subjects.subjects();
    let store = load_responses(&args.subjects.fmri_dir, &subjects)?;
    let output = SweepOutput::new(&args.out_dir, &args.log_name);
    let outcome = sweep::run_fusion(&args.text, &args.audio, &store, &subjects, &config, &output)?;
    report(&[("fusion".to_string(), outcome)]);
    Ok(())
}

fn run_nonlinear(args: &NonlinearArgs) -> anyhow::Result<()> {
    let subjects = args.subjects.subjects();
    let store = load_responses(&args.subjects.fmri_dir, &subjects)?;
    let run = NonlinearRun {
        features_path: &args.aligned_features,
        fir_window: args.fir_window,
        fir_offset: args.fir_offset,
        kernel: KernelEncodingConfig {
            kfold: args.kfold,
            alpha: args.alpha,
            kernel: args.kernel(),
            excluded_start: args.excluded_start,
            excluded_end: args.excluded_end,
        },
        gamma_label: args
            .gamma
            .map_or_else(|| "auto".to_string(), |gamma| gamma.to_string()),
    };
    let output = SweepOutput::new(&args.out_dir, &args.log_name);
    let outcome = sweep::run_nonlinear(&run, &store, &subjects, &output)?;
    report(&[(run.kernel.kernel.name().to_string(), outcome)]);
    Ok(())
}

fn source_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn run_summarize(args: &SummarizeArgs) -> anyhow::Result<()> {
    let mut rows = Vec::new();
    for path in &args.logs {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading log {}", path.display()))?;
        let source = source_name(path);
        let entries = parse_log(&text).with_context(|| format!("parsing log {}", path.display()))?;
        info!(source = %source, entries = entries.len(), "log parsed");
        rows.extend(entries.iter().map(|entry| SummaryRow::from_entry(&source, entry)));
    }
    write_summary_csv(&args.out, &rows)?;
    for best in best_per_model(&rows) {
        info!(
            model = %best.model,
            layer = ?best.layer,
            mean = best.mean,
            "best configuration"
        );
    }
    info!(rows = rows.len(), out = %args.out.display(), "summary written");
    Ok(())
}

#[derive(serde::Serialize)]
struct RoiRow {
    label: u32,
    correlation: f64,
}

fn run_roi(args: &RoiArgs) -> anyhow::Result<()> {
    let corr = read_vector(&args.corr)?;
    let left = read_labels(&args.labels_left)?;
    let labels = match &args.labels_right {
        Some(path) => merge_hemisphere_labels(&left, &read_labels(path)?),
        None => left,
    };
    let rois = roi_summary(corr.view(), &labels)?;

    let mut writer = csv::Writer::from_path(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;
    for roi in &rois {
        writer.serialize(RoiRow {
            label: roi.label,
            correlation: roi.correlation,
        })?;
    }
    writer.flush()?;
    info!(regions = rois.len(), out = %args.out.display(), "roi table written");
    Ok(())
}
