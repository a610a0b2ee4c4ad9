// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Per-configuration encoding runs with partial-failure semantics.
//!
//! Each configuration (layer, fused pair, kernel setting) is fitted, logged
//! and persisted before the next one starts. A configuration that fails with
//! a configuration-level error is logged and skipped; anything else aborts.

use std::path::{Path, PathBuf};

use anyhow::Context;
use ndarray::{Array2, ArrayView2};
use voxfit_core::{EncodingConfig, TracingObserver, VoxfitError, validate_config};
use voxfit_eval::{
    KernelEncodingConfig, LogEntry, MultiSubjectResult, ResponseStore, append_log,
    run_kernel_multi_subjects, run_multi_subjects,
};
use voxfit_features::{
    AlignmentTable, align_to_tr_grid, fir_embed_flat, fuse_modalities, reduce_features,
};

use crate::io::{read_matrix, write_matrix, write_vector};

/// Shared output locations for a sweep.
#[derive(Clone, Debug)]
pub struct SweepOutput {
    pub out_dir: PathBuf,
    pub log_file: PathBuf,
}

impl SweepOutput {
    pub fn new(out_dir: impl Into<PathBuf>, log_name: &str) -> Self {
        let out_dir = out_dir.into();
        let log_file = out_dir.join(log_name);
        Self { out_dir, log_file }
    }
}

/// What happened to one configuration.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigOutcome {
    Completed { mean: f64 },
    Skipped { reason: String },
}

/// Classifies a configuration failure: skip on configuration-level errors,
/// propagate everything else.
pub fn settle(label: &str, result: Result<f64, VoxfitError>) -> anyhow::Result<ConfigOutcome> {
    match result {
        Ok(mean) => Ok(ConfigOutcome::Completed { mean }),
        Err(err) if err.is_configuration_error() => {
            tracing::error!(config = label, error = %err, "configuration skipped");
            Ok(ConfigOutcome::Skipped {
                reason: err.to_string(),
            })
        }
        Err(err) => Err(anyhow::Error::new(err).context(format!("configuration {label} failed"))),
    }
}

/// Reduces, delay-embeds and fits TR-level features against every subject.
pub fn encode_aligned<S: ResponseStore + ?Sized>(
    aligned: ArrayView2<'_, f64>,
    store: &S,
    subjects: &[u32],
    config: &EncodingConfig,
    label: &str,
) -> Result<MultiSubjectResult, VoxfitError> {
    let reduced = reduce_features(aligned, config.effective_pca_dim())?;
    let x = fir_embed_flat(reduced.view(), config.fir_window, config.fir_offset)?;
    tracing::info!(config = label, rows = x.nrows(), cols = x.ncols(), "design matrix ready");
    let observer = TracingObserver::new(label);
    run_multi_subjects(x.view(), store, subjects, config, &observer)
}

/// Appends the log block, then writes the last subject's correlation map.
fn persist(
    output: &SweepOutput,
    entry: &LogEntry,
    corr_name: &str,
    result: &MultiSubjectResult,
) -> anyhow::Result<f64> {
    append_log(&output.log_file, entry)?;
    write_vector(&output.out_dir.join(corr_name), &result.last_correlation_map)?;
    Ok(entry.stats.mean)
}

/// Inputs of a layer sweep.
#[derive(Clone, Debug)]
pub struct LayerSweep<'a> {
    pub features_dir: &'a Path,
    pub feature_prefix: &'a str,
    pub model: &'a str,
    pub layers: &'a [usize],
    /// `None` means the layer files are already on the TR grid.
    pub alignment: Option<&'a AlignmentTable>,
    pub n_trs: usize,
}

fn layer_stage<S: ResponseStore + ?Sized>(
    sweep: &LayerSweep<'_>,
    layer: usize,
    store: &S,
    subjects: &[u32],
    config: &EncodingConfig,
    output: &SweepOutput,
) -> anyhow::Result<Result<f64, VoxfitError>> {
    let label = format!("{}/layer{layer}", sweep.model);
    let path = sweep
        .features_dir
        .join(format!("{}layer{layer}.npy", sweep.feature_prefix));
    let features = match read_matrix(&path) {
        Ok(features) => features,
        Err(err) => return Ok(Err(err)),
    };
    let aligned: Array2<f64> = match sweep.alignment {
        Some(table) => match align_to_tr_grid(table, features.view(), sweep.n_trs, config.pooling) {
            Ok(aligned) => {
                write_matrix(&output.out_dir.join(format!("aligned_layer{layer}.npy")), &aligned)?;
                aligned
            }
            Err(err) => return Ok(Err(err)),
        },
        None => features,
    };
    let result = match encode_aligned(aligned.view(), store, subjects, config, &label) {
        Ok(result) => result,
        Err(err) => return Ok(Err(err)),
    };
    let entry = LogEntry::for_layer(layer, result.summary()?).with_tag("model", sweep.model);
    persist(output, &entry, &format!("corr_layer{layer}.npy"), &result).map(Ok)
}

/// Runs every requested layer in order.
pub fn run_layer_sweep<S: ResponseStore + ?Sized>(
    sweep: &LayerSweep<'_>,
    store: &S,
    subjects: &[u32],
    config: &EncodingConfig,
    output: &SweepOutput,
) -> anyhow::Result<Vec<(usize, ConfigOutcome)>> {
    validate_config(config)?;
    let mut outcomes = Vec::with_capacity(sweep.layers.len());
    for &layer in sweep.layers {
        let label = format!("{}/layer{layer}", sweep.model);
        tracing::info!(config = %label, "configuration start");
        let result = layer_stage(sweep, layer, store, subjects, config, output)?;
        let outcome = settle(&label, result)?;
        if let ConfigOutcome::Completed { mean } = &outcome {
            tracing::info!(config = %label, mean, "configuration done");
        }
        outcomes.push((layer, outcome));
    }
    Ok(outcomes)
}

/// Fuses two TR-level modalities and fits the result.
pub fn run_fusion<S: ResponseStore + ?Sized>(
    text_path: &Path,
    audio_path: &Path,
    store: &S,
    subjects: &[u32],
    config: &EncodingConfig,
    output: &SweepOutput,
) -> anyhow::Result<ConfigOutcome> {
    validate_config(config)?;
    let label = "fusion";
    let stage = || -> anyhow::Result<Result<f64, VoxfitError>> {
        let text = match read_matrix(text_path) {
            Ok(text) => text,
            Err(err) => return Ok(Err(err)),
        };
        let audio = match read_matrix(audio_path) {
            Ok(audio) => audio,
            Err(err) => return Ok(Err(err)),
        };
        let fused = fuse_modalities(text.view(), audio.view(), config.effective_pca_dim())?;
        write_matrix(&output.out_dir.join("aligned_fusion.npy"), &fused)?;
        // Fusion already projected; fit the fused columns as-is.
        let fit_config = EncodingConfig {
            pca_dim: None,
            ..config.clone()
        };
        let result = match encode_aligned(fused.view(), store, subjects, &fit_config, label) {
            Ok(result) => result,
            Err(err) => return Ok(Err(err)),
        };
        let entry = LogEntry::new(
            vec![
                ("model".to_string(), "fusion".to_string()),
                ("text".to_string(), file_stem(text_path)),
                ("audio".to_string(), file_stem(audio_path)),
            ],
            result.summary()?,
        );
        persist(output, &entry, "corr_fusion.npy", &result).map(Ok)
    };
    settle(label, stage()?)
}

/// One kernel ridge configuration on a TR-level feature file.
#[derive(Clone, Debug)]
pub struct NonlinearRun<'a> {
    pub features_path: &'a Path,
    pub fir_window: usize,
    pub fir_offset: usize,
    pub kernel: KernelEncodingConfig,
    /// Logged verbatim; `"auto"` when the kernel default is used.
    pub gamma_label: String,
}

pub fn run_nonlinear<S: ResponseStore + ?Sized>(
    run: &NonlinearRun<'_>,
    store: &S,
    subjects: &[u32],
    output: &SweepOutput,
) -> anyhow::Result<ConfigOutcome> {
    let label = format!("kernel={}", run.kernel.kernel.name());
    let stage = || -> anyhow::Result<Result<f64, VoxfitError>> {
        let features = match read_matrix(run.features_path) {
            Ok(features) => features,
            Err(err) => return Ok(Err(err)),
        };
        let x = fir_embed_flat(features.view(), run.fir_window, run.fir_offset)?;
        let observer = TracingObserver::new(label.clone());
        let result = match run_kernel_multi_subjects(x.view(), store, subjects, &run.kernel, &observer) {
            Ok(result) => result,
            Err(err) => return Ok(Err(err)),
        };
        let mut entry = LogEntry::new(
            vec![
                ("kernel".to_string(), run.kernel.kernel.name().to_string()),
                ("alpha".to_string(), run.kernel.alpha.to_string()),
                ("gamma".to_string(), run.gamma_label.clone()),
            ],
            result.summary()?,
        );
        entry.multi_subject = false;
        persist(output, &entry, "corr_nonlinear.npy", &result).map(Ok)
    };
    settle(&label, stage()?)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Loads the TR count from the first subject's responses.
pub fn grid_length<S: ResponseStore + ?Sized>(store: &S, subjects: &[u32]) -> anyhow::Result<usize> {
    let first = subjects.first().context("at least one subject is required")?;
    Ok(store.responses(*first)?.nrows())
}

#[cfg(test)]
mod tests {
    use super::{ConfigOutcome, LayerSweep, SweepOutput, run_layer_sweep, settle};
    use crate::io::write_matrix;
    use std::path::PathBuf;
    use voxfit_core::{EncodingConfig, VoxfitError};
    use voxfit_eval::{SyntheticEncodingConfig, parse_log, synthetic_encoding_dataset};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("voxfit-sweep-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("temp dir");
        dir
    }

    #[test]
    fn settle_skips_configuration_errors_only() {
        let skipped = settle("a", Err(VoxfitError::missing_artifact("x.npy"))).expect("skip");
        assert!(matches!(skipped, ConfigOutcome::Skipped { .. }));
        assert!(settle("b", Err(VoxfitError::invalid_input("shape"))).is_err());
        assert_eq!(
            settle("c", Ok(0.5)).expect("completed"),
            ConfigOutcome::Completed { mean: 0.5 }
        );
    }

    #[test]
    fn missing_layer_is_skipped_and_others_persist() {
        let dir = temp_dir("layers");
        let data = synthetic_encoding_dataset(&SyntheticEncodingConfig {
            n_trs: 90,
            subjects: vec![75, 131],
            ..SyntheticEncodingConfig::default()
        })
        .expect("synthetic");
        let features_dir = dir.join("features");
        write_matrix(&features_dir.join("layer1.npy"), &data.event_features).expect("write");
        write_matrix(&features_dir.join("layer3.npy"), &data.event_features).expect("write");

        let sweep = LayerSweep {
            features_dir: &features_dir,
            feature_prefix: "",
            model: "synthetic",
            layers: &[1, 2, 3],
            alignment: Some(&data.alignment),
            n_trs: 90,
        };
        let config = EncodingConfig {
            pca_dim: Some(4),
            single_split_alpha: 1.0,
            ..EncodingConfig::default()
        };
        let output = SweepOutput::new(dir.join("out"), "log.txt");
        let outcomes =
            run_layer_sweep(&sweep, &data.responses, &[75, 131], &config, &output).expect("sweep");

        assert_eq!(outcomes.len(), 3);
        assert!(matches!(outcomes[0].1, ConfigOutcome::Completed { .. }));
        assert!(matches!(outcomes[1].1, ConfigOutcome::Skipped { .. }));
        assert!(matches!(outcomes[2].1, ConfigOutcome::Completed { .. }));
        assert!(output.out_dir.join("corr_layer1.npy").is_file());
        assert!(output.out_dir.join("aligned_layer3.npy").is_file());
        assert!(!output.out_dir.join("corr_layer2.npy").exists());

        let log = std::fs::read_to_string(&output.log_file).expect("log");
        let entries = parse_log(&log).expect("parse");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].tag("layer"), Some("3"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
