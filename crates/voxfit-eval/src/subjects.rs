// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use ndarray::{Array1, Array2, ArrayView2, Axis, s};
use voxfit_core::{
    EncodingConfig, FitObserver, SummaryStats, VoxfitError, column_correlation, nan_mean,
    summarize,
};
use voxfit_ridge::{
    Kernel, KernelRidge, KFold, aggregate_fold_correlations, fit_encoding, trim_edges,
};

/// Per-subject fMRI responses, `(n_trs, n_targets)` each.
pub trait ResponseStore {
    fn responses(&self, subject: u32) -> Result<Cow<'_, Array2<f64>>, VoxfitError>;
}

impl ResponseStore for BTreeMap<u32, Array2<f64>> {
    fn responses(&self, subject: u32) -> Result<Cow<'_, Array2<f64>>, VoxfitError> {
        self.get(&subject)
            .map(Cow::Borrowed)
            .ok_or_else(|| missing_subject(subject))
    }
}

impl ResponseStore for HashMap<u32, Array2<f64>> {
    fn responses(&self, subject: u32) -> Result<Cow<'_, Array2<f64>>, VoxfitError> {
        self.get(&subject)
            .map(Cow::Borrowed)
            .ok_or_else(|| missing_subject(subject))
    }
}

fn missing_subject(subject: u32) -> VoxfitError {
    VoxfitError::missing_artifact(format!("no fMRI responses for subject {subject}"))
}

/// Outcome of running one feature configuration over several subjects.
#[derive(Clone, Debug)]
pub struct MultiSubjectResult {
    pub subjects: Vec<u32>,
    /// Mean correlation over targets, one per subject in run order.
    pub subject_means: Vec<f64>,
    /// Per-target correlations of the last subject processed only.
    pub last_correlation_map: Array1<f64>,
}

impl MultiSubjectResult {
    /// Summary over the per-subject means; NaN subjects poison every field.
    pub fn summary(&self) -> Result<SummaryStats, VoxfitError> {
        summarize(&self.subject_means)
    }
}

fn check_subjects(subjects: &[u32]) -> Result<(), VoxfitError> {
    if subjects.is_empty() {
        return Err(VoxfitError::invalid_input(
            "multi-subject run requires at least one subject; got 0",
        ));
    }
    Ok(())
}

fn plain_mean(values: &Array1<f64>) -> f64 {
    values.mean().unwrap_or(f64::NAN)
}

/// Fits the linear encoder once per subject on shared features.
pub fn run_multi_subjects<S: ResponseStore + ?Sized>(
    x: ArrayView2<'_, f64>,
    store: &S,
    subjects: &[u32],
    config: &EncodingConfig,
    observer: &dyn FitObserver,
) -> Result<MultiSubjectResult, VoxfitError> {
    check_subjects(subjects)?;
    let mut subject_means = Vec::with_capacity(subjects.len());
    let mut last_map = Array1::<f64>::zeros(0);

    for (idx, &subject) in subjects.iter().enumerate() {
        tracing::debug!(subject, "subject start");
        let y = store.responses(subject)?;
        let fit = fit_encoding(x, y.view(), config)?;
        let mean = plain_mean(&fit.correlations);
        observer.record_scalar("alpha", fit.model.alpha);
        observer.on_subject_done(subject, idx, subjects.len(), mean);
        subject_means.push(mean);
        last_map = fit.correlations;
    }

    Ok(MultiSubjectResult {
        subjects: subjects.to_vec(),
        subject_means,
        last_correlation_map: last_map,
    })
}

/// Settings for the kernel ridge sweep.
#[derive(Clone, Debug, PartialEq)]
pub struct KernelEncodingConfig {
    pub kfold: usize,
    pub alpha: f64,
    pub kernel: Kernel,
    pub excluded_start: usize,
    pub excluded_end: usize,
}

impl Default for KernelEncodingConfig {
    fn default() -> Self {
        Self {
            kfold: 5,
            alpha: 1.0,
            kernel: Kernel::default(),
            excluded_start: voxfit_core::DEFAULT_EXCLUDED,
            excluded_end: voxfit_core::DEFAULT_EXCLUDED,
        }
    }
}

/// Kernel ridge counterpart of [`run_multi_subjects`].
///
/// Each fold contributes the NaN-ignoring mean over targets; a subject's
/// score is the plain mean over its folds.
pub fn run_kernel_multi_subjects<S: ResponseStore + ?Sized>(
    x: ArrayView2<'_, f64>,
    store: &S,
    subjects: &[u32],
    config: &KernelEncodingConfig,
    observer: &dyn FitObserver,
) -> Result<MultiSubjectResult, VoxfitError> {
    check_subjects(subjects)?;
    let kept = trim_edges(x.nrows(), config.excluded_start, config.excluded_end)?;
    let x_kept = x.slice(s![kept.clone(), ..]);
    let folds = KFold::new(config.kfold)?.split(x_kept.nrows())?;

    let mut subject_means = Vec::with_capacity(subjects.len());
    let mut last_map = Array1::<f64>::zeros(0);
    for (idx, &subject) in subjects.iter().enumerate() {
        let y_full = store.responses(subject)?;
        if y_full.nrows() != x.nrows() {
            return Err(VoxfitError::invalid_input(format!(
                "subject {subject} responses have {} TRs; features have {}",
                y_full.nrows(),
                x.nrows()
            )));
        }
        let y = y_full.slice(s![kept.clone(), ..]);

        let mut fold_scores = Vec::with_capacity(folds.len());
        let mut fold_maps = Array2::<f64>::zeros((folds.len(), y.ncols()));
        for (fold_idx, fold) in folds.iter().enumerate() {
            let model = KernelRidge::fit(
                x_kept.select(Axis(0), &fold.train).view(),
                y.select(Axis(0), &fold.train).view(),
                config.alpha,
                config.kernel,
            )?;
            let pred = model.predict(x_kept.slice(s![fold.test.clone(), ..]))?;
            let corr = column_correlation(pred.view(), y.slice(s![fold.test.clone(), ..]))?;
            fold_scores.push(nan_mean(&corr.to_vec()));
            fold_maps.row_mut(fold_idx).assign(&corr);
        }

        let mean = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
        observer.on_subject_done(subject, idx, subjects.len(), mean);
        subject_means.push(mean);
        last_map = aggregate_fold_correlations(fold_maps.view());
    }

    Ok(MultiSubjectResult {
        subjects: subjects.to_vec(),
        subject_means,
        last_correlation_map: last_map,
    })
}

#[cfg(test)]
mod tests {
    use super::{
        KernelEncodingConfig, ResponseStore, run_kernel_multi_subjects, run_multi_subjects,
    };
    use ndarray::{Array2, array};
    use std::collections::BTreeMap;
    use voxfit_core::{EncodingConfig, NoopObserver, VoxfitError};
    use voxfit_ridge::Kernel;

    fn features(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, 3), |(i, j)| ((i * (j + 1)) as f64 * 0.53).sin())
    }

    fn store(x: &Array2<f64>, subjects: &[u32]) -> BTreeMap<u32, Array2<f64>> {
        subjects
            .iter()
            .enumerate()
            .map(|(k, &sub)| {
                let w = array![[1.0, 0.0], [0.0, 1.0], [0.5 * k as f64, -0.5]];
                (sub, x.dot(&w))
            })
            .collect()
    }

    #[test]
    fn keeps_last_subject_map_and_all_means() {
        let x = features(60);
        let responses = store(&x, &[75, 131]);
        let config = EncodingConfig {
            alphas: vec![1e-3],
            single_split_alpha: 1e-3,
            excluded_start: 2,
            excluded_end: 2,
            ..EncodingConfig::default()
        };
        let result =
            run_multi_subjects(x.view(), &responses, &[75, 131], &config, &NoopObserver).expect("valid");
        assert_eq!(result.subjects, vec![75, 131]);
        assert_eq!(result.subject_means.len(), 2);
        assert_eq!(result.last_correlation_map.len(), 2);
        assert!(result.subject_means.iter().all(|&m| m > 0.99));
        let stats = result.summary().expect("non-empty");
        assert!(stats.min <= stats.median && stats.median <= stats.max);
    }

    #[test]
    fn unknown_subject_is_missing_artifact() {
        let x = features(40);
        let responses = store(&x, &[1]);
        let err = run_multi_subjects(x.view(), &responses, &[2], &EncodingConfig::default(), &NoopObserver)
            .expect_err("subject 2 absent");
        assert!(matches!(err, VoxfitError::MissingArtifact(_)));
        assert!(err.is_configuration_error());
        assert!(responses.responses(1).is_ok());
    }

    #[test]
    fn empty_subject_list_is_rejected() {
        let x = features(40);
        let responses = store(&x, &[1]);
        assert!(run_multi_subjects(x.view(), &responses, &[], &EncodingConfig::default(), &NoopObserver).is_err());
    }

    #[test]
    fn kernel_sweep_scores_each_subject() {
        let x = features(50);
        let responses = store(&x, &[3, 4]);
        let config = KernelEncodingConfig {
            kfold: 3,
            alpha: 1e-2,
            kernel: Kernel::Linear,
            excluded_start: 2,
            excluded_end: 2,
        };
        let result =
            run_kernel_multi_subjects(x.view(), &responses, &[3, 4], &config, &NoopObserver).expect("valid");
        assert_eq!(result.subject_means.len(), 2);
        assert!(result.subject_means.iter().all(|&m| m > 0.9));
        assert_eq!(result.last_correlation_map.len(), 2);
    }
}
