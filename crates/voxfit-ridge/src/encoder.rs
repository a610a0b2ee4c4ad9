// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

//! Voxel-wise encoding fits: features in, held-out correlation per target out.

use ndarray::{Array1, Array2, ArrayView2, Axis, s};
use voxfit_core::{EncodingConfig, VoxfitError, column_correlation, fisher_mean, validate_config};

use crate::ridge::{Ridge, RidgeCv};
use crate::split::{FoldIndices, KFold, single_split, trim_edges};

/// Outcome of one subject's encoding fit.
#[derive(Clone, Debug)]
pub struct EncodingFit {
    /// Model of the last fold (or the single split).
    pub model: Ridge,
    /// Per-target correlation aggregated across folds.
    pub correlations: Array1<f64>,
    /// `(n_folds, n_targets)` raw held-out correlations.
    pub fold_correlations: Array2<f64>,
}

impl EncodingFit {
    pub fn n_folds(&self) -> usize {
        self.fold_correlations.nrows()
    }

    /// Plain mean over targets; NaN targets propagate.
    pub fn mean_correlation(&self) -> f64 {
        self.correlations.mean().unwrap_or(f64::NAN)
    }
}

fn check_rows(x: ArrayView2<'_, f64>, y: ArrayView2<'_, f64>) -> Result<(), VoxfitError> {
    if x.nrows() != y.nrows() {
        return Err(VoxfitError::invalid_input(format!(
            "features and responses must share the TR axis; got x={}, y={}",
            x.nrows(),
            y.nrows()
        )));
    }
    Ok(())
}

fn held_out_correlation(
    model: &Ridge,
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    fold: &FoldIndices,
) -> Result<Array1<f64>, VoxfitError> {
    let x_test = x.slice(s![fold.test.clone(), ..]);
    let y_test = y.slice(s![fold.test.clone(), ..]);
    let pred = model.predict(x_test)?;
    column_correlation(pred.view(), y_test)
}

/// Fisher-z average of each column of `fold_correlations`.
pub fn aggregate_fold_correlations(fold_correlations: ArrayView2<'_, f64>) -> Array1<f64> {
    fold_correlations.map_axis(Axis(0), |column| {
        let values: Vec<f64> = column.iter().copied().collect();
        fisher_mean(&values)
    })
}

/// K-fold cross-validated ridge encoding.
///
/// Edge rows are trimmed before splitting. Each contiguous fold fits a
/// [`RidgeCv`] on its training rows, correlations on held-out rows are
/// averaged in Fisher z space.
pub fn fit_encoding_cv(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    kfold: KFold,
    ridge_cv: &RidgeCv,
    excluded_start: usize,
    excluded_end: usize,
) -> Result<EncodingFit, VoxfitError> {
    check_rows(x, y)?;
    let kept = trim_edges(x.nrows(), excluded_start, excluded_end)?;
    let x = x.slice(s![kept.clone(), ..]);
    let y = y.slice(s![kept, ..]);
    let folds = kfold.split(x.nrows())?;

    let mut fold_correlations = Array2::<f64>::zeros((folds.len(), y.ncols()));
    let mut last_model = None;
    for (fold_idx, fold) in folds.iter().enumerate() {
        let x_train = x.select(Axis(0), &fold.train);
        let y_train = y.select(Axis(0), &fold.train);
        let fit = ridge_cv.fit(x_train.view(), y_train.view())?;
        let corr = held_out_correlation(&fit.model, x, y, fold)?;
        tracing::debug!(
            fold = fold_idx,
            alpha = fit.model.alpha,
            test_rows = fold.test.len(),
            "fold fitted"
        );
        fold_correlations.row_mut(fold_idx).assign(&corr);
        last_model = Some(fit.model);
    }

    let model = last_model.ok_or_else(|| VoxfitError::invalid_input("k-fold produced no folds"))?;
    Ok(EncodingFit {
        model,
        correlations: aggregate_fold_correlations(fold_correlations.view()),
        fold_correlations,
    })
}

/// Chronological single-split encoding at a fixed alpha.
pub fn fit_encoding_single(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    excluded_start: usize,
    excluded_end: usize,
    alpha: f64,
    test_ratio: f64,
) -> Result<EncodingFit, VoxfitError> {
    check_rows(x, y)?;
    let kept = trim_edges(x.nrows(), excluded_start, excluded_end)?;
    let x = x.slice(s![kept.clone(), ..]);
    let y = y.slice(s![kept, ..]);
    let fold = single_split(x.nrows(), test_ratio)?;

    let model = Ridge::fit(
        x.slice(s![..fold.test.start, ..]),
        y.slice(s![..fold.test.start, ..]),
        alpha,
    )?;
    let corr = held_out_correlation(&model, x, y, &fold)?;
    let fold_correlations = corr.clone().insert_axis(Axis(0));
    Ok(EncodingFit {
        model,
        correlations: corr,
        fold_correlations,
    })
}

/// Dispatches to the K-fold or single-split encoder per `config.kfold`.
pub fn fit_encoding(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    config: &EncodingConfig,
) -> Result<EncodingFit, VoxfitError> {
    validate_config(config)?;
    if config.uses_cross_validation() {
        let ridge_cv = RidgeCv::new(config.alphas.clone(), config.inner_folds)?;
        fit_encoding_cv(
            x,
            y,
            KFold::new(config.kfold)?,
            &ridge_cv,
            config.excluded_start,
            config.excluded_end,
        )
    } else {
        fit_encoding_single(
            x,
            y,
            config.excluded_start,
            config.excluded_end,
            config.single_split_alpha,
            config.test_ratio,
        )
    }
}
