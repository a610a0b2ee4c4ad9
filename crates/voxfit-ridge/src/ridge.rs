// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use voxfit_core::{ThinSvd, VoxfitError, thin_svd, validate_alphas};

use crate::split::KFold;

/// Fitted linear map `y = x * coef + intercept`.
#[derive(Clone, Debug, PartialEq)]
pub struct Ridge {
    /// `(n_features, n_targets)`
    pub coef: Array2<f64>,
    pub intercept: Array1<f64>,
    pub alpha: f64,
}

/// Centered design with a cached SVD, reused across candidate alphas.
struct CenteredSvd {
    x_mean: Array1<f64>,
    y_mean: Array1<f64>,
    svd: ThinSvd,
    /// `U^T Y_c`, `(k, n_targets)`
    uty: Array2<f64>,
}

impl CenteredSvd {
    fn new(x: ArrayView2<'_, f64>, y: ArrayView2<'_, f64>) -> Result<Self, VoxfitError> {
        check_xy(x, y)?;
        let x_mean = column_mean(x)?;
        let y_mean = column_mean(y)?;
        let x_c = &x - &x_mean;
        let y_c = &y - &y_mean;
        let svd = thin_svd(x_c.view())?;
        let uty = svd.u.t().dot(&y_c);
        Ok(Self {
            x_mean,
            y_mean,
            svd,
            uty,
        })
    }

    fn solve(&self, alpha: f64) -> Ridge {
        let shrink = self.svd.s.mapv(|s| s / (s * s + alpha));
        let scaled = &self.uty * &shrink.insert_axis(Axis(1));
        let coef = self.svd.vt.t().dot(&scaled);
        let intercept = &self.y_mean - &self.x_mean.dot(&coef);
        Ridge {
            coef,
            intercept,
            alpha,
        }
    }
}

fn column_mean(x: ArrayView2<'_, f64>) -> Result<Array1<f64>, VoxfitError> {
    x.mean_axis(Axis(0))
        .ok_or_else(|| VoxfitError::invalid_input("cannot center a matrix with zero rows"))
}

fn check_xy(x: ArrayView2<'_, f64>, y: ArrayView2<'_, f64>) -> Result<(), VoxfitError> {
    if x.nrows() != y.nrows() {
        return Err(VoxfitError::invalid_input(format!(
            "x and y must have the same number of rows; got x={}, y={}",
            x.nrows(),
            y.nrows()
        )));
    }
    if x.nrows() == 0 || x.ncols() == 0 || y.ncols() == 0 {
        return Err(VoxfitError::invalid_input(format!(
            "ridge requires non-empty x and y; got x={:?}, y={:?}",
            x.shape(),
            y.shape()
        )));
    }
    Ok(())
}

impl Ridge {
    pub fn fit(x: ArrayView2<'_, f64>, y: ArrayView2<'_, f64>, alpha: f64) -> Result<Self, VoxfitError> {
        validate_alphas(&[alpha])?;
        Ok(CenteredSvd::new(x, y)?.solve(alpha))
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, VoxfitError> {
        if x.ncols() != self.coef.nrows() {
            return Err(VoxfitError::invalid_input(format!(
                "model expects {} features; got {}",
                self.coef.nrows(),
                x.ncols()
            )));
        }
        Ok(x.dot(&self.coef) + &self.intercept)
    }
}

/// R² per target averaged uniformly.
///
/// A constant target scores `1.0` when predicted exactly and `0.0` otherwise.
pub fn r2_score(y_true: ArrayView2<'_, f64>, y_pred: ArrayView2<'_, f64>) -> Result<f64, VoxfitError> {
    if y_true.dim() != y_pred.dim() || y_true.nrows() == 0 {
        return Err(VoxfitError::invalid_input(format!(
            "r2 requires equal non-empty shapes; got {:?} vs {:?}",
            y_true.shape(),
            y_pred.shape()
        )));
    }
    let mut total = 0.0;
    for (truth, pred) in y_true.columns().into_iter().zip(y_pred.columns()) {
        total += r2_column(truth, pred);
    }
    Ok(total / y_true.ncols() as f64)
}

fn r2_column(truth: ArrayView1<'_, f64>, pred: ArrayView1<'_, f64>) -> f64 {
    let mean = truth.mean().unwrap_or(0.0);
    let ss_res: f64 = truth
        .iter()
        .zip(pred.iter())
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    let ss_tot: f64 = truth.iter().map(|t| (t - mean) * (t - mean)).sum();
    if ss_tot == 0.0 {
        if ss_res == 0.0 { 1.0 } else { 0.0 }
    } else {
        1.0 - ss_res / ss_tot
    }
}

/// Ridge with the regularization strength chosen by an inner K-fold search.
#[derive(Clone, Debug, PartialEq)]
pub struct RidgeCv {
    pub alphas: Vec<f64>,
    pub inner_folds: usize,
}

/// Mean inner-fold score for one candidate alpha.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AlphaScore {
    pub alpha: f64,
    pub score: f64,
}

/// Result of [`RidgeCv::fit`].
#[derive(Clone, Debug)]
pub struct RidgeCvFit {
    pub model: Ridge,
    pub scores: Vec<AlphaScore>,
}

impl RidgeCv {
    pub fn new(alphas: Vec<f64>, inner_folds: usize) -> Result<Self, VoxfitError> {
        validate_alphas(&alphas)?;
        KFold::new(inner_folds)?;
        Ok(Self {
            alphas,
            inner_folds,
        })
    }

    /// Scores each alpha by mean R² over contiguous inner folds, then refits
    /// the best one on all rows. Ties keep the earliest alpha.
    pub fn fit(&self, x: ArrayView2<'_, f64>, y: ArrayView2<'_, f64>) -> Result<RidgeCvFit, VoxfitError> {
        validate_alphas(&self.alphas)?;
        check_xy(x, y)?;
        let folds = KFold::new(self.inner_folds)?.split(x.nrows())?;

        let mut totals = vec![0.0; self.alphas.len()];
        for fold in &folds {
            let x_train = x.select(Axis(0), &fold.train);
            let y_train = y.select(Axis(0), &fold.train);
            let x_test = x.slice(ndarray::s![fold.test.clone(), ..]);
            let y_test = y.slice(ndarray::s![fold.test.clone(), ..]);
            let cached = CenteredSvd::new(x_train.view(), y_train.view())?;
            for (total, &alpha) in totals.iter_mut().zip(&self.alphas) {
                let pred = cached.solve(alpha).predict(x_test)?;
                *total += r2_score(y_test, pred.view())?;
            }
        }

        let scores: Vec<AlphaScore> = self
            .alphas
            .iter()
            .zip(&totals)
            .map(|(&alpha, &total)| AlphaScore {
                alpha,
                score: total / folds.len() as f64,
            })
            .collect();
        let mut best = scores[0];
        for candidate in &scores[1..] {
            if candidate.score > best.score {
                best = *candidate;
            }
        }
        tracing::debug!(alpha = best.alpha, score = best.score, "ridge alpha selected");

        let model = CenteredSvd::new(x, y)?.solve(best.alpha);
        Ok(RidgeCvFit { model, scores })
    }
}

#[cfg(test)]
mod tests {
    use super::{Ridge, RidgeCv, r2_score};
    use ndarray::{Array2, array};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}"
        );
    }

    fn design(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, 3), |(i, j)| ((i * (j + 2)) as f64 * 0.37).sin() + j as f64)
    }

    #[test]
    fn tiny_alpha_recovers_exact_linear_map_with_intercept() {
        let x = design(30);
        let w = array![[1.0, -2.0], [0.5, 0.0], [-1.5, 3.0]];
        let y = x.dot(&w) + &array![4.0, -1.0];
        let model = Ridge::fit(x.view(), y.view(), 1e-10).expect("valid");
        for (a, e) in model.coef.iter().zip(w.iter()) {
            assert_close(*a, *e, 1e-6);
        }
        assert_close(model.intercept[0], 4.0, 1e-6);
        assert_close(model.intercept[1], -1.0, 1e-6);
    }

    #[test]
    fn ridge_matches_normal_equations() {
        let x = design(12);
        let y = Array2::from_shape_fn((12, 1), |(i, _)| (i as f64).cos());
        let alpha = 2.5;
        let model = Ridge::fit(x.view(), y.view(), alpha).expect("valid");

        let x_mean = x.mean_axis(ndarray::Axis(0)).expect("rows");
        let y_mean = y.mean_axis(ndarray::Axis(0)).expect("rows");
        let xc = &x - &x_mean;
        let yc = &y - &y_mean;
        let residual = xc.t().dot(&xc).dot(&model.coef) + &model.coef * alpha - xc.t().dot(&yc);
        assert!(residual.iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn large_alpha_shrinks_to_intercept() {
        let x = design(20);
        let y = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let model = Ridge::fit(x.view(), y.view(), 1e12).expect("valid");
        assert!(model.coef.iter().all(|v| v.abs() < 1e-6));
        assert_close(model.intercept[0], 9.5, 1e-4);
    }

    #[test]
    fn predict_checks_feature_count() {
        let model = Ridge::fit(design(10).view(), Array2::ones((10, 1)).view(), 1.0).expect("valid");
        assert!(model.predict(Array2::zeros((2, 4)).view()).is_err());
        assert!(Ridge::fit(design(10).view(), Array2::ones((9, 1)).view(), 1.0).is_err());
    }

    #[test]
    fn r2_handles_constant_targets() {
        let truth = array![[1.0, 2.0], [1.0, 4.0]];
        assert_close(r2_score(truth.view(), truth.view()).expect("valid"), 1.0, 0.0);
        let off = array![[1.5, 2.0], [1.5, 4.0]];
        assert_close(r2_score(truth.view(), off.view()).expect("valid"), 0.5, 1e-12);
    }

    #[test]
    fn cv_prefers_small_alpha_on_clean_signal_and_keeps_first_on_ties() {
        let x = design(40);
        let y = x.dot(&array![[2.0], [-1.0], [0.5]]);
        let fit = RidgeCv::new(vec![1e-3, 1e3, 1e6], 5)
            .expect("valid")
            .fit(x.view(), y.view())
            .expect("valid");
        assert_eq!(fit.model.alpha, 1e-3);
        assert_eq!(fit.scores.len(), 3);
        assert!(fit.scores[0].score > fit.scores[2].score);

        let constant = Array2::from_elem((40, 1), 3.0);
        let tie = RidgeCv::new(vec![10.0, 1.0], 5)
            .expect("valid")
            .fit(x.view(), constant.view())
            .expect("valid");
        assert_eq!(tie.model.alpha, 10.0);
    }

    #[test]
    fn cv_rejects_bad_configuration() {
        assert!(RidgeCv::new(vec![], 5).is_err());
        assert!(RidgeCv::new(vec![1.0], 1).is_err());
        let cv = RidgeCv::new(vec![1.0], 5).expect("valid");
        assert!(cv.fit(design(4).view(), Array2::ones((4, 1)).view()).is_err());
    }
}
