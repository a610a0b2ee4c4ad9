// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use ndarray::{Array1, ArrayView2, Axis, Zip};

use crate::VoxfitError;
use crate::error::ensure_shape;

/// Per-column Pearson correlation between two `(samples, targets)` matrices.
///
/// Columns are demeaned and scaled by the population standard deviation
/// (`/ n`), so the result is `mean(a_c * b_c) / (std_a * std_b)`. A target is
/// valid only when both standard deviations are non-zero; invalid targets are
/// `NaN` rather than an error.
///
/// Fails when the shapes differ or there are no samples.
pub fn column_correlation(
    a: ArrayView2<'_, f64>,
    b: ArrayView2<'_, f64>,
) -> Result<Array1<f64>, VoxfitError> {
    ensure_shape("column_correlation", a.shape(), b.shape())?;
    if a.nrows() == 0 {
        return Err(VoxfitError::invalid_input(
            "column_correlation requires at least one sample; got 0 rows",
        ));
    }

    let n = a.nrows() as f64;
    let mean_a = a.sum_axis(Axis(0)) / n;
    let mean_b = b.sum_axis(Axis(0)) / n;

    let mut corrs = Array1::from_elem(a.ncols(), f64::NAN);
    Zip::from(&mut corrs)
        .and(a.columns())
        .and(b.columns())
        .and(&mean_a)
        .and(&mean_b)
        .for_each(|corr, col_a, col_b, &mu_a, &mu_b| {
            let mut cross = 0.0;
            let mut ss_a = 0.0;
            let mut ss_b = 0.0;
            for (&x, &y) in col_a.iter().zip(col_b.iter()) {
                let da = x - mu_a;
                let db = y - mu_b;
                cross += da * db;
                ss_a += da * da;
                ss_b += db * db;
            }
            let std_a = (ss_a / n).sqrt();
            let std_b = (ss_b / n).sqrt();
            if std_a != 0.0 && std_b != 0.0 {
                *corr = (cross / n) / (std_a * std_b);
            }
        });

    Ok(corrs)
}

#[cfg(test)]
mod tests {
    use super::column_correlation;
    use crate::VoxfitError;
    use ndarray::{Array2, array};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        let diff = (actual - expected).abs();
        assert!(
            diff <= tol,
            "expected {expected}, got {actual}, |diff|={diff}, tol={tol}"
        );
    }

    fn corrcoef(x: &[f64], y: &[f64]) -> f64 {
        let n = x.len() as f64;
        let mx = x.iter().sum::<f64>() / n;
        let my = y.iter().sum::<f64>() / n;
        let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();
        let sxx: f64 = x.iter().map(|a| (a - mx) * (a - mx)).sum();
        let syy: f64 = y.iter().map(|b| (b - my) * (b - my)).sum();
        sxy / (sxx * syy).sqrt()
    }

    #[test]
    fn matches_sample_corrcoef_per_column() {
        let a = array![[1.0, 0.5], [2.0, -1.0], [4.0, 2.0], [3.0, 0.0]];
        let b = array![[2.0, 1.0], [3.5, 0.0], [8.0, 1.0], [5.0, 3.0]];
        let corrs = column_correlation(a.view(), b.view()).expect("same shape");

        for col in 0..2 {
            let x: Vec<f64> = a.column(col).to_vec();
            let y: Vec<f64> = b.column(col).to_vec();
            assert_close(corrs[col], corrcoef(&x, &y), 1e-12);
        }
    }

    #[test]
    fn perfect_and_anti_correlation() {
        let a = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let b = array![[10.0, -1.0], [20.0, -2.0], [30.0, -3.0]];
        let corrs = column_correlation(a.view(), b.view()).expect("same shape");
        assert_close(corrs[0], 1.0, 1e-12);
        assert_close(corrs[1], -1.0, 1e-12);
    }

    #[test]
    fn constant_columns_are_nan_not_errors() {
        let a = array![[1.0, 5.0, 1.0], [2.0, 5.0, 2.0], [3.0, 5.0, 3.0]];
        let b = array![[1.0, 1.0, 7.0], [3.0, 2.0, 7.0], [2.0, 3.0, 7.0]];
        let corrs = column_correlation(a.view(), b.view()).expect("same shape");
        assert!(corrs[0].is_finite());
        assert!(corrs[1].is_nan());
        assert!(corrs[2].is_nan());
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let a = Array2::<f64>::zeros((4, 3));
        let b = Array2::<f64>::zeros((4, 2));
        let err = column_correlation(a.view(), b.view()).expect_err("shapes differ");
        assert!(matches!(err, VoxfitError::InvalidInput(_)));
    }

    #[test]
    fn empty_sample_axis_is_an_error() {
        let a = Array2::<f64>::zeros((0, 3));
        let err = column_correlation(a.view(), a.view()).expect_err("no samples");
        assert!(err.to_string().contains("at least one sample"));
    }
}
