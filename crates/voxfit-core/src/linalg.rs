// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Bridge between `ndarray` storage and `nalgebra` decompositions.
//!
//! Data is held as `ndarray` everywhere in voxfit; factorizations go through
//! `nalgebra` and come back as `ndarray`.

use nalgebra::{Cholesky, DMatrix, SVD};
use ndarray::{Array1, Array2, ArrayView2};

use crate::VoxfitError;

const SVD_MAX_ITERATIONS: usize = 0;

/// Thin singular value decomposition `x = u * diag(s) * vt`.
///
/// Singular values are sorted in descending order; `u` is `(n, k)` and `vt`
/// is `(k, p)` with `k = min(n, p)`.
#[derive(Clone, Debug)]
pub struct ThinSvd {
    pub u: Array2<f64>,
    pub s: Array1<f64>,
    pub vt: Array2<f64>,
}

pub fn to_dmatrix(x: ArrayView2<'_, f64>) -> DMatrix<f64> {
    DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| x[[i, j]])
}

pub fn to_array2(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

/// Computes a thin SVD, failing with `NumericalIssue` on non-convergence or
/// non-finite input.
pub fn thin_svd(x: ArrayView2<'_, f64>) -> Result<ThinSvd, VoxfitError> {
    if x.is_empty() {
        return Err(VoxfitError::invalid_input(format!(
            "thin_svd requires a non-empty matrix; got shape {:?}",
            x.shape()
        )));
    }
    if x.iter().any(|value| !value.is_finite()) {
        return Err(VoxfitError::numerical_issue(format!(
            "thin_svd input of shape {:?} contains non-finite values",
            x.shape()
        )));
    }

    let (n, p) = x.dim();
    let svd = SVD::try_new(to_dmatrix(x), true, true, f64::EPSILON, SVD_MAX_ITERATIONS)
        .ok_or_else(|| {
            VoxfitError::numerical_issue(format!("svd did not converge for {n}x{p} matrix"))
        })?;

    let u = svd
        .u
        .as_ref()
        .ok_or_else(|| VoxfitError::numerical_issue("svd did not return U"))?;
    let vt = svd
        .v_t
        .as_ref()
        .ok_or_else(|| VoxfitError::numerical_issue("svd did not return V^T"))?;

    let k = svd.singular_values.len();
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]));

    let s = Array1::from_iter(order.iter().map(|&idx| svd.singular_values[idx]));
    let u_sorted = Array2::from_shape_fn((n, k), |(i, j)| u[(i, order[j])]);
    let vt_sorted = Array2::from_shape_fn((k, p), |(i, j)| vt[(order[i], j)]);

    Ok(ThinSvd {
        u: u_sorted,
        s,
        vt: vt_sorted,
    })
}

/// Solves `a * x = b` for symmetric positive-definite `a` via Cholesky.
pub fn solve_spd(a: ArrayView2<'_, f64>, b: ArrayView2<'_, f64>) -> Result<Array2<f64>, VoxfitError> {
    if a.nrows() != a.ncols() || a.nrows() != b.nrows() {
        return Err(VoxfitError::invalid_input(format!(
            "solve_spd requires square a with matching rows in b; got a={:?}, b={:?}",
            a.shape(),
            b.shape()
        )));
    }
    let cholesky = Cholesky::new(to_dmatrix(a)).ok_or_else(|| {
        VoxfitError::numerical_issue(format!(
            "cholesky factorization failed for {}x{} system; matrix is not positive definite",
            a.nrows(),
            a.ncols()
        ))
    })?;
    Ok(to_array2(&cholesky.solve(&to_dmatrix(b))))
}
