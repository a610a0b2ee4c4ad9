// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use ndarray::{Array2, ArrayView2, Axis};
use voxfit_core::{VoxfitError, solve_spd, validate_alphas};

/// Similarity function for kernel ridge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Kernel {
    Linear,
    /// `exp(-gamma * |a - b|^2)`; `None` uses `1 / n_features`.
    Rbf { gamma: Option<f64> },
    /// `(gamma * <a, b> + coef0)^degree`
    Polynomial {
        degree: u32,
        gamma: Option<f64>,
        coef0: f64,
    },
}

impl Default for Kernel {
    fn default() -> Self {
        Self::Rbf { gamma: None }
    }
}

impl Kernel {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Rbf { .. } => "rbf",
            Self::Polynomial { .. } => "polynomial",
        }
    }

    /// Gram matrix `(a.nrows(), b.nrows())`.
    pub fn gram(&self, a: ArrayView2<'_, f64>, b: ArrayView2<'_, f64>) -> Result<Array2<f64>, VoxfitError> {
        if a.ncols() != b.ncols() {
            return Err(VoxfitError::invalid_input(format!(
                "kernel inputs must share feature count; got {} and {}",
                a.ncols(),
                b.ncols()
            )));
        }
        let default_gamma = 1.0 / a.ncols().max(1) as f64;
        let inner = a.dot(&b.t());
        Ok(match *self {
            Self::Linear => inner,
            Self::Rbf { gamma } => {
                let gamma = gamma.unwrap_or(default_gamma);
                let a_sq = a.map_axis(Axis(1), |row| row.dot(&row));
                let b_sq = b.map_axis(Axis(1), |row| row.dot(&row));
                let mut gram = inner;
                for ((i, j), value) in gram.indexed_iter_mut() {
                    let dist = (a_sq[i] + b_sq[j] - 2.0 * *value).max(0.0);
                    *value = (-gamma * dist).exp();
                }
                gram
            }
            Self::Polynomial {
                degree,
                gamma,
                coef0,
            } => {
                let gamma = gamma.unwrap_or(default_gamma);
                inner.mapv(|v| (gamma * v + coef0).powi(degree as i32))
            }
        })
    }
}

/// Kernel ridge regression without intercept.
#[derive(Clone, Debug)]
pub struct KernelRidge {
    pub alpha: f64,
    pub kernel: Kernel,
    train_x: Array2<f64>,
    /// Dual coefficients `(n_train, n_targets)`.
    dual: Array2<f64>,
}

impl KernelRidge {
    /// Solves `(K + alpha * I) C = Y` by Cholesky.
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: ArrayView2<'_, f64>,
        alpha: f64,
        kernel: Kernel,
    ) -> Result<Self, VoxfitError> {
        validate_alphas(&[alpha])?;
        if x.nrows() != y.nrows() || x.nrows() == 0 {
            return Err(VoxfitError::invalid_input(format!(
                "kernel ridge requires matching non-empty rows; got x={:?}, y={:?}",
                x.shape(),
                y.shape()
            )));
        }
        let mut gram = kernel.gram(x, x)?;
        gram.diag_mut().mapv_inplace(|v| v + alpha);
        let dual = solve_spd(gram.view(), y)?;
        Ok(Self {
            alpha,
            kernel,
            train_x: x.to_owned(),
            dual,
        })
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, VoxfitError> {
        Ok(self.kernel.gram(x, self.train_x.view())?.dot(&self.dual))
    }

    pub fn dual_coef(&self) -> &Array2<f64> {
        &self.dual
    }
}
