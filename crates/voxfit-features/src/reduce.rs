// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

use ndarray::{Array1, Array2, ArrayView2, Axis};
use voxfit_core::{VoxfitError, thin_svd};

/// Column-wise z-scoring with population statistics.
#[derive(Clone, Debug, PartialEq)]
pub struct Standardizer {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl Standardizer {
    /// Fits per-column mean and population std; zero-variance columns keep
    /// scale `1.0` so they map to zeros rather than NaN.
    pub fn fit(x: ArrayView2<'_, f64>) -> Result<Self, VoxfitError> {
        if x.nrows() == 0 {
            return Err(VoxfitError::invalid_input(
                "standardizer requires at least one row; got 0",
            ));
        }
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| VoxfitError::invalid_input("standardizer mean of empty axis"))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|std| if std == 0.0 || !std.is_finite() { 1.0 } else { std });
        Ok(Self { mean, scale })
    }

    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, VoxfitError> {
        if x.ncols() != self.mean.len() {
            return Err(VoxfitError::invalid_input(format!(
                "standardizer fitted on {} columns; got {}",
                self.mean.len(),
                x.ncols()
            )));
        }
        Ok((&x - &self.mean) / &self.scale)
    }

    pub fn fit_transform(x: ArrayView2<'_, f64>) -> Result<Array2<f64>, VoxfitError> {
        Self::fit(x)?.transform(x)
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }
}

/// Principal component projection fitted by thin SVD.
#[derive(Clone, Debug)]
pub struct Pca {
    mean: Array1<f64>,
    /// `(n_components, n_features)`, rows are unit-norm loadings.
    components: Array2<f64>,
    explained_variance: Array1<f64>,
    explained_variance_ratio: Array1<f64>,
}

impl Pca {
    pub fn fit(x: ArrayView2<'_, f64>, n_components: usize) -> Result<Self, VoxfitError> {
        let (n, d) = x.dim();
        if n_components == 0 {
            return Err(VoxfitError::invalid_input("pca n_components must be >= 1; got 0"));
        }
        if n_components > n.min(d) {
            return Err(VoxfitError::invalid_input(format!(
                "pca n_components={n_components} exceeds min(n_samples, n_features)={} for shape ({n}, {d})",
                n.min(d)
            )));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| VoxfitError::invalid_input("pca mean of empty axis"))?;
        let centered = &x - &mean;
        let svd = thin_svd(centered.view())?;

        let mut components = svd.vt.slice(ndarray::s![..n_components, ..]).to_owned();
        for mut component in components.rows_mut() {
            let pivot = component
                .iter()
                .copied()
                .fold(0.0_f64, |best, v| if v.abs() > best.abs() { v } else { best });
            if pivot < 0.0 {
                component.mapv_inplace(|v| -v);
            }
        }

        let denom = if n > 1 { (n - 1) as f64 } else { 1.0 };
        let all_variance = svd.s.mapv(|s| s * s / denom);
        let total: f64 = all_variance.sum();
        let explained_variance = all_variance.slice(ndarray::s![..n_components]).to_owned();
        let explained_variance_ratio = if total > 0.0 {
            explained_variance.mapv(|v| v / total)
        } else {
            Array1::zeros(n_components)
        };

        Ok(Self {
            mean,
            components,
            explained_variance,
            explained_variance_ratio,
        })
    }

    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, VoxfitError> {
        if x.ncols() != self.mean.len() {
            return Err(VoxfitError::invalid_input(format!(
                "pca fitted on {} features; got {}",
                self.mean.len(),
                x.ncols()
            )));
        }
        Ok((&x - &self.mean).dot(&self.components.t()))
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    pub fn explained_variance(&self) -> &Array1<f64> {
        &self.explained_variance
    }

    pub fn explained_variance_ratio(&self) -> &Array1<f64> {
        &self.explained_variance_ratio
    }
}

/// Standardizes then projects onto `pca_dim` components.
///
/// `None` or `Some(0)` returns the input untouched.
pub fn reduce_features(
    x: ArrayView2<'_, f64>,
    pca_dim: Option<usize>,
) -> Result<Array2<f64>, VoxfitError> {
    let Some(dim) = pca_dim.filter(|&dim| dim > 0) else {
        return Ok(x.to_owned());
    };
    let standardized = Standardizer::fit_transform(x)?;
    let pca = Pca::fit(standardized.view(), dim)?;
    tracing::debug!(
        n_components = dim,
        retained = pca.explained_variance_ratio().sum(),
        "pca reduction"
    );
    pca.transform(standardized.view())
}
