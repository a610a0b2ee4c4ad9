// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::VoxfitError;

pub const DEFAULT_TR_SECONDS: f64 = 1.5;
pub const DEFAULT_FIR_WINDOW: usize = 4;
pub const DEFAULT_FIR_OFFSET: usize = 1;
pub const DEFAULT_KFOLD: usize = 1;
pub const DEFAULT_INNER_FOLDS: usize = 5;
pub const DEFAULT_PCA_DIM: usize = 250;
pub const DEFAULT_EXCLUDED: usize = 10;
pub const DEFAULT_ALPHAS: [f64; 3] = [10_000.0, 100_000.0, 1_000_000.0];
pub const DEFAULT_SINGLE_SPLIT_ALPHA: f64 = 10_000.0;
pub const DEFAULT_TEST_RATIO: f64 = 0.2;

/// How event rows sharing one TR are collapsed.
///
/// Only `Mean` is implemented; the enum keeps the request explicit so an
/// unsupported mode is rejected instead of silently ignored.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TrPooling {
    #[default]
    Mean,
    Max,
    Last,
}

impl TrPooling {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Max => "max",
            Self::Last => "last",
        }
    }
}

impl std::str::FromStr for TrPooling {
    type Err = VoxfitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean" => Ok(Self::Mean),
            "max" => Ok(Self::Max),
            "last" => Ok(Self::Last),
            other => Err(VoxfitError::invalid_input(format!(
                "unknown TR pooling mode '{other}'; expected one of mean, max, last"
            ))),
        }
    }
}

/// Knobs shared by every encoding fit in a run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct EncodingConfig {
    /// Duration of one scan volume in seconds.
    pub tr_seconds: f64,
    pub fir_window: usize,
    /// Hemodynamic lag, in TRs, of the most recent delay.
    pub fir_offset: usize,
    /// Outer folds; `1` switches to a single train/test split.
    pub kfold: usize,
    /// Folds of the nested alpha search inside each outer training set.
    pub inner_folds: usize,
    pub alphas: Vec<f64>,
    pub excluded_start: usize,
    pub excluded_end: usize,
    /// `None` or `Some(0)` disables PCA.
    pub pca_dim: Option<usize>,
    pub pooling: TrPooling,
    pub single_split_alpha: f64,
    pub test_ratio: f64,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            tr_seconds: DEFAULT_TR_SECONDS,
            fir_window: DEFAULT_FIR_WINDOW,
            fir_offset: DEFAULT_FIR_OFFSET,
            kfold: DEFAULT_KFOLD,
            inner_folds: DEFAULT_INNER_FOLDS,
            alphas: DEFAULT_ALPHAS.to_vec(),
            excluded_start: DEFAULT_EXCLUDED,
            excluded_end: DEFAULT_EXCLUDED,
            pca_dim: Some(DEFAULT_PCA_DIM),
            pooling: TrPooling::Mean,
            single_split_alpha: DEFAULT_SINGLE_SPLIT_ALPHA,
            test_ratio: DEFAULT_TEST_RATIO,
        }
    }
}

impl EncodingConfig {
    /// PCA target dimensionality, with `Some(0)` folded into `None`.
    pub fn effective_pca_dim(&self) -> Option<usize> {
        self.pca_dim.filter(|&dim| dim > 0)
    }

    /// True when the outer loop is a K-fold split rather than one holdout.
    pub fn uses_cross_validation(&self) -> bool {
        self.kfold >= 2
    }
}

/// Validates that every alpha is finite and strictly positive.
pub fn validate_alphas(alphas: &[f64]) -> Result<(), VoxfitError> {
    if alphas.is_empty() {
        return Err(VoxfitError::invalid_input(
            "alphas must contain at least one candidate; got 0",
        ));
    }
    for (idx, &alpha) in alphas.iter().enumerate() {
        if !alpha.is_finite() || alpha <= 0.0 {
            return Err(VoxfitError::invalid_input(format!(
                "alphas[{idx}] must be finite and > 0.0; got {alpha}"
            )));
        }
    }
    Ok(())
}

/// Validates a holdout fraction in the open interval `(0, 1)`.
pub fn validate_test_ratio(test_ratio: f64) -> Result<(), VoxfitError> {
    if !test_ratio.is_finite() || test_ratio <= 0.0 || test_ratio >= 1.0 {
        return Err(VoxfitError::invalid_input(format!(
            "test_ratio must satisfy 0.0 < ratio < 1.0; got {test_ratio}"
        )));
    }
    Ok(())
}

/// Validates shape-level settings that do not depend on data length.
pub fn validate_config(config: &EncodingConfig) -> Result<(), VoxfitError> {
    if !config.tr_seconds.is_finite() || config.tr_seconds <= 0.0 {
        return Err(VoxfitError::invalid_input(format!(
            "config.tr_seconds must be finite and > 0.0; got {}",
            config.tr_seconds
        )));
    }
    if config.fir_window == 0 {
        return Err(VoxfitError::invalid_input(
            "config.fir_window must be >= 1; got 0",
        ));
    }
    if config.kfold == 0 {
        return Err(VoxfitError::invalid_input(
            "config.kfold must be >= 1 (1 = single split); got 0",
        ));
    }
    if config.inner_folds < 2 {
        return Err(VoxfitError::invalid_input(format!(
            "config.inner_folds must be >= 2; got {}",
            config.inner_folds
        )));
    }
    validate_alphas(&config.alphas)?;
    if !config.single_split_alpha.is_finite() || config.single_split_alpha <= 0.0 {
        return Err(VoxfitError::invalid_input(format!(
            "config.single_split_alpha must be finite and > 0.0; got {}",
            config.single_split_alpha
        )));
    }
    validate_test_ratio(config.test_ratio)?;
    if config.pooling != TrPooling::Mean {
        return Err(VoxfitError::not_supported(format!(
            "config.pooling={} is not supported for TR alignment; only mean pooling is",
            config.pooling.as_str()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        EncodingConfig, TrPooling, validate_alphas, validate_config, validate_test_ratio,
    };
    use crate::VoxfitError;

    #[test]
    fn default_config_is_valid_and_matches_pipeline_defaults() {
        let config = EncodingConfig::default();
        validate_config(&config).expect("defaults should validate");
        assert_eq!(config.tr_seconds, 1.5);
        assert_eq!(config.fir_window, 4);
        assert_eq!(config.fir_offset, 1);
        assert_eq!(config.alphas, vec![1e4, 1e5, 1e6]);
        assert_eq!(config.effective_pca_dim(), Some(250));
        assert!(!config.uses_cross_validation());
    }

    #[test]
    fn zero_pca_dim_disables_reduction() {
        let config = EncodingConfig {
            pca_dim: Some(0),
            ..EncodingConfig::default()
        };
        assert_eq!(config.effective_pca_dim(), None);
    }

    #[test]
    fn rejects_zero_window_and_zero_folds() {
        let err = validate_config(&EncodingConfig {
            fir_window: 0,
            ..EncodingConfig::default()
        })
        .expect_err("window 0 is invalid");
        assert!(err.to_string().contains("fir_window"));

        let err = validate_config(&EncodingConfig {
            kfold: 0,
            ..EncodingConfig::default()
        })
        .expect_err("kfold 0 is invalid");
        assert!(err.to_string().contains("kfold"));
    }

    #[test]
    fn rejects_bad_alphas() {
        assert!(validate_alphas(&[]).is_err());
        assert!(validate_alphas(&[1.0, -2.0]).is_err());
        assert!(validate_alphas(&[f64::NAN]).is_err());
        assert!(validate_alphas(&[0.5, 10.0]).is_ok());
    }

    #[test]
    fn rejects_test_ratio_outside_open_interval() {
        assert!(validate_test_ratio(0.0).is_err());
        assert!(validate_test_ratio(1.0).is_err());
        assert!(validate_test_ratio(0.25).is_ok());
    }

    #[test]
    fn non_mean_pooling_is_not_supported() {
        let err = validate_config(&EncodingConfig {
            pooling: TrPooling::Max,
            ..EncodingConfig::default()
        })
        .expect_err("max pooling is rejected");
        assert!(matches!(err, VoxfitError::NotSupported(_)));
    }

    #[test]
    fn pooling_parses_known_names_only() {
        assert_eq!("mean".parse::<TrPooling>().ok(), Some(TrPooling::Mean));
        assert_eq!("last".parse::<TrPooling>().ok(), Some(TrPooling::Last));
        assert!("median".parse::<TrPooling>().is_err());
    }
}
