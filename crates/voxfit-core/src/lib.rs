// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod config;
pub mod correlation;
pub mod error;
pub mod linalg;
pub mod numerics;
pub mod observability;
pub mod stats;

pub use config::{
    DEFAULT_ALPHAS, DEFAULT_EXCLUDED, DEFAULT_FIR_OFFSET, DEFAULT_FIR_WINDOW,
    DEFAULT_INNER_FOLDS, DEFAULT_KFOLD, DEFAULT_PCA_DIM, DEFAULT_SINGLE_SPLIT_ALPHA,
    DEFAULT_TEST_RATIO, DEFAULT_TR_SECONDS, EncodingConfig, TrPooling, validate_alphas,
    validate_config, validate_test_ratio,
};
pub use correlation::column_correlation;
pub use error::{VoxfitError, ensure_shape};
pub use linalg::{ThinSvd, solve_spd, thin_svd};
pub use numerics::{
    fisher_mean, fisher_z, fisher_z_inverse, median, nan_mean, population_variance, stable_mean,
};
pub use observability::{FitObserver, NoopObserver, TracingObserver};
pub use stats::{SummaryStats, summarize};
