// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

pub mod encoder;
pub mod kernel;
pub mod ridge;
pub mod split;

pub use encoder::{
    EncodingFit, aggregate_fold_correlations, fit_encoding, fit_encoding_cv, fit_encoding_single,
};
pub use kernel::{Kernel, KernelRidge};
pub use ridge::{AlphaScore, Ridge, RidgeCv, RidgeCvFit, r2_score};
pub use split::{FoldIndices, KFold, single_split, trim_edges};
