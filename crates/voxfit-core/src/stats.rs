// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::VoxfitError;
use crate::numerics::{median, population_variance, stable_mean};

/// Summary of per-subject mean correlations for one feature configuration.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SummaryStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl SummaryStats {
    /// All-`NaN` summary, produced when any input is `NaN`.
    pub const fn nan() -> Self {
        Self {
            mean: f64::NAN,
            std: f64::NAN,
            min: f64::NAN,
            max: f64::NAN,
            median: f64::NAN,
        }
    }

    /// True when any field is `NaN`.
    pub fn has_nan(&self) -> bool {
        [self.mean, self.std, self.min, self.max, self.median]
            .iter()
            .any(|value| value.is_nan())
    }
}

/// Computes `{mean, std, min, max, median}` with population formulas.
///
/// `NaN` is never skipped: a single `NaN` subject yields an all-`NaN` summary
/// so an upstream failure stays visible. Empty input is an error.
pub fn summarize(values: &[f64]) -> Result<SummaryStats, VoxfitError> {
    if values.is_empty() {
        return Err(VoxfitError::invalid_input(
            "summarize requires at least one value; got 0",
        ));
    }
    if values.iter().any(|value| value.is_nan()) {
        return Ok(SummaryStats::nan());
    }

    let mean = stable_mean(values);
    let std = population_variance(values, mean).sqrt();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Ok(SummaryStats {
        mean,
        std,
        min,
        max,
        median: median(values),
    })
}
