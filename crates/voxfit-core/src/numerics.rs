// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Computes the mean using Welford's online update.
///
/// Empty input returns `NaN`. Any `NaN` element makes the result `NaN`.
pub fn stable_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }

    let mut mean = 0.0;
    for (idx, &value) in values.iter().enumerate() {
        let n = (idx + 1) as f64;
        mean += (value - mean) / n;
    }
    mean
}

/// Population variance (`/ n`) around `mean`, accumulated with Kahan compensation.
///
/// Empty input returns `NaN`. Negative round-off is clamped to `0.0`; `NaN`
/// residuals propagate.
pub fn population_variance(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }

    let mut sum_sq = 0.0;
    let mut c = 0.0;
    for &value in values {
        let diff = value - mean;
        let y = diff * diff - c;
        let t = sum_sq + y;
        c = (t - sum_sq) - y;
        sum_sq = t;
    }

    let variance = sum_sq / values.len() as f64;
    if variance.is_nan() {
        f64::NAN
    } else if variance <= 0.0 {
        0.0
    } else {
        variance
    }
}

/// Median with the even-length midpoint convention.
///
/// Empty input or any `NaN` element returns `NaN`.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() || values.iter().any(|value| value.is_nan()) {
        return f64::NAN;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        0.5 * (sorted[mid - 1] + sorted[mid])
    }
}

/// Mean that skips `NaN` entries; all-`NaN` or empty input returns `NaN`.
pub fn nan_mean(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    stable_mean(&finite)
}

/// Fisher z-transform `atanh(r)`.
///
/// `r = ±1` maps to `±inf`; `NaN` stays `NaN`.
pub fn fisher_z(r: f64) -> f64 {
    r.atanh()
}

/// Inverse Fisher transform `tanh(z)`.
pub fn fisher_z_inverse(z: f64) -> f64 {
    z.tanh()
}

/// Averages correlations in z-space: `tanh(mean(atanh(r)))`.
///
/// This is not the arithmetic mean of `r`. Empty input returns `NaN`.
pub fn fisher_mean(correlations: &[f64]) -> f64 {
    let z: Vec<f64> = correlations.iter().copied().map(fisher_z).collect();
    fisher_z_inverse(stable_mean(&z))
}
