// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

//! Finite impulse response delay embedding.
//!
//! Output row `t` holds the `window` most recent feature vectors strictly
//! preceding `t` by at least `offset` TRs, most recent first. No output row
//! ever reads a feature row from its own time step or the future when
//! `offset >= 1`.

use ndarray::{Array2, Array3, ArrayView2, Axis, s};
use voxfit_core::VoxfitError;

/// Embeds `features` `(T, D)` into `(T, window, D)` delayed copies.
///
/// Block `w` of row `t` is `features[t - offset - w]`, or zeros when that
/// index is negative.
pub fn fir_embed(
    features: ArrayView2<'_, f64>,
    window: usize,
    offset: usize,
) -> Result<Array3<f64>, VoxfitError> {
    if window == 0 {
        return Err(VoxfitError::invalid_input("fir window must be >= 1; got 0"));
    }
    let (t, d) = features.dim();
    let mut embedded = Array3::<f64>::zeros((t, window, d));
    for w in 0..window {
        let lag = offset + w;
        if lag >= t {
            continue;
        }
        embedded
            .slice_mut(s![lag.., w, ..])
            .assign(&features.slice(s![..t - lag, ..]));
    }
    Ok(embedded)
}

/// [`fir_embed`] flattened to `(T, window * D)`.
///
/// Columns `w * D .. (w + 1) * D` hold delay block `w`.
pub fn fir_embed_flat(
    features: ArrayView2<'_, f64>,
    window: usize,
    offset: usize,
) -> Result<Array2<f64>, VoxfitError> {
    let (t, d) = features.dim();
    let embedded = fir_embed(features, window, offset)?;
    embedded
        .into_shape_with_order((t, window * d))
        .map_err(|err| VoxfitError::invalid_input(format!("fir reshape failed: {err}")))
}

/// Straightforward delay stack used to cross-check [`fir_embed_flat`].
///
/// Each entry of `delays` contributes one `(T, D)` block with row `t` equal to
/// `features[t - delay]`. Out-of-range rows are zero unless `circular` wraps
/// them modulo `T`. Negative delays shift toward the future.
pub fn delay_stack_reference(
    features: ArrayView2<'_, f64>,
    delays: &[isize],
    circular: bool,
) -> Array2<f64> {
    let (t, d) = features.dim();
    let mut stacked = Array2::<f64>::zeros((t, delays.len() * d));
    if t == 0 {
        return stacked;
    }
    let t_signed = t as isize;
    for (block, &delay) in delays.iter().enumerate() {
        for row in 0..t {
            let mut source = row as isize - delay;
            if circular {
                source = source.rem_euclid(t_signed);
            } else if source < 0 || source >= t_signed {
                continue;
            }
            stacked
                .slice_mut(s![row, block * d..(block + 1) * d])
                .assign(&features.index_axis(Axis(0), source as usize));
        }
    }
    stacked
}
