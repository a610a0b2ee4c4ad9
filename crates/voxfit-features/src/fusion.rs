// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use ndarray::{Array2, ArrayView2, Axis, concatenate};
use voxfit_core::VoxfitError;

use crate::reduce::{Pca, Standardizer};

/// Standardizes text and audio features separately, concatenates them
/// column-wise and projects onto `pca_dim` components when that is smaller
/// than the fused width.
pub fn fuse_modalities(
    text: ArrayView2<'_, f64>,
    audio: ArrayView2<'_, f64>,
    pca_dim: Option<usize>,
) -> Result<Array2<f64>, VoxfitError> {
    if text.nrows() != audio.nrows() {
        return Err(VoxfitError::invalid_input(format!(
            "modalities must share the TR axis; got text={} rows, audio={} rows",
            text.nrows(),
            audio.nrows()
        )));
    }
    let text_z = Standardizer::fit_transform(text)?;
    let audio_z = Standardizer::fit_transform(audio)?;
    let fused = concatenate(Axis(1), &[text_z.view(), audio_z.view()])
        .map_err(|err| VoxfitError::invalid_input(format!("modality concat failed: {err}")))?;

    match pca_dim.filter(|&dim| dim > 0 && dim < fused.ncols()) {
        Some(dim) => {
            let pca = Pca::fit(fused.view(), dim)?;
            tracing::debug!(
                text_cols = text.ncols(),
                audio_cols = audio.ncols(),
                n_components = dim,
                "fused modalities reduced"
            );
            pca.transform(fused.view())
        }
        None => Ok(fused),
    }
}
