// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

use ndarray::{Array2, ArrayView1, s};
use voxfit_core::VoxfitError;

/// Splits a waveform into one window per TR for audio-model input.
///
/// Each window spans `tr_win` TRs of samples and the hop is one TR. Windows
/// are anchored at the end of the recording, so the last window ends on the
/// final sample and any remainder is dropped from the front. When the waveform yields fewer than `n_trs` windows, the
/// first window is repeated at the front until there are `n_trs` rows.
pub fn chunk_audio(
    waveform: ArrayView1<'_, f64>,
    sample_rate: u32,
    n_trs: usize,
    tr_seconds: f64,
    tr_win: usize,
) -> Result<Array2<f64>, VoxfitError> {
    if sample_rate == 0 {
        return Err(VoxfitError::invalid_input("sample_rate must be > 0; got 0"));
    }
    if !tr_seconds.is_finite() || tr_seconds <= 0.0 {
        return Err(VoxfitError::invalid_input(format!(
            "tr_seconds must be finite and > 0.0; got {tr_seconds}"
        )));
    }
    if tr_win == 0 {
        return Err(VoxfitError::invalid_input("tr_win must be >= 1; got 0"));
    }

    let tr_frames = (tr_seconds * f64::from(sample_rate)) as usize;
    if tr_frames == 0 {
        return Err(VoxfitError::invalid_input(format!(
            "one TR of {tr_seconds}s at {sample_rate}Hz rounds to zero samples"
        )));
    }
    let chunk_frames = tr_frames * tr_win;
    let n = waveform.len();
    if n < chunk_frames {
        return Err(VoxfitError::invalid_input(format!(
            "waveform has {n} samples; one {tr_win}-TR window needs {chunk_frames}"
        )));
    }

    let n_chunks = (n - chunk_frames) / tr_frames + 1;
    let n_rows = n_chunks.max(n_trs);
    let pad = n_rows - n_chunks;
    let mut chunks = Array2::<f64>::zeros((n_rows, chunk_frames));
    for idx in 0..n_chunks {
        let end = n - (n_chunks - 1 - idx) * tr_frames;
        chunks
            .row_mut(pad + idx)
            .assign(&waveform.slice(s![end - chunk_frames..end]));
    }
    if pad > 0 {
        let first = chunks.row(pad).to_owned();
        for row in 0..pad {
            chunks.row_mut(row).assign(&first);
        }
        tracing::debug!(pad, n_chunks, n_trs, "front-padded audio chunks");
    }
    Ok(chunks)
}
