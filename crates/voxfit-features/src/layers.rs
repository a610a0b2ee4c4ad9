// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

use std::collections::BTreeMap;

use ndarray::{Array2, Array3, ArrayView2, Axis, concatenate, s};
use voxfit_core::VoxfitError;

/// Which hidden layers of a model to extract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayerSelection {
    /// `count` layers spread evenly over `1..=total`.
    Relative { count: usize },
    /// Explicit layer indices; `0` is the embedding output.
    Absolute(Vec<usize>),
}

/// Resolves a selection to sorted, unique layer indices in `[0, total]`.
pub fn resolve_layers(total: usize, selection: &LayerSelection) -> Result<Vec<usize>, VoxfitError> {
    let mut layers = match selection {
        LayerSelection::Relative { count } => {
            if *count == 0 {
                return Err(VoxfitError::invalid_input(
                    "relative layer count must be >= 1; got 0",
                ));
            }
            if total == 0 {
                return Err(VoxfitError::invalid_input(
                    "model reports 0 layers; cannot spread a relative selection",
                ));
            }
            if *count == 1 {
                vec![1]
            } else {
                let step = (total - 1) as f64 / (*count - 1) as f64;
                (0..*count)
                    .map(|idx| (1.0 + idx as f64 * step).round() as usize)
                    .collect()
            }
        }
        LayerSelection::Absolute(list) => {
            if list.is_empty() {
                return Err(VoxfitError::invalid_input(
                    "absolute layer list must not be empty",
                ));
            }
            list.clone()
        }
    };
    layers.sort_unstable();
    layers.dedup();
    if let Some(&bad) = layers.iter().find(|&&layer| layer > total) {
        return Err(VoxfitError::invalid_input(format!(
            "layer {bad} is out of range for a model with {total} layers"
        )));
    }
    Ok(layers)
}

/// Collects per-batch feature rows for each requested layer.
#[derive(Clone, Debug, Default)]
pub struct LayerAccumulator {
    batches: BTreeMap<usize, Vec<Array2<f64>>>,
}

impl LayerAccumulator {
    pub fn new(layers: &[usize]) -> Self {
        Self {
            batches: layers.iter().map(|&layer| (layer, Vec::new())).collect(),
        }
    }

    pub fn layers(&self) -> impl Iterator<Item = usize> + '_ {
        self.batches.keys().copied()
    }

    pub fn push(&mut self, layer: usize, rows: Array2<f64>) -> Result<(), VoxfitError> {
        let slot = self.batches.get_mut(&layer).ok_or_else(|| {
            VoxfitError::invalid_input(format!("layer {layer} was not requested"))
        })?;
        if let Some(first) = slot.first()
            && first.ncols() != rows.ncols()
        {
            return Err(VoxfitError::invalid_input(format!(
                "layer {layer} batch width changed from {} to {}",
                first.ncols(),
                rows.ncols()
            )));
        }
        slot.push(rows);
        Ok(())
    }

    /// Concatenates each layer's batches along the row axis.
    pub fn finish(self) -> Result<BTreeMap<usize, Array2<f64>>, VoxfitError> {
        let mut out = BTreeMap::new();
        for (layer, batches) in self.batches {
            if batches.is_empty() {
                return Err(VoxfitError::invalid_input(format!(
                    "layer {layer} received no batches"
                )));
            }
            let views: Vec<ArrayView2<'_, f64>> = batches.iter().map(|b| b.view()).collect();
            let stacked = concatenate(Axis(0), &views).map_err(|err| {
                VoxfitError::invalid_input(format!("layer {layer} concat failed: {err}"))
            })?;
            out.insert(layer, stacked);
        }
        Ok(out)
    }
}

/// How token-level hidden states collapse to one vector per sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TokenPooling {
    #[default]
    Mean,
    Last,
}

/// A model forward pass exposing per-layer hidden states.
///
/// Each entry is `(batch, tokens, hidden)`; entry `0` is the embedding output.
pub trait HiddenStateSource {
    fn hidden_states(&self) -> &[Array3<f64>];

    fn n_layers(&self) -> usize {
        self.hidden_states().len().saturating_sub(1)
    }
}

/// Pools one layer's hidden states over valid tokens.
///
/// `mask` is `(batch, tokens)` with non-zero marking real tokens. `Last` picks
/// the final valid token of each sequence.
pub fn pool_tokens<S: HiddenStateSource + ?Sized>(
    source: &S,
    layer: usize,
    mask: ArrayView2<'_, u8>,
    pooling: TokenPooling,
) -> Result<Array2<f64>, VoxfitError> {
    let states = source.hidden_states().get(layer).ok_or_else(|| {
        VoxfitError::invalid_input(format!(
            "layer {layer} not available; source has {} hidden-state entries",
            source.hidden_states().len()
        ))
    })?;
    let (batch, tokens, hidden) = states.dim();
    if mask.dim() != (batch, tokens) {
        return Err(VoxfitError::invalid_input(format!(
            "token mask shape {:?} does not match hidden states ({batch}, {tokens})",
            mask.shape()
        )));
    }

    let mut pooled = Array2::<f64>::zeros((batch, hidden));
    for b in 0..batch {
        let valid: Vec<usize> = (0..tokens).filter(|&t| mask[[b, t]] != 0).collect();
        let Some(&last) = valid.last() else {
            return Err(VoxfitError::invalid_input(format!(
                "sequence {b} has no valid tokens"
            )));
        };
        let mut row = pooled.row_mut(b);
        match pooling {
            TokenPooling::Last => row.assign(&states.slice(s![b, last, ..])),
            TokenPooling::Mean => {
                for &t in &valid {
                    row += &states.slice(s![b, t, ..]);
                }
                row /= valid.len() as f64;
            }
        }
    }
    Ok(pooled)
}
