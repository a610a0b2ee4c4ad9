// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(dead_code)]

use ndarray::Array2;

pub const MAX_VALUE_LEN: usize = 2048;

pub struct ByteCursor<'a> {
    data: &'a [u8],
    idx: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, idx: 0 }
    }

    pub fn next_u8(&mut self) -> u8 {
        let value = self.data.get(self.idx).copied().unwrap_or(0);
        self.idx = self.idx.saturating_add(1);
        value
    }

    pub fn take_padded(&mut self, len: usize) -> Vec<u8> {
        let mut out = vec![0_u8; len];
        let available = self.data.len().saturating_sub(self.idx);
        let copy_len = available.min(len);
        if copy_len > 0 {
            let start = self.idx;
            let end = start + copy_len;
            out[..copy_len].copy_from_slice(&self.data[start..end]);
            self.idx = end;
        }
        out
    }

    pub fn remaining(&self) -> &[u8] {
        if self.idx >= self.data.len() {
            &[]
        } else {
            &self.data[self.idx..]
        }
    }
}

/// Raw little-endian `f64`s; non-finite values are kept when `keep_special`.
pub fn decode_f64_chunks(bytes: &[u8], max_values: usize, keep_special: bool) -> Vec<f64> {
    let capped = max_values.min(MAX_VALUE_LEN);
    bytes
        .chunks_exact(8)
        .take(capped)
        .map(|chunk| {
            let mut raw = [0_u8; 8];
            raw.copy_from_slice(chunk);
            let value = f64::from_le_bytes(raw);
            if value.is_finite() {
                value.clamp(-1.0e9, 1.0e9)
            } else if keep_special {
                value
            } else {
                0.0
            }
        })
        .collect()
}

pub fn bounded(seed: u8, min: usize, max_inclusive: usize) -> usize {
    if max_inclusive <= min {
        min
    } else {
        min + (usize::from(seed) % (max_inclusive - min + 1))
    }
}

/// `(rows, cols)` matrix filled from `values`, zero-padded.
pub fn matrix(rows: usize, cols: usize, values: &[f64]) -> Array2<f64> {
    Array2::from_shape_fn((rows, cols), |(i, j)| {
        values.get(i * cols + j).copied().unwrap_or(0.0)
    })
}
