// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::ops::Range;

use voxfit_core::{VoxfitError, validate_test_ratio};

/// One train/test partition of row indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FoldIndices {
    pub train: Vec<usize>,
    pub test: Range<usize>,
}

/// Contiguous, non-shuffled K-fold splitter.
///
/// The first `n % k` folds receive one extra row, so consecutive test blocks
/// tile `0..n` in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KFold {
    n_splits: usize,
}

impl KFold {
    pub fn new(n_splits: usize) -> Result<Self, VoxfitError> {
        if n_splits < 2 {
            return Err(VoxfitError::invalid_input(format!(
                "k-fold requires n_splits >= 2; got {n_splits}"
            )));
        }
        Ok(Self { n_splits })
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Test ranges for `n_samples` rows.
    pub fn test_ranges(&self, n_samples: usize) -> Result<Vec<Range<usize>>, VoxfitError> {
        if self.n_splits > n_samples {
            return Err(VoxfitError::invalid_input(format!(
                "cannot split {n_samples} samples into {} folds",
                self.n_splits
            )));
        }
        let base = n_samples / self.n_splits;
        let extra = n_samples % self.n_splits;
        let mut start = 0usize;
        let mut ranges = Vec::with_capacity(self.n_splits);
        for fold in 0..self.n_splits {
            let len = base + usize::from(fold < extra);
            ranges.push(start..start + len);
            start += len;
        }
        Ok(ranges)
    }

    pub fn split(&self, n_samples: usize) -> Result<Vec<FoldIndices>, VoxfitError> {
        Ok(self
            .test_ranges(n_samples)?
            .into_iter()
            .map(|test| FoldIndices {
                train: (0..test.start).chain(test.end..n_samples).collect(),
                test,
            })
            .collect())
    }
}

/// Rows kept after dropping `start` leading and `end` trailing rows.
///
/// `end == 0` keeps every trailing row.
pub fn trim_edges(n_samples: usize, start: usize, end: usize) -> Result<Range<usize>, VoxfitError> {
    let stop = n_samples.saturating_sub(end);
    if start >= stop {
        return Err(VoxfitError::invalid_input(format!(
            "excluding {start} leading and {end} trailing rows leaves nothing of {n_samples}"
        )));
    }
    Ok(start..stop)
}

/// Chronological holdout: train on `0..split`, test on `split..n`.
pub fn single_split(n_samples: usize, test_ratio: f64) -> Result<FoldIndices, VoxfitError> {
    validate_test_ratio(test_ratio)?;
    let split = (n_samples as f64 * (1.0 - test_ratio)).floor() as usize;
    if split == 0 || split >= n_samples {
        return Err(VoxfitError::invalid_input(format!(
            "test_ratio={test_ratio} on {n_samples} samples leaves an empty train or test set"
        )));
    }
    Ok(FoldIndices {
        train: (0..split).collect(),
        test: split..n_samples,
    })
}
