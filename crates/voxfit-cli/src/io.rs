// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use ndarray::{Array1, Array2};
use ndarray_npy::{ReadNpyError, read_npy, write_npy};
use voxfit_core::{EncodingConfig, VoxfitError};
use voxfit_features::{AlignmentTable, RawAlignmentRow};

fn missing(path: &Path) -> VoxfitError {
    VoxfitError::missing_artifact(path.display().to_string())
}

fn npy_error(path: &Path, err: ReadNpyError) -> VoxfitError {
    VoxfitError::invalid_input(format!("{}: {err}", path.display()))
}

/// Reads a 2D `.npy` as `f64`, widening `f32` files.
pub fn read_matrix(path: &Path) -> Result<Array2<f64>, VoxfitError> {
    if !path.is_file() {
        return Err(missing(path));
    }
    match read_npy::<_, Array2<f64>>(path) {
        Ok(array) => Ok(array),
        Err(ReadNpyError::WrongDescriptor(_)) => read_npy::<_, Array2<f32>>(path)
            .map(|array| array.mapv(f64::from))
            .map_err(|err| npy_error(path, err)),
        Err(err) => Err(npy_error(path, err)),
    }
}

pub fn read_vector(path: &Path) -> Result<Array1<f64>, VoxfitError> {
    if !path.is_file() {
        return Err(missing(path));
    }
    match read_npy::<_, Array1<f64>>(path) {
        Ok(array) => Ok(array),
        Err(ReadNpyError::WrongDescriptor(_)) => read_npy::<_, Array1<f32>>(path)
            .map(|array| array.mapv(f64::from))
            .map_err(|err| npy_error(path, err)),
        Err(err) => Err(npy_error(path, err)),
    }
}

/// Reads integer atlas labels stored as `int32` or `int64`.
pub fn read_labels(path: &Path) -> Result<Vec<u32>, VoxfitError> {
    if !path.is_file() {
        return Err(missing(path));
    }
    let raw: Vec<i64> = match read_npy::<_, Array1<i32>>(path) {
        Ok(array) => array.iter().map(|&v| i64::from(v)).collect(),
        Err(ReadNpyError::WrongDescriptor(_)) => read_npy::<_, Array1<i64>>(path)
            .map_err(|err| npy_error(path, err))?
            .to_vec(),
        Err(err) => return Err(npy_error(path, err)),
    };
    raw.into_iter()
        .map(|label| {
            u32::try_from(label).map_err(|_| {
                VoxfitError::invalid_input(format!(
                    "{}: label {label} is not a non-negative 32-bit index",
                    path.display()
                ))
            })
        })
        .collect()
}

pub fn write_matrix(path: &Path, array: &Array2<f64>) -> anyhow::Result<()> {
    ensure_parent(path)?;
    write_npy(path, array).with_context(|| format!("writing {}", path.display()))
}

pub fn write_vector(path: &Path, array: &Array1<f64>) -> anyhow::Result<()> {
    ensure_parent(path)?;
    write_npy(path, array).with_context(|| format!("writing {}", path.display()))
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    Ok(())
}

/// `cased, uncased, start, end`; empty fields are missing values.
type AlignmentCsvRow = (Option<String>, Option<String>, Option<f64>, Option<f64>);

/// Loads a word alignment CSV whose columns are, by position,
/// `cased, uncased, start, end`.
///
/// Transcript exports carry no header row; pass `has_header` for files that do.
pub fn read_alignment_csv(
    path: &Path,
    tr_seconds: f64,
    has_header: bool,
) -> Result<AlignmentTable, VoxfitError> {
    if !path.is_file() {
        return Err(missing(path));
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(has_header)
        .from_path(path)
        .map_err(|err| VoxfitError::invalid_input(format!("{}: {err}", path.display())))?;
    let mut rows = Vec::new();
    for (idx, record) in reader.deserialize::<AlignmentCsvRow>().enumerate() {
        let (cased, uncased, start_s, end_s) = record.map_err(|err| {
            VoxfitError::invalid_input(format!("{} row {}: {err}", path.display(), idx + 1))
        })?;
        rows.push(RawAlignmentRow {
            cased,
            uncased,
            start_s,
            end_s,
        });
    }
    AlignmentTable::from_timestamps(rows, tr_seconds)
}

/// Loads an [`EncodingConfig`] from JSON; missing keys keep their defaults.
pub fn read_config(path: &Path) -> anyhow::Result<EncodingConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

pub fn response_path(dir: &Path, subject: u32) -> PathBuf {
    dir.join(format!("sub-{subject}.npy"))
}

/// Reads `<dir>/sub-<id>.npy` for every subject once, up front.
///
/// A missing subject fails the whole load; every subject must share the TR
/// count of the first.
pub fn load_responses(dir: &Path, subjects: &[u32]) -> Result<BTreeMap<u32, Array2<f64>>, VoxfitError> {
    let mut responses = BTreeMap::new();
    let mut n_trs: Option<usize> = None;
    for &subject in subjects {
        let y = read_matrix(&response_path(dir, subject))?;
        match n_trs {
            Some(expected) if expected != y.nrows() => {
                return Err(VoxfitError::invalid_input(format!(
                    "subject {subject} has {} TRs; subject {} has {expected}",
                    y.nrows(),
                    subjects[0]
                )));
            }
            Some(_) => {}
            None => n_trs = Some(y.nrows()),
        }
        tracing::debug!(subject, rows = y.nrows(), targets = y.ncols(), "responses loaded");
        responses.insert(subject, y);
    }
    Ok(responses)
}
