// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

use ndarray::{Array1, Array2, ArrayView2, s};
use voxfit_core::{TrPooling, VoxfitError};

/// Token used when the cased transcript column is empty.
pub const MISSING_TOKEN: &str = "none";

/// One stimulus event (word) with its timing and derived scan index.
#[derive(Clone, Debug, PartialEq)]
pub struct AlignmentRecord {
    pub cased: String,
    pub uncased: String,
    pub start_s: f64,
    pub end_s: f64,
    /// 1-based scan volume the event onset falls into.
    pub tr: usize,
}

/// Raw transcript row before timestamp back-filling.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawAlignmentRow {
    pub cased: Option<String>,
    pub uncased: Option<String>,
    pub start_s: Option<f64>,
    pub end_s: Option<f64>,
}

/// Maps an onset time to its 1-based TR index: `max(1, ceil(start / tr))`.
pub fn tr_index(start_s: f64, tr_seconds: f64) -> Result<usize, VoxfitError> {
    if !tr_seconds.is_finite() || tr_seconds <= 0.0 {
        return Err(VoxfitError::invalid_input(format!(
            "tr_seconds must be finite and > 0.0; got {tr_seconds}"
        )));
    }
    if !start_s.is_finite() || start_s < 0.0 {
        return Err(VoxfitError::invalid_input(format!(
            "event onset must be finite and >= 0.0; got {start_s}"
        )));
    }
    let tr = (start_s / tr_seconds).ceil() as usize;
    Ok(tr.max(1))
}

/// Chronologically ordered events with non-decreasing TR indices.
#[derive(Clone, Debug, PartialEq)]
pub struct AlignmentTable {
    records: Vec<AlignmentRecord>,
}

impl AlignmentTable {
    /// Validates ordering invariants: non-empty, `tr >= 1`, non-decreasing `tr`.
    pub fn new(records: Vec<AlignmentRecord>) -> Result<Self, VoxfitError> {
        if records.is_empty() {
            return Err(VoxfitError::invalid_input(
                "alignment table must contain at least one event; got 0",
            ));
        }
        let mut prev_tr = 0usize;
        for (idx, record) in records.iter().enumerate() {
            if record.tr == 0 {
                return Err(VoxfitError::invalid_input(format!(
                    "alignment row {idx} has tr=0; TR indices are 1-based"
                )));
            }
            if record.tr < prev_tr {
                return Err(VoxfitError::invalid_input(format!(
                    "alignment TR indices must be non-decreasing: row {idx} has tr={}, previous {prev_tr}",
                    record.tr
                )));
            }
            prev_tr = record.tr;
        }
        Ok(Self { records })
    }

    /// Builds a table from transcript rows.
    ///
    /// Missing cased tokens become [`MISSING_TOKEN`]; missing timestamps are
    /// back-filled from the next row that has one. A trailing row without any
    /// later timestamp is an error.
    pub fn from_timestamps(rows: Vec<RawAlignmentRow>, tr_seconds: f64) -> Result<Self, VoxfitError> {
        let starts = backfill(rows.iter().map(|row| row.start_s).collect(), "start")?;
        let ends = backfill(rows.iter().map(|row| row.end_s).collect(), "end")?;

        let mut records = Vec::with_capacity(rows.len());
        for ((row, start_s), end_s) in rows.into_iter().zip(starts).zip(ends) {
            let cased = row
                .cased
                .filter(|token| !token.is_empty())
                .unwrap_or_else(|| MISSING_TOKEN.to_string());
            records.push(AlignmentRecord {
                uncased: row.uncased.unwrap_or_default(),
                cased,
                start_s,
                end_s,
                tr: tr_index(start_s, tr_seconds)?,
            });
        }
        Self::new(records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[AlignmentRecord] {
        &self.records
    }

    pub fn first_tr(&self) -> usize {
        self.records[0].tr
    }

    pub fn last_tr(&self) -> usize {
        self.records[self.records.len() - 1].tr
    }

    /// Cased tokens in document order.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|record| record.cased.as_str())
    }

    /// Contiguous `(tr, start_row, end_row)` runs, end exclusive.
    fn tr_runs(&self) -> Vec<(usize, usize, usize)> {
        let mut runs = Vec::new();
        let mut start = 0usize;
        for idx in 1..=self.records.len() {
            if idx == self.records.len() || self.records[idx].tr != self.records[start].tr {
                runs.push((self.records[start].tr, start, idx));
                start = idx;
            }
        }
        runs
    }
}

fn backfill(values: Vec<Option<f64>>, column: &str) -> Result<Vec<f64>, VoxfitError> {
    let mut filled = vec![0.0; values.len()];
    let mut next: Option<f64> = None;
    for (idx, value) in values.iter().enumerate().rev() {
        if let Some(v) = value {
            next = Some(*v);
        }
        filled[idx] = next.ok_or_else(|| {
            VoxfitError::invalid_input(format!(
                "alignment row {idx} has no {column} timestamp and no later row to back-fill from"
            ))
        })?;
    }
    Ok(filled)
}

/// Collapses event-level features onto the fixed TR grid.
///
/// Rows sharing a TR are mean-pooled. The grid from the first event's TR to
/// `n_trs` is forward-filled across TRs without events, TRs before the first
/// event are zero rows, and a trailing gap repeats the last row. Events whose
/// TR lies beyond `n_trs` are dropped. The output has exactly `n_trs` rows.
pub fn align_to_tr_grid(
    table: &AlignmentTable,
    features: ArrayView2<'_, f64>,
    n_trs: usize,
    pooling: TrPooling,
) -> Result<Array2<f64>, VoxfitError> {
    if pooling != TrPooling::Mean {
        return Err(VoxfitError::not_supported(format!(
            "only mean pooling is supported for TR alignment; got {}",
            pooling.as_str()
        )));
    }
    if features.nrows() != table.len() {
        return Err(VoxfitError::invalid_input(format!(
            "feature rows must match alignment rows; got features={}, alignment={}",
            features.nrows(),
            table.len()
        )));
    }
    if n_trs == 0 {
        return Err(VoxfitError::invalid_input("n_trs must be >= 1; got 0"));
    }
    let first_tr = table.first_tr();
    if first_tr > n_trs {
        return Err(VoxfitError::invalid_input(format!(
            "first event falls in TR {first_tr}, after the last scan volume {n_trs}"
        )));
    }

    let d = features.ncols();
    let mut aligned = Array2::<f64>::zeros((n_trs, d));

    // Rows [first_tr, last_observed] in 1-based TR terms, forward-filled.
    let mut carried: Option<Array1<f64>> = None;
    let mut next_tr = first_tr;
    let mut last_written = first_tr - 1;
    for (tr, start, end) in table.tr_runs() {
        if tr > n_trs {
            break;
        }
        if let Some(fill) = carried.as_ref() {
            for gap_tr in next_tr..tr {
                aligned.row_mut(gap_tr - 1).assign(fill);
            }
        }
        let pooled = features
            .slice(s![start..end, ..])
            .mean_axis(ndarray::Axis(0))
            .ok_or_else(|| VoxfitError::invalid_input(format!("TR {tr} has no event rows")))?;
        aligned.row_mut(tr - 1).assign(&pooled);
        carried = Some(pooled);
        next_tr = tr + 1;
        last_written = tr;
    }

    if let Some(last) = carried.as_ref() {
        let trailing = n_trs - last_written;
        if trailing > 0 {
            tracing::debug!(trailing, last_tr = last_written, "edge-padding trailing TRs");
        }
        for tr in (last_written + 1)..=n_trs {
            aligned.row_mut(tr - 1).assign(last);
        }
    }

    Ok(aligned)
}

#[cfg(test)]
mod tests {
    use super::{
        AlignmentRecord, AlignmentTable, MISSING_TOKEN, RawAlignmentRow, align_to_tr_grid, tr_index,
    };
    use ndarray::{Array2, array};
    use voxfit_core::{TrPooling, VoxfitError};

    fn table_from_trs(trs: &[usize]) -> AlignmentTable {
        let records = trs
            .iter()
            .enumerate()
            .map(|(idx, &tr)| AlignmentRecord {
                cased: format!("w{idx}"),
                uncased: format!("w{idx}"),
                start_s: idx as f64,
                end_s: idx as f64 + 0.5,
                tr,
            })
            .collect();
        AlignmentTable::new(records).expect("test table should be valid")
    }

    #[test]
    fn tr_index_uses_ceiling_and_clamps_to_one() {
        assert_eq!(tr_index(0.0, 1.5).expect("valid"), 1);
        assert_eq!(tr_index(1.5, 1.5).expect("valid"), 1);
        assert_eq!(tr_index(1.51, 1.5).expect("valid"), 2);
        assert_eq!(tr_index(4.4, 1.5).expect("valid"), 3);
        assert!(tr_index(-1.0, 1.5).is_err());
        assert!(tr_index(1.0, 0.0).is_err());
    }

    #[test]
    fn table_rejects_decreasing_tr() {
        let mut records = table_from_trs(&[1, 2]).records().to_vec();
        records[1].tr = 0;
        assert!(AlignmentTable::new(records.clone()).is_err());
        records[0].tr = 3;
        records[1].tr = 2;
        let err = AlignmentTable::new(records).expect_err("decreasing TR");
        assert!(err.to_string().contains("non-decreasing"));
    }

    #[test]
    fn from_timestamps_backfills_and_fills_tokens() {
        let rows = vec![
            RawAlignmentRow {
                cased: None,
                uncased: Some("uh".into()),
                start_s: None,
                end_s: None,
            },
            RawAlignmentRow {
                cased: Some("Hello".into()),
                uncased: Some("hello".into()),
                start_s: Some(2.0),
                end_s: Some(2.4),
            },
        ];
        let table = AlignmentTable::from_timestamps(rows, 1.5).expect("back-fill succeeds");
        assert_eq!(table.records()[0].cased, MISSING_TOKEN);
        assert_eq!(table.records()[0].start_s, 2.0);
        assert_eq!(table.records()[0].tr, 2);
        assert_eq!(table.words().collect::<Vec<_>>(), vec!["none", "Hello"]);
    }

    #[test]
    fn from_timestamps_rejects_trailing_gap() {
        let rows = vec![RawAlignmentRow {
            cased: Some("end".into()),
            uncased: None,
            start_s: None,
            end_s: Some(1.0),
        }];
        assert!(AlignmentTable::from_timestamps(rows, 1.5).is_err());
    }

    #[test]
    fn mean_pools_events_and_forward_fills_gaps() {
        let table = table_from_trs(&[1, 1, 3]);
        let features = array![[1.0, 2.0], [3.0, 4.0], [10.0, 20.0]];
        let aligned =
            align_to_tr_grid(&table, features.view(), 4, TrPooling::Mean).expect("valid");

        assert_eq!(aligned, array![[2.0, 3.0], [2.0, 3.0], [10.0, 20.0], [10.0, 20.0]]);
    }

    #[test]
    fn leading_trs_are_zero_padded() {
        let table = table_from_trs(&[3, 4]);
        let features = array![[5.0], [7.0]];
        let aligned =
            align_to_tr_grid(&table, features.view(), 5, TrPooling::Mean).expect("valid");
        assert_eq!(aligned, array![[0.0], [0.0], [5.0], [7.0], [7.0]]);
    }

    #[test]
    fn events_after_last_scan_are_dropped() {
        let table = table_from_trs(&[1, 2, 5]);
        let features = array![[1.0], [2.0], [99.0]];
        let aligned =
            align_to_tr_grid(&table, features.view(), 3, TrPooling::Mean).expect("valid");
        assert_eq!(aligned, array![[1.0], [2.0], [2.0]]);
    }

    #[test]
    fn rejects_non_mean_pooling_and_row_mismatch() {
        let table = table_from_trs(&[1, 2]);
        let features = Array2::<f64>::zeros((2, 3));
        let err = align_to_tr_grid(&table, features.view(), 2, TrPooling::Last)
            .expect_err("last pooling is rejected");
        assert!(matches!(err, VoxfitError::NotSupported(_)));

        let short = Array2::<f64>::zeros((1, 3));
        let err = align_to_tr_grid(&table, short.view(), 2, TrPooling::Mean)
            .expect_err("row mismatch");
        assert!(matches!(err, VoxfitError::InvalidInput(_)));
    }

    #[test]
    fn first_event_after_scan_is_rejected() {
        let table = table_from_trs(&[4]);
        let features = Array2::<f64>::ones((1, 1));
        assert!(align_to_tr_grid(&table, features.view(), 3, TrPooling::Mean).is_err());
    }
}
