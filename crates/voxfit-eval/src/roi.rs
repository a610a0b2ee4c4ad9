// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

use ndarray::{Array1, ArrayView1, Axis, concatenate};
use voxfit_core::VoxfitError;

/// Correlation of one atlas region.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoiValue {
    /// 1-based atlas label.
    pub label: u32,
    pub correlation: f64,
}

/// Looks up `corr_map[label - 1]` for every distinct non-zero label,
/// ascending by label. Label `0` marks unassigned vertices.
pub fn roi_summary(corr_map: ArrayView1<'_, f64>, labels: &[u32]) -> Result<Vec<RoiValue>, VoxfitError> {
    let mut unique: Vec<u32> = labels.iter().copied().filter(|&label| label != 0).collect();
    unique.sort_unstable();
    unique.dedup();

    unique
        .into_iter()
        .map(|label| {
            let idx = label as usize - 1;
            corr_map
                .get(idx)
                .map(|&correlation| RoiValue { label, correlation })
                .ok_or_else(|| {
                    VoxfitError::invalid_input(format!(
                        "label {label} has no entry in a correlation map of length {}",
                        corr_map.len()
                    ))
                })
        })
        .collect()
}

/// Joins per-hemisphere label arrays, shifting right-hemisphere regions past
/// the largest left label so both share one index space.
pub fn merge_hemisphere_labels(left: &[u32], right: &[u32]) -> Vec<u32> {
    let offset = left.iter().copied().max().unwrap_or(0);
    left.iter()
        .copied()
        .chain(
            right
                .iter()
                .map(|&label| if label == 0 { 0 } else { label + offset }),
        )
        .collect()
}

/// Projects a region-level map onto vertices; unlabeled vertices get NaN.
pub fn roi_to_vertices(corr_map: ArrayView1<'_, f64>, labels: &[u32]) -> Result<Array1<f64>, VoxfitError> {
    labels
        .iter()
        .map(|&label| {
            if label == 0 {
                return Ok(f64::NAN);
            }
            corr_map.get(label as usize - 1).copied().ok_or_else(|| {
                VoxfitError::invalid_input(format!(
                    "label {label} has no entry in a correlation map of length {}",
                    corr_map.len()
                ))
            })
        })
        .collect::<Result<Vec<f64>, _>>()
        .map(Array1::from)
}

/// Concatenates left and right hemisphere region maps.
pub fn join_hemisphere_maps<'a>(
    left: ArrayView1<'a, f64>,
    right: ArrayView1<'a, f64>,
) -> Result<Array1<f64>, VoxfitError> {
    concatenate(Axis(0), &[left, right])
        .map_err(|err| VoxfitError::invalid_input(format!("hemisphere concat failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::{join_hemisphere_maps, merge_hemisphere_labels, roi_summary, roi_to_vertices};
    use ndarray::array;

    #[test]
    fn summary_uses_one_based_labels_sorted() {
        let corr = array![0.1, 0.2, 0.3];
        let rois = roi_summary(corr.view(), &[3, 0, 1, 3, 1]).expect("valid");
        assert_eq!(rois.len(), 2);
        assert_eq!((rois[0].label, rois[0].correlation), (1, 0.1));
        assert_eq!((rois[1].label, rois[1].correlation), (3, 0.3));
    }

    #[test]
    fn out_of_range_label_is_rejected() {
        let corr = array![0.1];
        assert!(roi_summary(corr.view(), &[2]).is_err());
        assert!(roi_to_vertices(corr.view(), &[0, 2]).is_err());
    }

    #[test]
    fn right_hemisphere_is_offset_past_left() {
        let merged = merge_hemisphere_labels(&[0, 1, 2, 180], &[1, 0, 180]);
        assert_eq!(merged, vec![0, 1, 2, 180, 181, 0, 360]);
    }

    #[test]
    fn vertices_get_region_values() {
        let left = array![0.5, 0.6];
        let right = array![0.7, 0.8];
        let joined = join_hemisphere_maps(left.view(), right.view()).expect("valid");
        let labels = merge_hemisphere_labels(&[1, 2], &[2, 0]);
        let vertices = roi_to_vertices(joined.view(), &labels).expect("valid");
        assert_eq!(vertices.slice(ndarray::s![..3]).to_vec(), vec![0.5, 0.6, 0.8]);
        assert!(vertices[3].is_nan());
    }
}
