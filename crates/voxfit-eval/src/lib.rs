// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

pub mod report;
pub mod roi;
pub mod subjects;
pub mod synthetic;

pub use report::{
    LogEntry, SummaryRow, append_log, best_per_model, parse_log, write_summary_csv,
};
pub use roi::{RoiValue, join_hemisphere_maps, merge_hemisphere_labels, roi_summary, roi_to_vertices};
pub use subjects::{
    KernelEncodingConfig, MultiSubjectResult, ResponseStore, run_kernel_multi_subjects,
    run_multi_subjects,
};
pub use synthetic::{SyntheticEncodingConfig, SyntheticEncodingDataset, synthetic_encoding_dataset};
