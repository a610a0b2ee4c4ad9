// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

#[path = "common.rs"]
mod common;

use libfuzzer_sys::fuzz_target;
use voxfit_core::TrPooling;
use voxfit_features::{AlignmentRecord, AlignmentTable, align_to_tr_grid};

fuzz_target!(|data: &[u8]| {
    let mut cursor = common::ByteCursor::new(data);

    let n_events = common::bounded(cursor.next_u8(), 0, 48);
    let d = common::bounded(cursor.next_u8(), 0, 6);
    let n_trs = common::bounded(cursor.next_u8(), 0, 40);
    let pooling = match cursor.next_u8() % 4 {
        0 => TrPooling::Max,
        _ => TrPooling::Mean,
    };
    let row_mismatch = cursor.next_u8() % 5 == 0;

    let mut records = Vec::with_capacity(n_events);
    let mut tr = 1 + usize::from(cursor.next_u8() % 4);
    for idx in 0..n_events {
        // Mostly non-decreasing, occasionally stepping backwards.
        match cursor.next_u8() % 8 {
            0 => tr = tr.saturating_sub(1),
            1..=4 => {}
            step => tr += usize::from(step - 4),
        }
        records.push(AlignmentRecord {
            cased: format!("w{idx}"),
            uncased: format!("w{idx}"),
            start_s: idx as f64,
            end_s: idx as f64 + 0.5,
            tr,
        });
    }
    let Ok(table) = AlignmentTable::new(records) else {
        return;
    };

    let rows = if row_mismatch { table.len() + 1 } else { table.len() };
    let payload = cursor.take_padded(rows.saturating_mul(d).saturating_mul(8));
    let values = common::decode_f64_chunks(&payload, common::MAX_VALUE_LEN, true);
    let features = common::matrix(rows, d, &values);

    if let Ok(aligned) = align_to_tr_grid(&table, features.view(), n_trs, pooling) {
        assert_eq!(aligned.dim(), (n_trs, d));
    }
});
