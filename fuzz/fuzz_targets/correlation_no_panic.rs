// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

#[path = "common.rs"]
mod common;

use libfuzzer_sys::fuzz_target;
use voxfit_core::{column_correlation, fisher_mean, summarize};

fuzz_target!(|data: &[u8]| {
    let mut cursor = common::ByteCursor::new(data);

    let n = common::bounded(cursor.next_u8(), 0, 24);
    let v = common::bounded(cursor.next_u8(), 0, 6);
    let keep_special = cursor.next_u8() & 1 == 0;

    let payload = cursor.take_padded(n.saturating_mul(v).saturating_mul(16));
    let values = common::decode_f64_chunks(&payload, common::MAX_VALUE_LEN, keep_special);
    let (left, right) = values.split_at(values.len() / 2);
    let a = common::matrix(n, v, left);
    let b = common::matrix(n, v, right);

    if let Ok(corr) = column_correlation(a.view(), b.view()) {
        assert_eq!(corr.len(), v);
        for r in corr.iter().filter(|r| r.is_finite()) {
            assert!((-1.0 - 1e-9..=1.0 + 1e-9).contains(r));
        }
        let _ = fisher_mean(&corr.to_vec());
        let _ = summarize(&corr.to_vec());
    }
});
