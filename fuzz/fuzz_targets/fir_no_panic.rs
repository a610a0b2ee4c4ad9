// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

#[path = "common.rs"]
mod common;

use libfuzzer_sys::fuzz_target;
use voxfit_features::{fir_embed, fir_embed_flat, reduce_features};

fuzz_target!(|data: &[u8]| {
    let mut cursor = common::ByteCursor::new(data);

    let n = common::bounded(cursor.next_u8(), 0, 32);
    let d = common::bounded(cursor.next_u8(), 0, 6);
    let window = common::bounded(cursor.next_u8(), 0, 8);
    let offset = common::bounded(cursor.next_u8(), 0, 8);
    let pca_dim = match cursor.next_u8() % 3 {
        0 => None,
        _ => Some(common::bounded(cursor.next_u8(), 0, 8)),
    };

    let payload = cursor.take_padded(n.saturating_mul(d).saturating_mul(8));
    let values = common::decode_f64_chunks(&payload, common::MAX_VALUE_LEN, false);
    let x = common::matrix(n, d, &values);

    if let Ok(embedded) = fir_embed(x.view(), window, offset) {
        assert_eq!(embedded.dim(), (n, window, d));
    }
    if let Ok(flat) = fir_embed_flat(x.view(), window, offset) {
        assert_eq!(flat.dim(), (n, window * d));
    }
    let _ = reduce_features(x.view(), pca_dim);
});
