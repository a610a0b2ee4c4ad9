// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

pub mod align;
pub mod chunk;
pub mod context;
pub mod fir;
pub mod fusion;
pub mod layers;
pub mod reduce;

pub use align::{
    AlignmentRecord, AlignmentTable, MISSING_TOKEN, RawAlignmentRow, align_to_tr_grid, tr_index,
};
pub use chunk::chunk_audio;
pub use context::{TokenSplitter, WholeWordSplitter, build_context_windows};
pub use fir::{delay_stack_reference, fir_embed, fir_embed_flat};
pub use fusion::fuse_modalities;
pub use layers::{
    HiddenStateSource, LayerAccumulator, LayerSelection, TokenPooling, pool_tokens,
    resolve_layers,
};
pub use reduce::{Pca, Standardizer, reduce_features};
