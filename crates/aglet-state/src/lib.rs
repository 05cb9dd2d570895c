// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! State reduction: folds verified event streams into `(messages, state)`
//! projections, including RFC-6902 deltas and predictive state previews.

mod patch;
mod predict;
mod reducer;

pub use patch::{apply_delta, encode_pointer, evaluate_pointer, PatchError};
pub use predict::{parse_config, PredictStateEntry, PREDICT_STATE};
pub use reducer::{Projection, StateReducer, StateUpdate};
