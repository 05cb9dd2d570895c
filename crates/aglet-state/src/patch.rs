// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde_json::Value;
use thiserror::Error;

/// A STATE_DELTA could not be applied.  Patch failures are non-fatal: the
/// state is left unchanged and the stream continues.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("state delta is not an RFC 6902 operation array: {0}")]
    Shape(serde_json::Error),
    #[error("failed to apply state delta: {0}")]
    Apply(#[from] json_patch::PatchError),
}

/// Apply an RFC 6902 JSON-Patch array to `state`.
///
/// `delta` may be any JSON value that parses as an operation array — both
/// the typed-operation-list and plain-array historical encodings share that
/// wire shape.  Application is atomic: on any failure `state` is unchanged.
pub fn apply_delta(state: &mut Value, delta: &Value) -> Result<(), PatchError> {
    let ops: json_patch::Patch =
        serde_json::from_value(delta.clone()).map_err(PatchError::Shape)?;
    json_patch::patch(state, &ops)?;
    Ok(())
}

/// Evaluate an RFC 6901 JSON pointer against `state`.
pub fn evaluate_pointer<'a>(state: &'a Value, pointer: &str) -> Option<&'a Value> {
    state.pointer(pointer)
}

/// Encode path segments into an RFC 6901 JSON pointer, escaping `~` and `/`.
///
/// An empty segment list encodes the whole-document pointer `""`.
pub fn encode_pointer<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut pointer = String::new();
    for segment in segments {
        pointer.push('/');
        for ch in segment.as_ref().chars() {
            match ch {
                '~' => pointer.push_str("~0"),
                '/' => pointer.push_str("~1"),
                other => pointer.push(other),
            }
        }
    }
    pointer
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
