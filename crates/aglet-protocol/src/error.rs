// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

/// A single event record could not be decoded.  Decode failures are scoped
/// to the offending record: the decoder logs them and the stream continues.
#[derive(Debug, Error)]
#[error("undecodable event record: {source}")]
pub struct DecodeError {
    #[from]
    source: serde_json::Error,
}

/// An event arrived in an order the protocol forbids.  Violations are fatal
/// to the stream that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("protocol violation: {message}")]
pub struct ProtocolError {
    pub message: String,
}

impl ProtocolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
