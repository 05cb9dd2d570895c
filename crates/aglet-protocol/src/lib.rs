// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Stream decoding and protocol verification: turns raw JSON records into
//! typed events and enforces the protocol's ordering rules.

use std::pin::Pin;

use futures::Stream;

mod decoder;
mod error;
mod verifier;

pub use decoder::{decode_record, decode_stream};
pub use error::{DecodeError, ProtocolError};
pub use verifier::{verify_stream, ProtocolVerifier};

/// A boxed stream of verified protocol events.
pub type EventStream =
    Pin<Box<dyn Stream<Item = anyhow::Result<aglet_types::Event>> + Send>>;
