// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Transport contract and implementations: post a run descriptor, stream
//! back raw event records, send follow-up messages, retry per policy.

use async_trait::async_trait;

use aglet_types::RunAgentInput;

mod error;
mod http;
mod mock;
mod retry;
mod session;

pub use error::TransportError;
pub use http::{HttpTransport, HttpTransportConfig};
pub use mock::MockTransport;
pub use retry::{ExponentialBackoff, RetryPolicy};
pub use session::{RecordStream, RunSession, SessionHandle, SessionSender};

/// Opens runs against an agent endpoint.
///
/// Implementations are shared across runs and must be thread-safe; per-run
/// state belongs to the returned [`RunSession`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn start_run(&self, input: RunAgentInput) -> Result<RunSession, TransportError>;
}
