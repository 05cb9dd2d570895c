// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

/// Transport failure taxonomy.  Every variant maps to a stable code tag that
/// ends up on the RUN_ERROR event a failed run surfaces.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        last: Box<TransportError>,
    },

    #[error("session is closed")]
    SessionClosed,
}

impl TransportError {
    /// Stable code tag carried by the RUN_ERROR event of a failed run.
    pub fn code(&self) -> &'static str {
        match self {
            TransportError::Connect(_) => "TRANSPORT_CONNECT",
            TransportError::Timeout(_) => "TRANSPORT_TIMEOUT",
            TransportError::Http { .. } => "TRANSPORT_HTTP",
            TransportError::RetryExhausted { .. } => "RETRY_EXHAUSTED",
            TransportError::SessionClosed => "SESSION_CLOSED",
        }
    }

    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else {
            TransportError::Connect(e.to_string())
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
