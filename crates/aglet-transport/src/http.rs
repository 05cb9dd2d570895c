// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! HTTP implementation of the transport contract.
//!
//! One run is one `POST` of the run descriptor with
//! `Accept: text/event-stream`; the response is a server-sent stream whose
//! `data:` lines each carry one complete JSON event record.  SSE frames can
//! be split across TCP packets, so a persistent line buffer reassembles
//! them — only complete lines are surfaced as records.

use std::future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use tracing::{debug, warn};

use aglet_types::RunAgentInput;

use crate::error::TransportError;
use crate::retry::{ExponentialBackoff, RetryPolicy};
use crate::session::{RecordStream, RunSession, SessionSender};
use crate::Transport;

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Agent endpoint URL.
    pub url: String,
    /// Extra headers attached to every request.
    pub headers: Vec<(String, String)>,
    /// When set, requests carry `Authorization: Bearer <token>`.
    pub bearer_token: Option<String>,
    /// When set (and no bearer token is), requests carry the key under
    /// `api_key_header`.
    pub api_key: Option<String>,
    pub api_key_header: String,
    /// Whole-request deadline.  Long, because event streams are long.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Per-read deadline on the response socket.
    pub read_timeout: Duration,
}

impl HttpTransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            bearer_token: None,
            api_key: None,
            api_key_header: "X-API-Key".into(),
            request_timeout: Duration::from_secs(600),
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(600),
        }
    }
}

struct HttpInner {
    config: HttpTransportConfig,
    retry: Arc<dyn RetryPolicy>,
    client: reqwest::Client,
}

/// Transport that POSTs run descriptors and streams server-sent records.
///
/// The underlying HTTP client is shared and thread-safe; per-run state lives
/// in the [`RunSession`].
#[derive(Clone)]
pub struct HttpTransport {
    inner: Arc<HttpInner>,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()?;
        Ok(Self {
            inner: Arc::new(HttpInner {
                config,
                retry: Arc::new(ExponentialBackoff::default()),
                client,
            }),
        })
    }

    /// Replace the retry policy.  Must be called before the first run.
    pub fn with_retry_policy(mut self, retry: Arc<dyn RetryPolicy>) -> Self {
        let inner = Arc::get_mut(&mut self.inner);
        match inner {
            Some(inner) => inner.retry = retry,
            None => warn!("retry policy not replaced: transport is already shared"),
        }
        self
    }
}

impl HttpInner {
    fn build_request(&self, input: &RunAgentInput) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .post(&self.config.url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(input);
        // Exactly one auth header: bearer wins when both are configured.
        if let Some(token) = &self.config.bearer_token {
            req = req.bearer_auth(token);
        } else if let Some(key) = &self.config.api_key {
            req = req.header(self.config.api_key_header.as_str(), key.as_str());
        }
        for (name, value) in &self.config.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        req
    }

    /// POST the run descriptor, retrying per policy.  Retries happen only
    /// here — before any record has been delivered to the caller.
    async fn post_with_retry(&self, input: &RunAgentInput) -> Result<reqwest::Response, TransportError> {
        let mut attempt = 1u32;
        loop {
            let error = match self.build_request(input).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    TransportError::Http { status, body }
                }
                Err(e) => TransportError::from_reqwest(e),
            };

            if attempt >= self.retry.max_attempts() || !self.retry.should_retry(&error, attempt) {
                return Err(if attempt > 1 {
                    TransportError::RetryExhausted {
                        attempts: attempt,
                        last: Box::new(error),
                    }
                } else {
                    error
                });
            }

            let delay = self.retry.delay(attempt);
            debug!(attempt, ?delay, error = %error, "retrying run request");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn start_run(&self, input: RunAgentInput) -> Result<RunSession, TransportError> {
        debug!(
            thread_id = %input.thread_id,
            run_id = %input.run_id,
            message_count = input.messages.len(),
            tool_count = input.tools.len(),
            "starting run"
        );
        let resp = self.inner.post_with_retry(&input).await?;
        let records = record_stream(resp);
        let sender = Arc::new(HttpSender {
            inner: self.inner.clone(),
        });
        Ok(RunSession::new(input.thread_id, input.run_id, records, sender))
    }
}

struct HttpSender {
    inner: Arc<HttpInner>,
}

#[async_trait]
impl SessionSender for HttpSender {
    async fn send(&self, input: RunAgentInput) -> Result<(), TransportError> {
        let resp = self.inner.post_with_retry(&input).await?;
        // Fire-and-forget: the continuation stream belongs to the server's
        // next turn.  Drain it off-task so the connection is not severed
        // while the agent is still producing.
        tokio::spawn(async move {
            let mut body = resp.bytes_stream();
            while body.next().await.is_some() {}
        });
        Ok(())
    }
}

/// Frame the SSE byte stream into complete `data:` records.
fn record_stream(resp: reqwest::Response) -> RecordStream {
    let records = resp
        .bytes_stream()
        .scan(String::new(), |buf, chunk| {
            let out: Vec<anyhow::Result<String>> = match chunk {
                Ok(bytes) => {
                    buf.push_str(&String::from_utf8_lossy(&bytes));
                    drain_complete_data_lines(buf).into_iter().map(Ok).collect()
                }
                Err(e) => vec![Err(TransportError::from_reqwest(e).into())],
            };
            future::ready(Some(out))
        })
        .flat_map(stream::iter);
    Box::pin(records)
}

/// Drain all complete `\n`-terminated lines from `buf`, returning the
/// payloads of `data:` lines.  A trailing incomplete line stays in `buf`
/// until the next chunk extends it — a single SSE event may be split across
/// TCP packets.
pub(crate) fn drain_complete_data_lines(buf: &mut String) -> Vec<String> {
    let mut records = Vec::new();
    while let Some(nl_pos) = buf.find('\n') {
        let line = buf[..nl_pos].trim_end_matches('\r').to_string();
        *buf = buf[nl_pos + 1..].to_string();
        if let Some(data) = line.strip_prefix("data:") {
            let data = data.strip_prefix(' ').unwrap_or(data);
            if !data.is_empty() {
                records.push(data.to_string());
            }
        }
    }
    records
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_complete_data_line_is_drained() {
        let mut buf = "data: {\"type\":\"RUN_STARTED\"}\n".to_string();
        let records = drain_complete_data_lines(&mut buf);
        assert_eq!(records, vec!["{\"type\":\"RUN_STARTED\"}"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn incomplete_line_stays_buffered() {
        let partial = "data: {\"type\":\"TEXT_MESSA";
        let mut buf = partial.to_string();
        assert!(drain_complete_data_lines(&mut buf).is_empty());
        assert_eq!(buf, partial);
    }

    #[test]
    fn record_split_across_chunks_is_reassembled() {
        let full = "data: {\"type\":\"TEXT_MESSAGE_CONTENT\",\"message_id\":\"m1\",\"delta\":\"hi\"}";
        let (first, second) = full.split_at(full.len() / 2);

        let mut buf = String::new();
        buf.push_str(first);
        assert!(drain_complete_data_lines(&mut buf).is_empty());

        buf.push_str(second);
        buf.push('\n');
        let records = drain_complete_data_lines(&mut buf);
        assert_eq!(records.len(), 1);
        assert!(records[0].contains("TEXT_MESSAGE_CONTENT"));
        assert!(buf.is_empty());
    }

    #[test]
    fn multiple_records_in_one_chunk_all_drain() {
        let mut buf = "data: {\"a\":1}\ndata: {\"b\":2}\n".to_string();
        let records = drain_complete_data_lines(&mut buf);
        assert_eq!(records, vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[test]
    fn crlf_line_endings_are_handled() {
        let mut buf = "data: {\"x\":1}\r\n".to_string();
        assert_eq!(drain_complete_data_lines(&mut buf), vec!["{\"x\":1}"]);
    }

    #[test]
    fn non_data_lines_are_skipped() {
        let mut buf = ": comment\nevent: message\ndata: {\"x\":1}\n\n".to_string();
        assert_eq!(drain_complete_data_lines(&mut buf), vec!["{\"x\":1}"]);
    }

    #[test]
    fn data_prefix_without_space_is_accepted() {
        let mut buf = "data:{\"x\":1}\n".to_string();
        assert_eq!(drain_complete_data_lines(&mut buf), vec!["{\"x\":1}"]);
    }

    #[test]
    fn config_defaults_match_contract() {
        let c = HttpTransportConfig::new("http://localhost:8000/agent");
        assert_eq!(c.api_key_header, "X-API-Key");
        assert_eq!(c.request_timeout, Duration::from_secs(600));
        assert_eq!(c.connect_timeout, Duration::from_secs(30));
        assert_eq!(c.read_timeout, Duration::from_secs(600));
        assert!(c.bearer_token.is_none());
        assert!(c.api_key.is_none());
    }
}
