// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::pin::Pin;
use std::sync::Arc;
use std::task::Poll;

use async_trait::async_trait;
use futures::{stream, Stream, StreamExt};
use serde_json::Value;
use tokio::sync::watch;

use aglet_types::{Message, RunAgentInput};

use crate::error::TransportError;

/// A boxed stream of raw event records — one complete JSON document each.
pub type RecordStream = Pin<Box<dyn Stream<Item = anyhow::Result<String>> + Send>>;

/// Posts follow-up run inputs on behalf of a live session.
#[async_trait]
pub trait SessionSender: Send + Sync {
    async fn send(&self, input: RunAgentInput) -> Result<(), TransportError>;
}

/// A live transport connection bound to a single run.
pub struct RunSession {
    records: RecordStream,
    handle: SessionHandle,
}

/// Cloneable control surface of a [`RunSession`]: follow-up sends, explicit
/// close, and activity observation.
///
/// `is_active` tracks whether the record stream is still producing; it goes
/// false when the server closes the stream or the session is closed.
/// Follow-up sends stay legal after the stream drains naturally — tool
/// results are posted after RUN_FINISHED — and fail only once `close()` has
/// been called.
#[derive(Clone)]
pub struct SessionHandle {
    thread_id: String,
    run_id: String,
    sender: Arc<dyn SessionSender>,
    closed_tx: Arc<watch::Sender<bool>>,
    closed_rx: watch::Receiver<bool>,
    active_tx: Arc<watch::Sender<bool>>,
    active_rx: watch::Receiver<bool>,
}

impl RunSession {
    pub fn new(
        thread_id: impl Into<String>,
        run_id: impl Into<String>,
        records: RecordStream,
        sender: Arc<dyn SessionSender>,
    ) -> Self {
        let (closed_tx, closed_rx) = watch::channel(false);
        let (active_tx, active_rx) = watch::channel(true);
        let closed_tx = Arc::new(closed_tx);
        let active_tx = Arc::new(active_tx);

        // End the record stream when the session is closed, and flip the
        // activity flag once the stream runs dry.
        let mut close_signal = closed_rx.clone();
        let closed = Box::pin(async move {
            let _ = close_signal.wait_for(|closed| *closed).await;
        });
        let done_tx = active_tx.clone();
        let finished = stream::poll_fn(move |_| {
            let _ = done_tx.send(false);
            Poll::Ready(None)
        });
        let records: RecordStream = Box::pin(records.take_until(closed).chain(finished));

        Self {
            records,
            handle: SessionHandle {
                thread_id: thread_id.into(),
                run_id: run_id.into(),
                sender,
                closed_tx,
                closed_rx,
                active_tx,
                active_rx,
            },
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Split into the record stream and the control handle.
    pub fn into_parts(self) -> (RecordStream, SessionHandle) {
        (self.records, self.handle)
    }
}

impl SessionHandle {
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Send one message to the agent as a new run input on this session's
    /// thread and run.
    pub async fn send_message(&self, message: Message) -> Result<(), TransportError> {
        if *self.closed_rx.borrow() {
            return Err(TransportError::SessionClosed);
        }
        let input = RunAgentInput {
            thread_id: self.thread_id.clone(),
            run_id: self.run_id.clone(),
            state: Value::Null,
            messages: vec![message],
            tools: Vec::new(),
            context: Vec::new(),
            forwarded_props: Value::Null,
        };
        self.sender.send(input).await
    }

    /// Close the session: subsequent sends fail and the record stream ends
    /// at its next poll.
    pub fn close(&self) {
        let _ = self.closed_tx.send(true);
        let _ = self.active_tx.send(false);
    }

    pub fn is_active(&self) -> bool {
        *self.active_rx.borrow()
    }

    /// Watch-style observation of the activity flag.
    pub fn subscribe_active(&self) -> watch::Receiver<bool> {
        self.active_rx.clone()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::stream;

    use super::*;

    struct CaptureSender {
        sent: Arc<Mutex<Vec<RunAgentInput>>>,
    }

    #[async_trait]
    impl SessionSender for CaptureSender {
        async fn send(&self, input: RunAgentInput) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(input);
            Ok(())
        }
    }

    fn session_with_records(records: Vec<&str>) -> (RunSession, Arc<Mutex<Vec<RunAgentInput>>>) {
        let sent: Arc<Mutex<Vec<RunAgentInput>>> = Arc::default();
        let sender = Arc::new(CaptureSender { sent: sent.clone() });
        let records: RecordStream = Box::pin(stream::iter(
            records
                .into_iter()
                .map(|r| Ok(r.to_string()))
                .collect::<Vec<_>>(),
        ));
        (RunSession::new("t1", "r1", records, sender), sent)
    }

    #[tokio::test]
    async fn records_pass_through_in_order() {
        let (session, _) = session_with_records(vec!["a", "b", "c"]);
        let (records, _) = session.into_parts();
        let collected: Vec<String> = records.map(|r| r.unwrap()).collect().await;
        assert_eq!(collected, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn session_goes_inactive_when_stream_is_drained() {
        let (session, _) = session_with_records(vec!["a"]);
        let (records, handle) = session.into_parts();
        assert!(handle.is_active());
        let _: Vec<_> = records.collect().await;
        assert!(!handle.is_active());
    }

    #[tokio::test]
    async fn close_terminates_the_record_stream() {
        let pending: RecordStream = Box::pin(stream::pending());
        let sent: Arc<Mutex<Vec<RunAgentInput>>> = Arc::default();
        let sender = Arc::new(CaptureSender { sent });
        let session = RunSession::new("t1", "r1", pending, sender);
        let (records, handle) = session.into_parts();

        handle.close();
        let collected: Vec<_> = records.collect().await;
        assert!(collected.is_empty());
        assert!(!handle.is_active());
    }

    #[tokio::test]
    async fn send_message_reuses_thread_and_run_ids() {
        let (session, sent) = session_with_records(vec![]);
        let handle = session.handle();
        handle
            .send_message(Message::tool("m1", "{\"success\":true}", "tc1"))
            .await
            .unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].thread_id, "t1");
        assert_eq!(sent[0].run_id, "r1");
        assert_eq!(sent[0].messages.len(), 1);
        assert!(sent[0].tools.is_empty());
    }

    #[tokio::test]
    async fn send_message_still_works_after_the_stream_drains() {
        let (session, sent) = session_with_records(vec!["a"]);
        let (records, handle) = session.into_parts();
        let _: Vec<_> = records.collect().await;
        assert!(!handle.is_active());

        handle
            .send_message(Message::tool("m1", "{}", "tc1"))
            .await
            .unwrap();
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn send_after_close_fails_with_session_closed() {
        let (session, sent) = session_with_records(vec![]);
        let handle = session.handle();
        handle.close();
        let err = handle
            .send_message(Message::tool("m1", "x", "tc1"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::SessionClosed));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn subscribe_active_observes_the_close() {
        let (session, _) = session_with_records(vec![]);
        let handle = session.handle();
        let mut active = handle.subscribe_active();
        assert!(*active.borrow());
        handle.close();
        active.changed().await.unwrap();
        assert!(!*active.borrow());
    }
}
