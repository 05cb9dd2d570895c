// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;

use aglet_types::{Event, Message, RunAgentInput};

use crate::error::TransportError;
use crate::session::{RecordStream, RunSession, SessionSender};
use crate::Transport;

/// Pre-scripted transport for tests.  Each `start_run` call pops the next
/// record script from the front of the queue, so tests can specify exact
/// event sequences without a server.  Inputs and follow-up sends are
/// captured for inspection.
pub struct MockTransport {
    scripts: Arc<Mutex<Vec<Vec<String>>>>,
    /// Every run descriptor passed to `start_run`, in order.
    pub inputs: Arc<Mutex<Vec<RunAgentInput>>>,
    /// Every follow-up input sent through a session handle.
    pub sent: Arc<Mutex<Vec<RunAgentInput>>>,
}

impl MockTransport {
    /// Build from raw record scripts (one inner `Vec` per run).
    pub fn new(scripts: Vec<Vec<String>>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts)),
            inputs: Arc::default(),
            sent: Arc::default(),
        }
    }

    /// Build from typed event scripts; each event is serialised to one
    /// record.
    pub fn from_events(scripts: Vec<Vec<Event>>) -> Self {
        let raw = scripts
            .into_iter()
            .map(|events| {
                events
                    .iter()
                    .map(|e| serde_json::to_string(e).expect("event serialises"))
                    .collect()
            })
            .collect();
        Self::new(raw)
    }

    /// Convenience: a single run that streams one assistant text message and
    /// finishes.
    pub fn single_text_run(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::from_events(vec![vec![
            Event::run_started("thread", "run"),
            Event::text_start("m1"),
            Event::text_content("m1", reply),
            Event::text_end("m1"),
            Event::run_finished("thread", "run"),
        ]])
    }

    /// The follow-up tool messages captured so far.
    pub fn sent_tool_messages(&self) -> Vec<Message> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .flat_map(|input| input.messages.clone())
            .collect()
    }
}

struct MockSender {
    sent: Arc<Mutex<Vec<RunAgentInput>>>,
}

#[async_trait]
impl SessionSender for MockSender {
    async fn send(&self, input: RunAgentInput) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(input);
        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn start_run(&self, input: RunAgentInput) -> Result<RunSession, TransportError> {
        let thread_id = input.thread_id.clone();
        let run_id = input.run_id.clone();
        self.inputs.lock().unwrap().push(input);

        let records = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                Vec::new()
            } else {
                scripts.remove(0)
            }
        };
        let records: RecordStream = Box::pin(stream::iter(
            records.into_iter().map(Ok).collect::<Vec<_>>(),
        ));
        let sender = Arc::new(MockSender {
            sent: self.sent.clone(),
        });
        Ok(RunSession::new(thread_id, run_id, records, sender))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
