// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashSet;
use std::future;

use futures::{Stream, StreamExt};

use aglet_types::{Event, EventType};

use crate::error::ProtocolError;

/// Finite-state machine enforcing legal event orderings for one run.
///
/// The verifier is fed every decoded event in order.  On the first illegal
/// event it returns a [`ProtocolError`]; callers must then terminate the
/// stream — the verifier does not attempt recovery.
#[derive(Debug, Default)]
pub struct ProtocolVerifier {
    first_event_seen: bool,
    run_finished: bool,
    run_errored: bool,
    active_message_id: Option<String>,
    active_tool_call_id: Option<String>,
    active_steps: HashSet<String>,
}

impl ProtocolVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `event` against the current state and advance the machine.
    pub fn check(&mut self, event: &Event) -> Result<(), ProtocolError> {
        let ty = event.event_type();

        if self.run_errored {
            return Err(ProtocolError::new(format!(
                "Cannot send event type '{ty}': no events after RUN_ERROR"
            )));
        }
        if self.run_finished && ty != EventType::RunError {
            return Err(ProtocolError::new(format!(
                "Cannot send event type '{ty}': events after RUN_FINISHED"
            )));
        }

        // RUN_ERROR terminates the run from any state, including mid-message
        // and mid-tool-call.
        if ty == EventType::RunError {
            self.first_event_seen = true;
            self.run_errored = true;
            return Ok(());
        }

        if !self.first_event_seen {
            if ty != EventType::RunStarted {
                return Err(ProtocolError::new(format!(
                    "First event must be 'RUN_STARTED', got '{ty}'"
                )));
            }
        } else if ty == EventType::RunStarted {
            return Err(ProtocolError::new(
                "duplicate RUN_STARTED: the run has already started",
            ));
        }

        // While a text message streams, only its own content/end and RAW are
        // legal.
        if let Some(active) = &self.active_message_id {
            match event {
                Event::TextMessageContent { message_id, .. }
                | Event::TextMessageEnd { message_id, .. } => {
                    if message_id != active {
                        return Err(ProtocolError::new(format!(
                            "message id mismatch: expected '{active}', got '{message_id}'"
                        )));
                    }
                }
                Event::Raw { .. } => {}
                _ => {
                    return Err(ProtocolError::new(format!(
                        "Cannot send event type '{ty}' after 'TEXT_MESSAGE_START'"
                    )));
                }
            }
        }

        // While a tool call streams, only its own args/end and RAW are legal.
        // A nested TOOL_CALL_START gets its own message.
        if let Some(active) = &self.active_tool_call_id {
            match event {
                Event::ToolCallArgs { tool_call_id, .. }
                | Event::ToolCallEnd { tool_call_id, .. } => {
                    if tool_call_id != active {
                        return Err(ProtocolError::new(format!(
                            "tool call id mismatch: expected '{active}', got '{tool_call_id}'"
                        )));
                    }
                }
                Event::ToolCallStart { tool_call_id, .. } => {
                    return Err(ProtocolError::new(format!(
                        "Cannot start tool call '{tool_call_id}' before ending tool call '{active}'"
                    )));
                }
                Event::Raw { .. } => {}
                _ => {
                    return Err(ProtocolError::new(format!(
                        "Cannot send event type '{ty}' after 'TOOL_CALL_START'"
                    )));
                }
            }
        }

        self.first_event_seen = true;

        match event {
            Event::TextMessageStart { message_id, .. } => {
                self.active_message_id = Some(message_id.clone());
            }
            Event::TextMessageContent { .. } => {
                if self.active_message_id.is_none() {
                    return Err(ProtocolError::new(
                        "Cannot send event type 'TEXT_MESSAGE_CONTENT': no text message is active",
                    ));
                }
            }
            Event::TextMessageEnd { .. } => {
                if self.active_message_id.is_none() {
                    return Err(ProtocolError::new(
                        "Cannot send event type 'TEXT_MESSAGE_END': no text message is active",
                    ));
                }
                self.active_message_id = None;
            }
            Event::ToolCallStart { tool_call_id, .. } => {
                self.active_tool_call_id = Some(tool_call_id.clone());
            }
            Event::ToolCallArgs { .. } => {
                if self.active_tool_call_id.is_none() {
                    return Err(ProtocolError::new(
                        "Cannot send event type 'TOOL_CALL_ARGS': no tool call is active",
                    ));
                }
            }
            Event::ToolCallEnd { .. } => {
                if self.active_tool_call_id.is_none() {
                    return Err(ProtocolError::new(
                        "Cannot send event type 'TOOL_CALL_END': no tool call is active",
                    ));
                }
                self.active_tool_call_id = None;
            }
            Event::StepStarted { step_name, .. } => {
                if !self.active_steps.insert(step_name.clone()) {
                    return Err(ProtocolError::new(format!(
                        "Step '{step_name}' is already active"
                    )));
                }
            }
            Event::StepFinished { step_name, .. } => {
                if !self.active_steps.remove(step_name) {
                    return Err(ProtocolError::new(format!(
                        "Cannot finish step '{step_name}' that was not started"
                    )));
                }
            }
            Event::RunFinished { .. } => {
                if !self.active_steps.is_empty() {
                    let mut names: Vec<&str> =
                        self.active_steps.iter().map(String::as_str).collect();
                    names.sort_unstable();
                    return Err(ProtocolError::new(format!(
                        "Cannot finish run: unfinished steps: {}",
                        names.join(", ")
                    )));
                }
                self.run_finished = true;
            }
            Event::RunStarted { .. }
            | Event::RunError { .. }
            | Event::StateSnapshot { .. }
            | Event::StateDelta { .. }
            | Event::MessagesSnapshot { .. }
            | Event::Raw { .. }
            | Event::Custom { .. } => {}
        }

        Ok(())
    }
}

/// Apply a [`ProtocolVerifier`] over an event stream.
///
/// The first violation is yielded as an error item and the stream terminates;
/// upstream errors likewise terminate after being yielded.
pub fn verify_stream<S>(events: S) -> impl Stream<Item = anyhow::Result<Event>> + Send
where
    S: Stream<Item = anyhow::Result<Event>> + Send,
{
    events.scan(
        (ProtocolVerifier::new(), false),
        |(verifier, terminated), item| {
            if *terminated {
                return future::ready(None);
            }
            let out = match item {
                Ok(event) => match verifier.check(&event) {
                    Ok(()) => Ok(event),
                    Err(e) => {
                        *terminated = true;
                        Err(e.into())
                    }
                },
                Err(e) => {
                    *terminated = true;
                    Err(e)
                }
            };
            future::ready(Some(out))
        },
    )
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
