// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use serde_json::Value;
use tracing::warn;

use aglet_state::apply_delta;
use aglet_transport::Transport;
use aglet_types::{Event, Message, Role};

use crate::agent::{AgentRun, HttpAgent};
use crate::config::AgentConfig;

/// Per-thread conversation memory: message history plus the last known
/// agent state.
#[derive(Debug, Default, Clone)]
struct ThreadState {
    messages: Vec<Message>,
    state: Value,
}

impl ThreadState {
    /// Mirror one streamed event into the stored history, so the next
    /// `chat` call sends the full conversation the agent has produced.
    fn mirror(&mut self, event: &Event) {
        match event {
            Event::TextMessageStart { message_id, .. } => {
                self.messages
                    .push(Message::assistant_streaming(message_id.clone()));
            }
            Event::TextMessageContent {
                message_id, delta, ..
            } => {
                if let Some(last) = self.messages.last_mut() {
                    if last.role() == Role::Assistant && last.id() == message_id.as_str() {
                        last.append_content(delta);
                    }
                }
            }
            Event::StateSnapshot { snapshot, .. } => {
                self.state = snapshot.clone();
            }
            Event::StateDelta { delta, .. } => {
                if let Err(e) = apply_delta(&mut self.state, delta) {
                    warn!(error = %e, "ignoring unapplicable state delta in thread history");
                }
            }
            Event::MessagesSnapshot { messages, .. } => {
                self.messages = messages.clone();
            }
            _ => {}
        }
    }
}

/// Stateful agent facade: the stateless agent plus a per-thread history
/// store.  Each `chat` call appends to the thread, sends the whole history,
/// and mirrors the streamed reply back into it.
pub struct ChatAgent {
    agent: HttpAgent,
    threads: Arc<Mutex<HashMap<String, ThreadState>>>,
}

/// Thread used by callers that do not manage their own thread ids.
pub const DEFAULT_THREAD: &str = "default";

impl ChatAgent {
    pub fn new(config: AgentConfig) -> anyhow::Result<Self> {
        Ok(Self {
            agent: HttpAgent::new(config)?,
            threads: Arc::default(),
        })
    }

    pub fn with_transport(config: AgentConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            agent: HttpAgent::with_transport(config, transport),
            threads: Arc::default(),
        }
    }

    /// Send one user turn on `thread_id` (use [`DEFAULT_THREAD`] when the
    /// caller has no thread of its own).
    pub async fn chat(&self, text: &str, thread_id: &str) -> anyhow::Result<AgentRun> {
        let (messages, state) = {
            let mut threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
            let entry = threads.entry(thread_id.to_string()).or_default();
            if entry.messages.is_empty() {
                if let Some(prompt) = &self.agent.config().system_prompt {
                    entry
                        .messages
                        .push(Message::system(self.agent.next_id("msg"), prompt));
                }
            }
            let user_id = self
                .agent
                .config()
                .user_id
                .clone()
                .unwrap_or_else(|| self.agent.next_id("msg"));
            entry.messages.push(Message::user(user_id, text));
            trim_history(
                &mut entry.messages,
                self.agent.config().max_history_length,
            );
            (entry.messages.clone(), entry.state.clone())
        };

        let mut run = self.agent.run_thread(thread_id, messages, state).await?;

        // Tap the stream so the stored thread follows the agent's reply.
        let threads = self.threads.clone();
        let thread_key = thread_id.to_string();
        let max_history = self.agent.config().max_history_length;
        run.events = Box::pin(run.events.map(move |item| {
            if let Ok(event) = &item {
                let mut threads = threads.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(entry) = threads.get_mut(&thread_key) {
                    entry.mirror(event);
                    trim_history(&mut entry.messages, max_history);
                }
            }
            item
        }));
        Ok(run)
    }

    /// The stored history of a thread.
    pub fn history(&self, thread_id: &str) -> Vec<Message> {
        self.threads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(thread_id)
            .map(|t| t.messages.clone())
            .unwrap_or_default()
    }

    /// The last known agent state of a thread.
    pub fn thread_state(&self, thread_id: &str) -> Value {
        self.threads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(thread_id)
            .map(|t| t.state.clone())
            .unwrap_or(Value::Null)
    }

    /// Drop a thread's history and state.
    pub fn clear_thread(&self, thread_id: &str) {
        self.threads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(thread_id);
    }

    pub fn clear_thread_tools_tracking(&self) {
        self.agent.clear_thread_tools_tracking();
    }

    pub fn set_patch_error_handler(
        &mut self,
        handler: impl Fn(&aglet_state::PatchError) + Send + Sync + 'static,
    ) {
        self.agent.set_patch_error_handler(handler);
    }
}

/// Trim to `max` messages by dropping the oldest non-system entries.
fn trim_history(messages: &mut Vec<Message>, max: usize) {
    while messages.len() > max {
        let victim = messages
            .iter()
            .position(|m| m.role() != Role::System);
        match victim {
            Some(index) => {
                messages.remove(index);
            }
            None => break,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn trim_drops_oldest_non_system_first() {
        let mut messages = vec![
            Message::system("s1", "prompt"),
            Message::user("u1", "first"),
            Message::assistant("a1", "reply"),
            Message::user("u2", "second"),
        ];
        trim_history(&mut messages, 3);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].id(), "s1");
        assert_eq!(messages[1].id(), "a1");
    }

    #[test]
    fn trim_keeps_system_messages_when_only_they_remain() {
        let mut messages = vec![
            Message::system("s1", "a"),
            Message::system("s2", "b"),
        ];
        trim_history(&mut messages, 1);
        assert_eq!(messages.len(), 2, "system messages are never trimmed");
    }

    #[test]
    fn trim_is_a_no_op_under_the_cap() {
        let mut messages = vec![Message::user("u1", "hi")];
        trim_history(&mut messages, 100);
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn mirror_builds_assistant_reply_from_text_events() {
        let mut thread = ThreadState::default();
        thread.mirror(&Event::text_start("m1"));
        thread.mirror(&Event::text_content("m1", "Hel"));
        thread.mirror(&Event::text_content("m1", "lo"));
        thread.mirror(&Event::text_end("m1"));
        assert_eq!(thread.messages.len(), 1);
        assert_eq!(thread.messages[0].content(), Some("Hello"));
    }

    #[test]
    fn mirror_ignores_content_for_other_message_ids() {
        let mut thread = ThreadState::default();
        thread.mirror(&Event::text_start("m1"));
        thread.mirror(&Event::text_content("m2", "stray"));
        assert_eq!(thread.messages[0].content(), Some(""));
    }

    #[test]
    fn mirror_tracks_state_snapshot_and_delta() {
        let mut thread = ThreadState::default();
        thread.mirror(&Event::state_snapshot(json!({"count": 1})));
        thread.mirror(&Event::state_delta(json!([
            {"op": "replace", "path": "/count", "value": 2},
        ])));
        assert_eq!(thread.state, json!({"count": 2}));
    }

    #[test]
    fn mirror_survives_bad_deltas() {
        let mut thread = ThreadState::default();
        thread.mirror(&Event::state_snapshot(json!({"count": 1})));
        thread.mirror(&Event::state_delta(json!([
            {"op": "replace", "path": "/missing/deep", "value": 2},
        ])));
        assert_eq!(thread.state, json!({"count": 1}));
    }

    #[test]
    fn mirror_replaces_history_on_messages_snapshot() {
        let mut thread = ThreadState::default();
        thread.mirror(&Event::text_start("m1"));
        thread.mirror(&Event::messages_snapshot(vec![Message::user("u1", "hi")]));
        assert_eq!(thread.messages.len(), 1);
        assert_eq!(thread.messages[0].id(), "u1");
    }
}
