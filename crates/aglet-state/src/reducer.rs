// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::warn;

use aglet_types::{Event, Message, Role, ToolCall};

use crate::patch::{apply_delta, PatchError};
use crate::predict::{parse_config, PredictStateEntry, PREDICT_STATE};

/// The reducer's running view of one run: ordered message list plus agent
/// state.  Owned by exactly one pipeline; published to subscribers as cloned
/// snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub messages: Vec<Message>,
    pub state: Value,
}

/// Snapshot emitted after a mutating event.  Only the fields that changed
/// are populated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub messages: Option<Vec<Message>>,
    pub state: Option<Value>,
}

type PatchErrorHandler = Box<dyn Fn(&PatchError) + Send + Sync>;

/// Folds verified events into a [`Projection`].
///
/// Pure modulo its own working state: identical event inputs produce
/// identical snapshot sequences.  Tool-call accumulators and the predictive
/// config live only for the run's duration.
pub struct StateReducer {
    projection: Projection,
    /// Active predictive-state rules, installed by `PredictState` CUSTOM
    /// events and cleared on STEP_FINISHED.
    predict: Vec<PredictStateEntry>,
    /// tool_call_id → tool name, for predictive merges of argument deltas.
    tool_names: HashMap<String, String>,
    on_patch_error: Option<PatchErrorHandler>,
}

impl StateReducer {
    pub fn new() -> Self {
        Self::with_state(Value::Null)
    }

    /// Start from the state the run descriptor carried.
    pub fn with_state(state: Value) -> Self {
        Self {
            projection: Projection {
                messages: Vec::new(),
                state,
            },
            predict: Vec::new(),
            tool_names: HashMap::new(),
            on_patch_error: None,
        }
    }

    /// Install a callback invoked when a STATE_DELTA fails to apply.
    pub fn set_patch_error_handler(&mut self, handler: impl Fn(&PatchError) + Send + Sync + 'static) {
        self.on_patch_error = Some(Box::new(handler));
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn into_projection(self) -> Projection {
        self.projection
    }

    /// Fold one event into the projection.
    ///
    /// Returns a snapshot of the changed fields, or `None` when the event
    /// does not mutate the projection.
    pub fn apply(&mut self, event: &Event) -> Option<StateUpdate> {
        match event {
            Event::TextMessageStart { message_id, .. } => {
                self.projection
                    .messages
                    .push(Message::assistant_streaming(message_id.clone()));
                Some(self.messages_update())
            }
            Event::TextMessageContent {
                message_id, delta, ..
            } => {
                let last = self.projection.messages.last_mut()?;
                if last.role() == Role::Assistant && last.id() == message_id.as_str() {
                    last.append_content(delta);
                    Some(self.messages_update())
                } else {
                    None
                }
            }
            Event::ToolCallStart {
                tool_call_id,
                tool_call_name,
                parent_message_id,
                ..
            } => {
                self.tool_names
                    .insert(tool_call_id.clone(), tool_call_name.clone());
                let call = ToolCall::new(tool_call_id.clone(), tool_call_name.clone());
                let appended_to_parent = match (self.projection.messages.last_mut(), parent_message_id) {
                    (Some(last), Some(parent))
                        if last.role() == Role::Assistant && last.id() == parent.as_str() =>
                    {
                        last.push_tool_call(call.clone());
                        true
                    }
                    _ => false,
                };
                if !appended_to_parent {
                    let id = parent_message_id
                        .clone()
                        .unwrap_or_else(|| tool_call_id.clone());
                    let mut message = Message::Assistant {
                        id,
                        content: None,
                        name: None,
                        tool_calls: None,
                    };
                    message.push_tool_call(call);
                    self.projection.messages.push(message);
                }
                Some(self.messages_update())
            }
            Event::ToolCallArgs {
                tool_call_id,
                delta,
                ..
            } => {
                let last = self.projection.messages.last_mut()?;
                let call = last.tool_call_mut(tool_call_id)?;
                call.function.arguments.push_str(delta);
                let arguments = call.function.arguments.clone();

                let state = self.predict_merge(tool_call_id, &arguments);
                Some(StateUpdate {
                    messages: Some(self.projection.messages.clone()),
                    state,
                })
            }
            Event::StateSnapshot { snapshot, .. } => {
                self.projection.state = snapshot.clone();
                Some(self.state_update())
            }
            Event::StateDelta { delta, .. } => {
                match apply_delta(&mut self.projection.state, delta) {
                    Ok(()) => Some(self.state_update()),
                    Err(e) => {
                        warn!(error = %e, "state delta failed; state unchanged");
                        if let Some(handler) = &self.on_patch_error {
                            handler(&e);
                        }
                        None
                    }
                }
            }
            Event::MessagesSnapshot { messages, .. } => {
                self.projection.messages = messages.clone();
                Some(self.messages_update())
            }
            Event::Custom { name, value, .. } if name == PREDICT_STATE => {
                self.predict = parse_config(value);
                None
            }
            Event::StepFinished { .. } => {
                self.predict.clear();
                None
            }
            _ => None,
        }
    }

    /// Splice parseable partial tool arguments into state per the active
    /// predictive config.  Returns the new state when a merge happened.
    fn predict_merge(&mut self, tool_call_id: &str, arguments: &str) -> Option<Value> {
        let tool = self.tool_names.get(tool_call_id)?;
        let entry = self.predict.iter().find(|e| &e.tool == tool)?;
        // Partial JSON is expected while arguments stream; wait silently.
        let parsed: Value = serde_json::from_str(arguments).ok()?;
        let value = match &entry.tool_argument {
            Some(field) => parsed.get(field)?.clone(),
            None => parsed,
        };
        match &mut self.projection.state {
            Value::Object(map) => {
                map.insert(entry.state_key.clone(), value);
            }
            state @ Value::Null => {
                let mut map = Map::new();
                map.insert(entry.state_key.clone(), value);
                *state = Value::Object(map);
            }
            _ => {
                warn!("predictive state requires an object state; skipping merge");
                return None;
            }
        }
        Some(self.projection.state.clone())
    }

    fn messages_update(&self) -> StateUpdate {
        StateUpdate {
            messages: Some(self.projection.messages.clone()),
            state: None,
        }
    }

    fn state_update(&self) -> StateUpdate {
        StateUpdate {
            messages: None,
            state: Some(self.projection.state.clone()),
        }
    }
}

impl Default for StateReducer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
