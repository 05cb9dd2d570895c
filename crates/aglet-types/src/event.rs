// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::{Message, Role};

fn assistant_role() -> Role {
    Role::Assistant
}

/// One streamed protocol event.
///
/// The wire format is a JSON object with a `type` discriminator in
/// SCREAMING_SNAKE_CASE and snake_case payload fields.  Every variant carries
/// an optional `timestamp` (epoch milliseconds) and an optional `raw_event`
/// (a verbatim copy of the server record, kept for debugging).  Null fields
/// are omitted on encode; unknown fields are ignored on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    /// The run has begun executing on the given thread.
    RunStarted {
        thread_id: String,
        run_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_event: Option<Value>,
    },
    /// The run completed normally.  `result` is an optional agent-defined
    /// outcome value.
    RunFinished {
        thread_id: String,
        run_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_event: Option<Value>,
    },
    /// The run failed.  Always the last event of its stream.
    RunError {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_event: Option<Value>,
    },
    /// A named step within the run has started.
    StepStarted {
        step_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_event: Option<Value>,
    },
    /// A named step within the run has finished.
    StepFinished {
        step_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_event: Option<Value>,
    },
    /// The agent has started streaming a text message.
    TextMessageStart {
        message_id: String,
        #[serde(default = "assistant_role")]
        role: Role,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_event: Option<Value>,
    },
    /// A chunk of content for the in-flight text message.
    TextMessageContent {
        message_id: String,
        delta: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_event: Option<Value>,
    },
    /// The in-flight text message is complete.
    TextMessageEnd {
        message_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_event: Option<Value>,
    },
    /// The agent has started a tool call.
    ToolCallStart {
        tool_call_id: String,
        tool_call_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_message_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_event: Option<Value>,
    },
    /// A chunk of the JSON argument string for the in-flight tool call.
    ToolCallArgs {
        tool_call_id: String,
        delta: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_event: Option<Value>,
    },
    /// The in-flight tool call is complete.
    ToolCallEnd {
        tool_call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_event: Option<Value>,
    },
    /// Complete replacement of the agent state.
    StateSnapshot {
        snapshot: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_event: Option<Value>,
    },
    /// An RFC-6902 JSON-Patch array to apply to the agent state.
    ///
    /// Kept as a raw `Value` so that both historical encodings (typed
    /// operation list and plain JSON array) decode; the reducer parses the
    /// operations at apply time.
    StateDelta {
        delta: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_event: Option<Value>,
    },
    /// Complete replacement of the conversation message list.
    MessagesSnapshot {
        messages: Vec<Message>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_event: Option<Value>,
    },
    /// An opaque pass-through event from an external source.
    Raw {
        event: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_event: Option<Value>,
    },
    /// An application-defined event carrying arbitrary data.
    Custom {
        name: String,
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_event: Option<Value>,
    },
}

/// Discriminator-only view of [`Event`], usable for filtering and for error
/// messages that must show the wire-form type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    RunStarted,
    RunFinished,
    RunError,
    StepStarted,
    StepFinished,
    TextMessageStart,
    TextMessageContent,
    TextMessageEnd,
    ToolCallStart,
    ToolCallArgs,
    ToolCallEnd,
    StateSnapshot,
    StateDelta,
    MessagesSnapshot,
    Raw,
    Custom,
}

impl EventType {
    /// The wire-form name of this event type (SCREAMING_SNAKE_CASE).
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::RunStarted => "RUN_STARTED",
            EventType::RunFinished => "RUN_FINISHED",
            EventType::RunError => "RUN_ERROR",
            EventType::StepStarted => "STEP_STARTED",
            EventType::StepFinished => "STEP_FINISHED",
            EventType::TextMessageStart => "TEXT_MESSAGE_START",
            EventType::TextMessageContent => "TEXT_MESSAGE_CONTENT",
            EventType::TextMessageEnd => "TEXT_MESSAGE_END",
            EventType::ToolCallStart => "TOOL_CALL_START",
            EventType::ToolCallArgs => "TOOL_CALL_ARGS",
            EventType::ToolCallEnd => "TOOL_CALL_END",
            EventType::StateSnapshot => "STATE_SNAPSHOT",
            EventType::StateDelta => "STATE_DELTA",
            EventType::MessagesSnapshot => "MESSAGES_SNAPSHOT",
            EventType::Raw => "RAW",
            EventType::Custom => "CUSTOM",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Event {
    pub fn event_type(&self) -> EventType {
        match self {
            Event::RunStarted { .. } => EventType::RunStarted,
            Event::RunFinished { .. } => EventType::RunFinished,
            Event::RunError { .. } => EventType::RunError,
            Event::StepStarted { .. } => EventType::StepStarted,
            Event::StepFinished { .. } => EventType::StepFinished,
            Event::TextMessageStart { .. } => EventType::TextMessageStart,
            Event::TextMessageContent { .. } => EventType::TextMessageContent,
            Event::TextMessageEnd { .. } => EventType::TextMessageEnd,
            Event::ToolCallStart { .. } => EventType::ToolCallStart,
            Event::ToolCallArgs { .. } => EventType::ToolCallArgs,
            Event::ToolCallEnd { .. } => EventType::ToolCallEnd,
            Event::StateSnapshot { .. } => EventType::StateSnapshot,
            Event::StateDelta { .. } => EventType::StateDelta,
            Event::MessagesSnapshot { .. } => EventType::MessagesSnapshot,
            Event::Raw { .. } => EventType::Raw,
            Event::Custom { .. } => EventType::Custom,
        }
    }

    // ── Convenience constructors ─────────────────────────────────────────────
    // Timestamps and raw copies are debugging metadata attached by servers;
    // locally constructed events leave them unset.

    pub fn run_started(thread_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Event::RunStarted {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
            timestamp: None,
            raw_event: None,
        }
    }

    pub fn run_finished(thread_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Event::RunFinished {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
            result: None,
            timestamp: None,
            raw_event: None,
        }
    }

    pub fn run_error(message: impl Into<String>) -> Self {
        Event::RunError {
            message: message.into(),
            code: None,
            timestamp: None,
            raw_event: None,
        }
    }

    pub fn run_error_with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Event::RunError {
            message: message.into(),
            code: Some(code.into()),
            timestamp: None,
            raw_event: None,
        }
    }

    pub fn step_started(step_name: impl Into<String>) -> Self {
        Event::StepStarted {
            step_name: step_name.into(),
            timestamp: None,
            raw_event: None,
        }
    }

    pub fn step_finished(step_name: impl Into<String>) -> Self {
        Event::StepFinished {
            step_name: step_name.into(),
            timestamp: None,
            raw_event: None,
        }
    }

    pub fn text_start(message_id: impl Into<String>) -> Self {
        Event::TextMessageStart {
            message_id: message_id.into(),
            role: Role::Assistant,
            timestamp: None,
            raw_event: None,
        }
    }

    pub fn text_content(message_id: impl Into<String>, delta: impl Into<String>) -> Self {
        Event::TextMessageContent {
            message_id: message_id.into(),
            delta: delta.into(),
            timestamp: None,
            raw_event: None,
        }
    }

    pub fn text_end(message_id: impl Into<String>) -> Self {
        Event::TextMessageEnd {
            message_id: message_id.into(),
            timestamp: None,
            raw_event: None,
        }
    }

    pub fn tool_start(tool_call_id: impl Into<String>, tool_call_name: impl Into<String>) -> Self {
        Event::ToolCallStart {
            tool_call_id: tool_call_id.into(),
            tool_call_name: tool_call_name.into(),
            parent_message_id: None,
            timestamp: None,
            raw_event: None,
        }
    }

    pub fn tool_start_with_parent(
        tool_call_id: impl Into<String>,
        tool_call_name: impl Into<String>,
        parent_message_id: impl Into<String>,
    ) -> Self {
        Event::ToolCallStart {
            tool_call_id: tool_call_id.into(),
            tool_call_name: tool_call_name.into(),
            parent_message_id: Some(parent_message_id.into()),
            timestamp: None,
            raw_event: None,
        }
    }

    pub fn tool_args(tool_call_id: impl Into<String>, delta: impl Into<String>) -> Self {
        Event::ToolCallArgs {
            tool_call_id: tool_call_id.into(),
            delta: delta.into(),
            timestamp: None,
            raw_event: None,
        }
    }

    pub fn tool_end(tool_call_id: impl Into<String>) -> Self {
        Event::ToolCallEnd {
            tool_call_id: tool_call_id.into(),
            timestamp: None,
            raw_event: None,
        }
    }

    pub fn state_snapshot(snapshot: Value) -> Self {
        Event::StateSnapshot {
            snapshot,
            timestamp: None,
            raw_event: None,
        }
    }

    pub fn state_delta(delta: Value) -> Self {
        Event::StateDelta {
            delta,
            timestamp: None,
            raw_event: None,
        }
    }

    pub fn messages_snapshot(messages: Vec<Message>) -> Self {
        Event::MessagesSnapshot {
            messages,
            timestamp: None,
            raw_event: None,
        }
    }

    pub fn raw(event: Value) -> Self {
        Event::Raw {
            event,
            source: None,
            timestamp: None,
            raw_event: None,
        }
    }

    pub fn custom(name: impl Into<String>, value: Value) -> Self {
        Event::Custom {
            name: name.into(),
            value,
            timestamp: None,
            raw_event: None,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn run_started_serialises_with_screaming_discriminator() {
        let ev = Event::run_started("t1", "r1");
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["type"], "RUN_STARTED");
        assert_eq!(v["thread_id"], "t1");
        assert_eq!(v["run_id"], "r1");
    }

    #[test]
    fn none_fields_are_omitted_on_encode() {
        let ev = Event::text_content("m1", "hi");
        let json = serde_json::to_string(&ev).unwrap();
        assert!(!json.contains("timestamp"), "unexpected timestamp: {json}");
        assert!(!json.contains("raw_event"), "unexpected raw_event: {json}");
    }

    #[test]
    fn every_variant_round_trips() {
        let events = vec![
            Event::run_started("t", "r"),
            Event::run_finished("t", "r"),
            Event::run_error_with_code("boom", "TRANSPORT_HTTP"),
            Event::step_started("plan"),
            Event::step_finished("plan"),
            Event::text_start("m1"),
            Event::text_content("m1", "hello"),
            Event::text_end("m1"),
            Event::tool_start_with_parent("tc1", "echo", "m1"),
            Event::tool_args("tc1", "{\"x\":"),
            Event::tool_end("tc1"),
            Event::state_snapshot(json!({"count": 1})),
            Event::state_delta(json!([{"op": "add", "path": "/a", "value": 1}])),
            Event::messages_snapshot(vec![crate::Message::user("u1", "hi")]),
            Event::raw(json!({"anything": true})),
            Event::custom("PredictState", json!([{"state_key": "draft", "tool": "write_doc"}])),
        ];
        for ev in events {
            let json = serde_json::to_string(&ev).unwrap();
            let back: Event = serde_json::from_str(&json).unwrap();
            assert_eq!(back, ev, "round-trip mismatch for {json}");
        }
    }

    #[test]
    fn timestamp_and_raw_event_survive_round_trip() {
        let ev = Event::RunStarted {
            thread_id: "t".into(),
            run_id: "r".into(),
            timestamp: Some(1_700_000_000_000),
            raw_event: Some(json!({"type": "RUN_STARTED"})),
        };
        let json = serde_json::to_string(&ev).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ev);
    }

    #[test]
    fn text_start_role_defaults_to_assistant() {
        let ev: Event =
            serde_json::from_str(r#"{"type":"TEXT_MESSAGE_START","message_id":"m1"}"#).unwrap();
        match ev {
            Event::TextMessageStart { role, .. } => assert_eq!(role, Role::Assistant),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn unknown_discriminator_is_a_decode_error() {
        let res: Result<Event, _> =
            serde_json::from_str(r#"{"type":"SOMETHING_NEW","data":1}"#);
        assert!(res.is_err());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let ev: Event = serde_json::from_str(
            r#"{"type":"RUN_FINISHED","thread_id":"t","run_id":"r","extra_field":42}"#,
        )
        .unwrap();
        assert_eq!(ev.event_type(), EventType::RunFinished);
    }

    #[test]
    fn run_finished_result_is_optional_and_preserved() {
        let ev: Event = serde_json::from_str(
            r#"{"type":"RUN_FINISHED","thread_id":"t","run_id":"r","result":{"ok":true}}"#,
        )
        .unwrap();
        match ev {
            Event::RunFinished { result, .. } => assert_eq!(result, Some(json!({"ok": true}))),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn state_delta_accepts_plain_json_array() {
        let ev: Event = serde_json::from_str(
            r#"{"type":"STATE_DELTA","delta":[{"op":"replace","path":"/count","value":2}]}"#,
        )
        .unwrap();
        match ev {
            Event::StateDelta { delta, .. } => assert!(delta.is_array()),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn event_type_display_is_wire_form() {
        assert_eq!(EventType::ToolCallStart.to_string(), "TOOL_CALL_START");
        assert_eq!(EventType::TextMessageStart.to_string(), "TEXT_MESSAGE_START");
        assert_eq!(Event::raw(json!(null)).event_type().to_string(), "RAW");
    }
}
