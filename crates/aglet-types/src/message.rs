// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

/// The author of a message.  Serialised lowercase on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Developer,
    System,
    Assistant,
    User,
    Tool,
}

/// Discriminator for [`ToolCall::kind`].  The protocol currently defines a
/// single kind; the field exists for forward compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallKind {
    #[default]
    Function,
}

/// The function a tool call targets.  `arguments` is a JSON-serialised
/// string, accumulated incrementally from argument deltas while streaming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// A tool invocation requested by the agent inside an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: ToolCallKind,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ToolCallKind::Function,
            function: FunctionCall {
                name: name.into(),
                arguments: String::new(),
            },
        }
    }

    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.function.arguments = arguments.into();
        self
    }
}

/// A single message in the conversation, tagged by role.
///
/// Messages are immutable once committed to history; the state reducer
/// mutates a working copy while a message is still streaming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    Developer {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    System {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Assistant {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
    },
    User {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Tool {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        tool_call_id: String,
    },
}

impl Message {
    pub fn developer(id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Developer {
            id: id.into(),
            content: Some(content.into()),
            name: None,
        }
    }

    pub fn system(id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::System {
            id: id.into(),
            content: Some(content.into()),
            name: None,
        }
    }

    pub fn assistant(id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Assistant {
            id: id.into(),
            content: Some(content.into()),
            name: None,
            tool_calls: None,
        }
    }

    /// An assistant message with no content yet — the streaming target for
    /// TEXT_MESSAGE_CONTENT and TOOL_CALL_* deltas.
    pub fn assistant_streaming(id: impl Into<String>) -> Self {
        Message::Assistant {
            id: id.into(),
            content: Some(String::new()),
            name: None,
            tool_calls: None,
        }
    }

    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::User {
            id: id.into(),
            content: Some(content.into()),
            name: None,
        }
    }

    pub fn tool(
        id: impl Into<String>,
        content: impl Into<String>,
        tool_call_id: impl Into<String>,
    ) -> Self {
        Message::Tool {
            id: id.into(),
            content: Some(content.into()),
            tool_call_id: tool_call_id.into(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Message::Developer { id, .. }
            | Message::System { id, .. }
            | Message::Assistant { id, .. }
            | Message::User { id, .. }
            | Message::Tool { id, .. } => id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Message::Developer { .. } => Role::Developer,
            Message::System { .. } => Role::System,
            Message::Assistant { .. } => Role::Assistant,
            Message::User { .. } => Role::User,
            Message::Tool { .. } => Role::Tool,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            Message::Developer { content, .. }
            | Message::System { content, .. }
            | Message::Assistant { content, .. }
            | Message::User { content, .. }
            | Message::Tool { content, .. } => content.as_deref(),
        }
    }

    /// Append a streamed delta to this message's content.
    pub fn append_content(&mut self, delta: &str) {
        let content = match self {
            Message::Developer { content, .. }
            | Message::System { content, .. }
            | Message::Assistant { content, .. }
            | Message::User { content, .. }
            | Message::Tool { content, .. } => content,
        };
        match content {
            Some(text) => text.push_str(delta),
            None => *content = Some(delta.to_string()),
        }
    }

    /// The tool calls of an assistant message, if any.
    pub fn tool_calls(&self) -> Option<&[ToolCall]> {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls.as_deref(),
            _ => None,
        }
    }

    /// Append a tool call to an assistant message.  No-op for other roles.
    pub fn push_tool_call(&mut self, call: ToolCall) {
        if let Message::Assistant { tool_calls, .. } = self {
            tool_calls.get_or_insert_with(Vec::new).push(call);
        }
    }

    /// Mutable access to the tool call with the given id, if this is an
    /// assistant message carrying it.
    pub fn tool_call_mut(&mut self, tool_call_id: &str) -> Option<&mut ToolCall> {
        match self {
            Message::Assistant {
                tool_calls: Some(calls),
                ..
            } => calls.iter_mut().find(|c| c.id == tool_call_id),
            _ => None,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serialises_lowercase() {
        for (role, wire) in [
            (Role::Developer, "\"developer\""),
            (Role::System, "\"system\""),
            (Role::Assistant, "\"assistant\""),
            (Role::User, "\"user\""),
            (Role::Tool, "\"tool\""),
        ] {
            assert_eq!(serde_json::to_string(&role).unwrap(), wire);
        }
    }

    #[test]
    fn message_role_field_is_named_role() {
        let m = Message::user("u1", "hi");
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["role"], "user");
        assert!(v.get("messageRole").is_none());
    }

    #[test]
    fn user_message_round_trips() {
        let m = Message::user("u1", "hello");
        let json = serde_json::to_string(&m).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn assistant_with_tool_calls_round_trips() {
        let m = Message::Assistant {
            id: "a1".into(),
            content: None,
            name: None,
            tool_calls: Some(vec![ToolCall::new("tc1", "echo").with_arguments(r#"{"x":1}"#)]),
        };
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains(r#""type":"function""#), "missing kind: {json}");
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn tool_message_carries_tool_call_id() {
        let m = Message::tool("t1", "{\"success\":true}", "tc1");
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["role"], "tool");
        assert_eq!(v["tool_call_id"], "tc1");
    }

    #[test]
    fn message_list_round_trips() {
        let list = vec![
            Message::system("s1", "be helpful"),
            Message::user("u1", "hi"),
            Message::assistant("a1", "hello"),
            Message::developer("d1", "note"),
            Message::tool("t1", "ok", "tc1"),
        ];
        let json = serde_json::to_string(&list).unwrap();
        let back: Vec<Message> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, list);
    }

    #[test]
    fn append_content_extends_existing_text() {
        let mut m = Message::assistant_streaming("a1");
        m.append_content("Hello, ");
        m.append_content("world!");
        assert_eq!(m.content(), Some("Hello, world!"));
    }

    #[test]
    fn append_content_creates_missing_content() {
        let mut m = Message::Assistant {
            id: "a1".into(),
            content: None,
            name: None,
            tool_calls: None,
        };
        m.append_content("hi");
        assert_eq!(m.content(), Some("hi"));
    }

    #[test]
    fn push_tool_call_only_affects_assistant() {
        let mut user = Message::user("u1", "hi");
        user.push_tool_call(ToolCall::new("tc1", "echo"));
        assert!(user.tool_calls().is_none());

        let mut asst = Message::assistant_streaming("a1");
        asst.push_tool_call(ToolCall::new("tc1", "echo"));
        assert_eq!(asst.tool_calls().unwrap().len(), 1);
    }

    #[test]
    fn tool_call_mut_finds_by_id() {
        let mut m = Message::assistant_streaming("a1");
        m.push_tool_call(ToolCall::new("tc1", "echo"));
        m.push_tool_call(ToolCall::new("tc2", "write"));
        m.tool_call_mut("tc2").unwrap().function.arguments.push_str("{}");
        assert_eq!(m.tool_calls().unwrap()[1].function.arguments, "{}");
        assert!(m.tool_call_mut("tc9").is_none());
    }

    #[test]
    fn none_content_is_omitted_on_encode() {
        let m = Message::Assistant {
            id: "a1".into(),
            content: None,
            name: None,
            tool_calls: None,
        };
        let json = serde_json::to_string(&m).unwrap();
        assert!(!json.contains("content"), "null content emitted: {json}");
        assert!(!json.contains("tool_calls"), "null tool_calls emitted: {json}");
    }

    #[test]
    fn unknown_fields_on_messages_are_ignored() {
        let m: Message = serde_json::from_str(
            r#"{"role":"user","id":"u1","content":"hi","client_hint":"x"}"#,
        )
        .unwrap();
        assert_eq!(m.role(), Role::User);
    }
}
