// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::Message;

/// A tool schema advertised to the agent.  `parameters` is a JSON-Schema
/// object describing the call signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A free-form context entry passed to the agent alongside the messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub description: String,
    pub value: String,
}

impl Context {
    pub fn new(description: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            value: value.into(),
        }
    }
}

/// The run descriptor POSTed to the agent endpoint to open one run.
///
/// Empty containers are still emitted so the server always sees a stable
/// body shape; only null fields are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunAgentInput {
    pub thread_id: String,
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub state: Value,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
    pub context: Vec<Context>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub forwarded_props: Value,
}

impl RunAgentInput {
    /// A descriptor with the given ids and everything else empty.
    pub fn new(thread_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
            state: Value::Null,
            messages: Vec::new(),
            tools: Vec::new(),
            context: Vec::new(),
            forwarded_props: Value::Null,
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_state(mut self, state: Value) -> Self {
        self.state = state;
        self
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
