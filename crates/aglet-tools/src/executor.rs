// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use aglet_types::{ToolCall, ToolSchema};

/// Everything an executor sees about one invocation.
#[derive(Debug, Clone)]
pub struct ToolCallContext {
    /// The completed call, with fully accumulated arguments.
    pub tool_call: ToolCall,
    pub thread_id: String,
    pub run_id: String,
}

/// Outcome of validating a call's accumulated arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    errors: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self { errors }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

/// The outcome of a tool execution, serialised verbatim into the content of
/// the tool message sent back to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// A host-registered handler that runs when the agent invokes its tool.
///
/// Executors are shared and read-only after registration; they must tolerate
/// concurrent calls.  Failures should be returned as errors — the mediator
/// materialises them into `{success: false}` tool results rather than
/// crashing the pipeline.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// The schema advertised to the agent.
    fn schema(&self) -> ToolSchema;

    /// Validate the accumulated argument string before execution.
    ///
    /// The default accepts empty arguments and any JSON object.
    fn validate(&self, arguments: &str) -> ValidationResult {
        if arguments.trim().is_empty() {
            return ValidationResult::ok();
        }
        match serde_json::from_str::<Value>(arguments) {
            Ok(Value::Object(_)) => ValidationResult::ok(),
            Ok(other) => ValidationResult::invalid(vec![format!(
                "expected a JSON object, got {other}"
            )]),
            Err(e) => ValidationResult::invalid(vec![format!("arguments are not valid JSON: {e}")]),
        }
    }

    /// Run the tool.
    async fn execute(&self, ctx: &ToolCallContext) -> anyhow::Result<ToolResult>;

    /// Upper bound on execution time, enforced by the mediator.
    fn max_execution_time(&self) -> Option<Duration> {
        None
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
