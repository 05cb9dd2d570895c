// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};

use aglet_types::ToolSchema;

use crate::executor::{ToolCallContext, ToolExecutor, ToolResult};

/// Sent to the host when the agent requests a confirmation; the host answers
/// through `respond`.  Dropping `respond` aborts the confirmation and the
/// tool reports a failure result.
pub struct ConfirmationRequest {
    pub tool_call_id: String,
    /// The `message` argument the agent supplied, if any.
    pub prompt: Option<String>,
    pub respond: oneshot::Sender<ConfirmationResponse>,
}

/// The host's answer to a confirmation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationResponse {
    pub confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ConfirmationResponse {
    pub fn approved() -> Self {
        Self {
            confirmed: true,
            reason: None,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            confirmed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Built-in executor that suspends until the host resolves a confirmation.
///
/// The suspension is a rendezvous: the executor sends a
/// [`ConfirmationRequest`] through the channel the host supplied and awaits
/// the paired oneshot answer.  Cancelling the run aborts the executor task,
/// which closes the oneshot and notifies the host-side handler.
pub struct UserConfirmationTool {
    requests: mpsc::Sender<ConfirmationRequest>,
}

impl UserConfirmationTool {
    pub const NAME: &'static str = "user_confirmation";

    pub fn new(requests: mpsc::Sender<ConfirmationRequest>) -> Self {
        Self { requests }
    }
}

#[async_trait]
impl ToolExecutor for UserConfirmationTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "Ask the user to confirm or reject the described action.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "message": {
                        "type": "string",
                        "description": "What the user is being asked to confirm",
                    },
                },
            }),
        }
    }

    async fn execute(&self, ctx: &ToolCallContext) -> anyhow::Result<ToolResult> {
        let prompt = serde_json::from_str::<Value>(&ctx.tool_call.function.arguments)
            .ok()
            .and_then(|args| args.get("message").and_then(Value::as_str).map(String::from));

        let (respond, answer) = oneshot::channel();
        self.requests
            .send(ConfirmationRequest {
                tool_call_id: ctx.tool_call.id.clone(),
                prompt,
                respond,
            })
            .await
            .context("no confirmation handler is listening")?;

        let response = answer.await.context("confirmation was aborted")?;
        Ok(ToolResult::ok(serde_json::to_value(response)?))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
