// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use aglet_types::{Event, Message, ToolCall};

use crate::executor::{ToolCallContext, ToolExecutor, ToolResult};
use crate::registry::ToolRegistry;

/// One-way channel through which the mediator sends tool-result messages
/// back to the agent.  A single-method sink keeps the mediator free of any
/// back-pointer to the facade or transport.
#[async_trait]
pub trait ToolMessageSink: Send + Sync {
    async fn send(&self, message: Message) -> anyhow::Result<()>;
}

/// Tracks the tasks a mediator spawned so a run can be cancelled (aborting
/// in-flight executions and pending confirmations) or, in tests, awaited.
#[derive(Clone, Default)]
pub struct TaskSet {
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl TaskSet {
    fn track(&self, handle: JoinHandle<()>) {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).push(handle);
    }

    /// Abort every tracked task.  Aborting drops executor futures at their
    /// next suspension point, which also notifies pending confirmation
    /// handlers through their closed channels.
    pub fn abort_all(&self) {
        let tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        for task in tasks {
            task.abort();
        }
    }

    /// Await every tracked task.  Intended for tests and graceful shutdown.
    pub async fn join_all(&self) {
        let tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        for task in tasks {
            let _ = task.await;
        }
    }
}

struct PendingCall {
    name: String,
    arguments: String,
}

/// Sits in the event stream between verifier and host, recognising tool
/// calls addressed to registered executors and sending their results back
/// to the agent as new run input.
///
/// Execution is fire-and-forget with respect to the stream: the mediator
/// spawns a task per completed call and never delays later events on it.
pub struct ToolMediator {
    registry: Arc<ToolRegistry>,
    send: Arc<dyn ToolMessageSink>,
    thread_id: String,
    run_id: String,
    pending: HashMap<String, PendingCall>,
    tasks: TaskSet,
}

impl ToolMediator {
    pub fn new(
        registry: Arc<ToolRegistry>,
        send: Arc<dyn ToolMessageSink>,
        thread_id: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            send,
            thread_id: thread_id.into(),
            run_id: run_id.into(),
            pending: HashMap::new(),
            tasks: TaskSet::default(),
        }
    }

    /// Handle to the spawned-task tracker, for cancellation.
    pub fn tasks(&self) -> TaskSet {
        self.tasks.clone()
    }

    /// Observe one verified event.  Events are never consumed or reordered;
    /// the mediator only accumulates tool-call state and, on completion,
    /// dispatches the execution in the background.
    pub fn observe(&mut self, event: &Event) {
        match event {
            Event::ToolCallStart {
                tool_call_id,
                tool_call_name,
                ..
            } => {
                self.pending.insert(
                    tool_call_id.clone(),
                    PendingCall {
                        name: tool_call_name.clone(),
                        arguments: String::new(),
                    },
                );
            }
            Event::ToolCallArgs {
                tool_call_id,
                delta,
                ..
            } => {
                if let Some(call) = self.pending.get_mut(tool_call_id) {
                    call.arguments.push_str(delta);
                }
            }
            Event::ToolCallEnd { tool_call_id, .. } => {
                if let Some(call) = self.pending.remove(tool_call_id) {
                    self.dispatch(tool_call_id.clone(), call);
                }
            }
            _ => {}
        }
    }

    fn dispatch(&self, tool_call_id: String, call: PendingCall) {
        // Unregistered tools are forwarded untouched; answering them is the
        // host's responsibility.
        let Some(executor) = self.registry.get(&call.name) else {
            debug!(tool = %call.name, "no executor registered; leaving tool call to the host");
            return;
        };

        let send = self.send.clone();
        let thread_id = self.thread_id.clone();
        let run_id = self.run_id.clone();
        let handle = tokio::spawn(async move {
            let result =
                run_executor(executor.as_ref(), &tool_call_id, call, thread_id, run_id).await;
            let content = serde_json::to_string(&result).unwrap_or_else(|e| {
                warn!(error = %e, "tool result did not serialise");
                r#"{"success":false,"error":"tool result did not serialise"}"#.to_string()
            });
            let message = Message::tool(Uuid::new_v4().to_string(), content, tool_call_id);
            if let Err(e) = send.send(message).await {
                warn!(error = %e, "failed to send tool result back to the agent");
            }
        });
        self.tasks.track(handle);
    }
}

async fn run_executor(
    executor: &dyn ToolExecutor,
    tool_call_id: &str,
    call: PendingCall,
    thread_id: String,
    run_id: String,
) -> ToolResult {
    let validation = executor.validate(&call.arguments);
    if !validation.is_ok() {
        return ToolResult::err(format!(
            "invalid arguments: {}",
            validation.errors().join("; ")
        ));
    }

    let ctx = ToolCallContext {
        tool_call: ToolCall::new(tool_call_id, call.name).with_arguments(call.arguments),
        thread_id,
        run_id,
    };

    let outcome = match executor.max_execution_time() {
        Some(limit) => match tokio::time::timeout(limit, executor.execute(&ctx)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                return ToolResult::err(format!(
                    "execution timed out after {}ms",
                    limit.as_millis()
                ))
            }
        },
        None => executor.execute(&ctx).await,
    };

    match outcome {
        Ok(result) => result,
        Err(e) => ToolResult::err(e.to_string()),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
