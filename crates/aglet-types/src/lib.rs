// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Data model for the streaming agent-interaction protocol: the 16-variant
//! event union, role-tagged messages, tool schemas, and the run descriptor.

mod event;
mod input;
mod message;

pub use event::{Event, EventType};
pub use input::{Context, RunAgentInput, ToolSchema};
pub use message::{FunctionCall, Message, Role, ToolCall, ToolCallKind};
