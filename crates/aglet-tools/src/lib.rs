// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Tool execution: the executor trait, the registry, the stream mediator
//! that runs registered tools when the agent calls them, and the built-in
//! `user_confirmation` rendezvous tool.

mod confirm;
mod executor;
mod mediator;
mod registry;

pub use confirm::{ConfirmationRequest, ConfirmationResponse, UserConfirmationTool};
pub use executor::{ToolCallContext, ToolExecutor, ToolResult, ValidationResult};
pub use mediator::{TaskSet, ToolMediator, ToolMessageSink};
pub use registry::ToolRegistry;
