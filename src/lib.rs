// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Client-side runtime for a streaming agent-interaction protocol.
//!
//! A host submits a conversation turn to a remote agent over HTTP and
//! receives a live stream of typed events.  This crate composes the
//! pipeline — decode, verify, reduce, mediate tools — and exposes it
//! through two facades:
//!
//! - [`HttpAgent`] — stateless: every call builds a fresh run input.
//! - [`ChatAgent`] — stateful: per-thread history, mirrored from the
//!   streamed reply.

mod agent;
mod chat;
mod config;
mod ids;

pub use agent::{AgentRun, HttpAgent, RunResult};
pub use chat::{ChatAgent, DEFAULT_THREAD};
pub use config::AgentConfig;
pub use ids::MonotonicIds;

pub use aglet_protocol::{
    decode_record, decode_stream, verify_stream, DecodeError, EventStream, ProtocolError,
    ProtocolVerifier,
};
pub use aglet_state::{
    apply_delta, encode_pointer, evaluate_pointer, PatchError, PredictStateEntry, Projection,
    StateReducer, StateUpdate,
};
pub use aglet_tools::{
    ConfirmationRequest, ConfirmationResponse, TaskSet, ToolCallContext, ToolExecutor,
    ToolMediator, ToolMessageSink, ToolRegistry, ToolResult, UserConfirmationTool,
    ValidationResult,
};
pub use aglet_transport::{
    ExponentialBackoff, HttpTransport, HttpTransportConfig, MockTransport, RetryPolicy,
    RunSession, SessionHandle, Transport, TransportError,
};
pub use aglet_types::{
    Context, Event, EventType, FunctionCall, Message, Role, RunAgentInput, ToolCall,
    ToolCallKind, ToolSchema,
};
