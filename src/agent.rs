// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use futures::{stream, StreamExt};
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use aglet_protocol::{decode_stream, verify_stream, EventStream};
use aglet_state::{PatchError, Projection, StateReducer};
use aglet_tools::{TaskSet, ToolMediator, ToolMessageSink};
use async_trait::async_trait;
use aglet_transport::{HttpTransport, SessionHandle, Transport, TransportError};
use aglet_types::{Event, Message, RunAgentInput, ToolSchema};

use crate::config::AgentConfig;
use crate::ids::MonotonicIds;

type PatchErrorCallback = Arc<dyn Fn(&PatchError) + Send + Sync>;

/// One live run: the verified event stream plus observation and control
/// handles.
///
/// The pipeline is pull-based — the reducer and the tool mediator observe
/// each event as the host polls it, so the host's consumption rate bounds
/// the transport's read rate.
pub struct AgentRun {
    /// The verified event stream, in server order.  Transport failures are
    /// materialised as a final RUN_ERROR event; protocol violations
    /// terminate the stream with a typed error.
    pub events: EventStream,
    projection: watch::Receiver<Projection>,
    session: Option<SessionHandle>,
    tasks: TaskSet,
}

/// Everything a completed run produced.
#[derive(Debug)]
pub struct RunResult {
    pub events: Vec<Event>,
    pub projection: Projection,
}

impl AgentRun {
    /// The latest projection snapshot.
    pub fn projection(&self) -> Projection {
        self.projection.borrow().clone()
    }

    /// Watch-style subscription to projection snapshots.
    pub fn watch_projection(&self) -> watch::Receiver<Projection> {
        self.projection.clone()
    }

    /// The transport session, when one was established.
    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    /// Cancel the run: closes the transport session and aborts in-flight
    /// tool executions and pending confirmations.
    pub fn cancel(&self) {
        if let Some(session) = &self.session {
            session.close();
        }
        self.tasks.abort_all();
    }

    /// Drive the stream to completion and return everything it produced.
    ///
    /// A protocol violation surfaces as the returned error; events consumed
    /// before it are lost to the caller, so hosts that need partial results
    /// should consume `events` manually.
    pub async fn collect(mut self) -> anyhow::Result<RunResult> {
        let mut events = Vec::new();
        while let Some(item) = self.events.next().await {
            events.push(item?);
        }
        Ok(RunResult {
            events,
            projection: self.projection.borrow().clone(),
        })
    }
}

/// Stateless agent facade: every call builds a fresh run input, no history
/// is retained.
pub struct HttpAgent {
    config: AgentConfig,
    transport: Arc<dyn Transport>,
    ids: MonotonicIds,
    /// Threads that have already been sent the tool catalogue.
    threads_with_tools: Mutex<HashSet<String>>,
    on_patch_error: Option<PatchErrorCallback>,
}

impl HttpAgent {
    pub fn new(config: AgentConfig) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(config.transport_config())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Construct over an injected transport.  Used by tests and by callers
    /// with custom wire handling.
    pub fn with_transport(config: AgentConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            ids: MonotonicIds::new(),
            threads_with_tools: Mutex::new(HashSet::new()),
            on_patch_error: None,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Install a callback invoked when a STATE_DELTA fails to apply.  The
    /// stream continues either way.
    pub fn set_patch_error_handler(
        &mut self,
        handler: impl Fn(&PatchError) + Send + Sync + 'static,
    ) {
        self.on_patch_error = Some(Arc::new(handler));
    }

    pub(crate) fn next_id(&self, prefix: &str) -> String {
        self.ids.next(prefix)
    }

    /// Send one user message on a fresh `{system?, user}` input.
    pub async fn send_message(
        &self,
        text: &str,
        thread_id: Option<&str>,
        state: Option<Value>,
    ) -> anyhow::Result<AgentRun> {
        let thread_id = match thread_id {
            Some(id) => id.to_string(),
            None => self.ids.next("thread"),
        };
        let mut messages = Vec::new();
        if let Some(prompt) = &self.config.system_prompt {
            messages.push(Message::system(self.ids.next("msg"), prompt));
        }
        let user_id = self
            .config
            .user_id
            .clone()
            .unwrap_or_else(|| self.ids.next("msg"));
        messages.push(Message::user(user_id, text));
        self.run_thread(&thread_id, messages, state.unwrap_or(Value::Null))
            .await
    }

    /// Open a run on `thread_id` with an explicit message list.  Applies the
    /// per-thread tool-catalogue optimisation.
    pub async fn run_thread(
        &self,
        thread_id: &str,
        messages: Vec<Message>,
        state: Value,
    ) -> anyhow::Result<AgentRun> {
        let input = RunAgentInput {
            thread_id: thread_id.to_string(),
            run_id: self.ids.next("run"),
            state,
            messages,
            tools: self.tools_for_thread(thread_id),
            context: self.config.context.clone(),
            forwarded_props: self.config.forwarded_props.clone(),
        };
        self.run(input).await
    }

    /// Open a run from a verbatim descriptor.  No catalogue logic is
    /// applied.
    pub async fn run(&self, input: RunAgentInput) -> anyhow::Result<AgentRun> {
        let thread_id = input.thread_id.clone();
        let run_id = input.run_id.clone();
        let initial_state = input.state.clone();

        let session = match self.transport.start_run(input).await {
            Ok(session) => session,
            // Connection-phase failures surface as a single RUN_ERROR run.
            Err(e) => return Ok(failed_run(e, initial_state)),
        };
        let (records, handle) = session.into_parts();

        let mut reducer = StateReducer::with_state(initial_state);
        if let Some(callback) = &self.on_patch_error {
            let callback = callback.clone();
            reducer.set_patch_error_handler(move |e| callback(e));
        }
        let (projection_tx, projection_rx) = watch::channel(reducer.projection().clone());

        let mut mediator = self.config.tool_registry.clone().map(|registry| {
            let sink: Arc<dyn ToolMessageSink> = Arc::new(SessionSink {
                handle: handle.clone(),
            });
            ToolMediator::new(registry, sink, thread_id, run_id)
        });
        let tasks = mediator
            .as_ref()
            .map(ToolMediator::tasks)
            .unwrap_or_default();

        let debug_events = self.config.debug;
        let events = verify_stream(decode_stream(records))
            // Transport failures become the run's final RUN_ERROR.
            .map(|item| match item {
                Err(e) => match e.downcast::<TransportError>() {
                    Ok(transport) => Ok(Event::run_error_with_code(
                        transport.to_string(),
                        transport.code(),
                    )),
                    Err(other) => Err(other),
                },
                ok => ok,
            })
            // Reducer and mediator observe ahead of the host, in order.
            .map(move |item| {
                if let Ok(event) = &item {
                    if debug_events {
                        debug!(?event, "event");
                    }
                    if reducer.apply(event).is_some() {
                        let _ = projection_tx.send(reducer.projection().clone());
                    }
                    if let Some(mediator) = mediator.as_mut() {
                        mediator.observe(event);
                    }
                }
                item
            });

        Ok(AgentRun {
            events: Box::pin(events),
            projection: projection_rx,
            session: Some(handle),
            tasks,
        })
    }

    /// Forget which threads have been sent the tool catalogue; the next run
    /// on any thread carries the full catalogue again.
    pub fn clear_thread_tools_tracking(&self) {
        self.threads_with_tools
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// The catalogue for the first run on a thread, empty afterwards.
    fn tools_for_thread(&self, thread_id: &str) -> Vec<ToolSchema> {
        let Some(registry) = &self.config.tool_registry else {
            return Vec::new();
        };
        let mut sent = self
            .threads_with_tools
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if sent.insert(thread_id.to_string()) {
            registry.schemas()
        } else {
            Vec::new()
        }
    }
}

/// Routes mediator tool-result messages through the run's session.
struct SessionSink {
    handle: SessionHandle,
}

#[async_trait]
impl ToolMessageSink for SessionSink {
    async fn send(&self, message: Message) -> anyhow::Result<()> {
        self.handle
            .send_message(message)
            .await
            .map_err(anyhow::Error::from)
    }
}

/// A run that failed before its session existed: a one-event RUN_ERROR
/// stream with the error's stable code tag.
fn failed_run(error: TransportError, state: Value) -> AgentRun {
    let event = Event::run_error_with_code(error.to_string(), error.code());
    let (_, projection_rx) = watch::channel(Projection {
        messages: Vec::new(),
        state,
    });
    AgentRun {
        events: Box::pin(stream::iter(vec![Ok(event)])),
        projection: projection_rx,
        session: None,
        tasks: TaskSet::default(),
    }
}
