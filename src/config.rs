// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use aglet_tools::ToolRegistry;
use aglet_transport::HttpTransportConfig;
use aglet_types::Context;

/// Facade configuration, shared by the stateless and stateful agents.
///
/// Authentication: when `bearer_token` is set requests carry
/// `Authorization: Bearer <token>`; otherwise, when `api_key` is set, the
/// key is sent under `api_key_header`.  Exactly one auth header is ever
/// attached.
#[derive(Clone)]
pub struct AgentConfig {
    /// Agent endpoint URL.
    pub url: String,
    pub bearer_token: Option<String>,
    pub api_key: Option<String>,
    pub api_key_header: String,
    /// Extra headers attached to every request.
    pub headers: Vec<(String, String)>,
    /// Injected as the first message of fresh conversations.
    pub system_prompt: Option<String>,
    /// Stable id for user messages; generated per message when absent.
    pub user_id: Option<String>,
    /// Log every event at debug level as it passes through the pipeline.
    pub debug: bool,
    /// Executors for tools the agent may call.  When absent, all tool calls
    /// are forwarded to the host untouched.
    pub tool_registry: Option<Arc<ToolRegistry>>,
    /// Free-form context entries sent with every run.
    pub context: Vec<Context>,
    /// Arbitrary JSON forwarded verbatim in every run descriptor.
    pub forwarded_props: Value,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Stateful mode only: history cap per thread.  Oldest non-system
    /// messages are trimmed first.
    pub max_history_length: usize,
}

impl AgentConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bearer_token: None,
            api_key: None,
            api_key_header: "X-API-Key".into(),
            headers: Vec::new(),
            system_prompt: None,
            user_id: None,
            debug: false,
            tool_registry: None,
            context: Vec::new(),
            forwarded_props: Value::Object(Map::new()),
            request_timeout: Duration::from_secs(600),
            connect_timeout: Duration::from_secs(30),
            max_history_length: 100,
        }
    }

    pub(crate) fn transport_config(&self) -> HttpTransportConfig {
        let mut config = HttpTransportConfig::new(self.url.clone());
        config.headers = self.headers.clone();
        config.bearer_token = self.bearer_token.clone();
        config.api_key = self.api_key.clone();
        config.api_key_header = self.api_key_header.clone();
        config.request_timeout = self.request_timeout;
        config.connect_timeout = self.connect_timeout;
        config.read_timeout = self.request_timeout;
        config
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_contract() {
        let c = AgentConfig::new("http://localhost:8000/agent");
        assert_eq!(c.api_key_header, "X-API-Key");
        assert_eq!(c.request_timeout, Duration::from_secs(600));
        assert_eq!(c.connect_timeout, Duration::from_secs(30));
        assert_eq!(c.max_history_length, 100);
        assert!(!c.debug);
        assert!(c.context.is_empty());
        // Default forwarded_props is an empty object so the server always
        // sees the field, not null.
        assert_eq!(c.forwarded_props, serde_json::json!({}));
    }

    #[test]
    fn transport_config_carries_auth_and_headers() {
        let mut c = AgentConfig::new("http://example.test/agent");
        c.bearer_token = Some("tok".into());
        c.headers.push(("X-Trace".into(), "1".into()));
        let tc = c.transport_config();
        assert_eq!(tc.url, "http://example.test/agent");
        assert_eq!(tc.bearer_token.as_deref(), Some("tok"));
        assert_eq!(tc.headers.len(), 1);
        assert_eq!(tc.read_timeout, c.request_timeout);
    }
}
