// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Name of the CUSTOM event that installs a predictive-state configuration.
pub const PREDICT_STATE: &str = "PredictState";

/// One predictive-state rule: while the named tool streams its arguments,
/// the chosen field of the (parseable prefix of the) argument object is
/// spliced into state under `state_key`, giving subscribers a live preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictStateEntry {
    pub state_key: String,
    pub tool: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_argument: Option<String>,
}

/// Parse the payload of a `PredictState` CUSTOM event.
///
/// Returns an empty config (disabling prediction) when the payload does not
/// have the expected shape — a malformed config must not kill the stream.
pub fn parse_config(value: &Value) -> Vec<PredictStateEntry> {
    match serde_json::from_value(value.clone()) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "ignoring malformed PredictState configuration");
            Vec::new()
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_entry_list() {
        let entries = parse_config(&json!([
            {"state_key": "draft", "tool": "write_doc", "tool_argument": "body"},
            {"state_key": "outline", "tool": "plan"},
        ]));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].tool_argument.as_deref(), Some("body"));
        assert_eq!(entries[1].tool_argument, None);
    }

    #[test]
    fn malformed_payload_yields_empty_config() {
        assert!(parse_config(&json!({"not": "a list"})).is_empty());
        assert!(parse_config(&json!([{"tool": "missing_state_key"}])).is_empty());
    }

    #[test]
    fn entry_round_trips() {
        let entry = PredictStateEntry {
            state_key: "draft".into(),
            tool: "write_doc".into(),
            tool_argument: None,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("tool_argument"), "None must be omitted: {json}");
        let back: PredictStateEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
