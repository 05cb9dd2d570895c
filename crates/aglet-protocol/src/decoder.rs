// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use futures::{Stream, StreamExt};
use tracing::warn;

use aglet_types::Event;

use crate::error::DecodeError;

/// Decode one complete JSON record into a typed event.
///
/// Exposed as a free function so it can be unit-tested without a stream.
pub fn decode_record(record: &str) -> Result<Event, DecodeError> {
    Ok(serde_json::from_str(record)?)
}

/// Turn a stream of complete JSON records into a stream of typed events.
///
/// A record that fails to decode — invalid JSON or an unknown `type`
/// discriminator — is logged and skipped; the stream continues with the next
/// record.  Transport errors pass through unchanged.  The adapter holds no
/// state across records: framing is the transport's responsibility.
pub fn decode_stream<S>(records: S) -> impl Stream<Item = anyhow::Result<Event>> + Send
where
    S: Stream<Item = anyhow::Result<String>> + Send,
{
    records.filter_map(|record| async move {
        match record {
            Ok(text) => match decode_record(&text) {
                Ok(event) => Some(Ok(event)),
                Err(e) => {
                    warn!(error = %e, record = %text, "skipping undecodable event record");
                    None
                }
            },
            Err(e) => Some(Err(e)),
        }
    })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use futures::{stream, StreamExt};

    use aglet_types::EventType;

    use super::*;

    #[test]
    fn decode_record_parses_valid_event() {
        let ev =
            decode_record(r#"{"type":"RUN_STARTED","thread_id":"t1","run_id":"r1"}"#).unwrap();
        assert_eq!(ev.event_type(), EventType::RunStarted);
    }

    #[test]
    fn decode_record_rejects_invalid_json() {
        assert!(decode_record("{not json").is_err());
    }

    #[test]
    fn decode_record_rejects_unknown_discriminator() {
        assert!(decode_record(r#"{"type":"BRAND_NEW_EVENT"}"#).is_err());
    }

    #[tokio::test]
    async fn bad_record_is_dropped_and_stream_continues() {
        let records = stream::iter(vec![
            Ok(r#"{"type":"RUN_STARTED","thread_id":"t","run_id":"r"}"#.to_string()),
            Ok(r#"{"type":"NOT_A_THING"}"#.to_string()),
            Ok("garbage".to_string()),
            Ok(r#"{"type":"RUN_FINISHED","thread_id":"t","run_id":"r"}"#.to_string()),
        ]);
        let events: Vec<_> = decode_stream(records).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].as_ref().unwrap().event_type(),
            EventType::RunStarted
        );
        assert_eq!(
            events[1].as_ref().unwrap().event_type(),
            EventType::RunFinished
        );
    }

    #[tokio::test]
    async fn transport_errors_pass_through() {
        let records = stream::iter(vec![
            Ok(r#"{"type":"RUN_STARTED","thread_id":"t","run_id":"r"}"#.to_string()),
            Err(anyhow::anyhow!("connection reset")),
        ]);
        let events: Vec<_> = decode_stream(records).collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[1].is_err());
    }
}
