// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Monotonic-timestamp id source.
///
/// Ids are `<prefix>-<millis>` where the numeric part is strictly
/// increasing across calls, even when the wall clock stalls within one
/// millisecond or steps backwards.
#[derive(Debug, Default)]
pub struct MonotonicIds {
    last: AtomicI64,
}

impl MonotonicIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, prefix: &str) -> String {
        let now = Utc::now().timestamp_millis();
        let prev = match self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(now.max(prev + 1))
            }) {
            Ok(prev) | Err(prev) => prev,
        };
        format!("{prefix}-{}", now.max(prev + 1))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_part(id: &str) -> i64 {
        id.rsplit('-').next().unwrap().parse().unwrap()
    }

    #[test]
    fn ids_carry_the_prefix() {
        let ids = MonotonicIds::new();
        assert!(ids.next("thread").starts_with("thread-"));
        assert!(ids.next("run").starts_with("run-"));
    }

    #[test]
    fn ids_are_strictly_increasing() {
        let ids = MonotonicIds::new();
        let mut previous = 0;
        for _ in 0..1000 {
            let current = numeric_part(&ids.next("msg"));
            assert!(current > previous, "{current} not above {previous}");
            previous = current;
        }
    }

    #[test]
    fn concurrent_callers_never_collide() {
        let ids = std::sync::Arc::new(MonotonicIds::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ids = ids.clone();
            handles.push(std::thread::spawn(move || {
                (0..200).map(|_| ids.next("m")).collect::<Vec<_>>()
            }));
        }
        let mut all: Vec<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), total, "duplicate ids were generated");
    }
}
