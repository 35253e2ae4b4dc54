//! Match dispatch with history-backed idempotency.
//!
//! A scan may see the same candidate many times across runs. The
//! dispatcher consults the history store before emitting anything, so a
//! (rule, candidate) pair fires its actions exactly once no matter how
//! often it is rescanned. History identity is `(rule id, source,
//! candidate id)`; the source is part of the key because candidate ids
//! are only unique within one source.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::rules::{Action, Rule};
use crate::types::Candidate;

/// Append-only record of which (rule, candidate) pairs already fired.
///
/// Implementations absorb their own storage failures; the dispatcher
/// treats answers as authoritative and never retries.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// True when this rule has already fired for this candidate.
    async fn has_match(&self, rule_id: Uuid, source: &str, candidate_id: &str) -> bool;

    /// Records that the rule fired for the candidate. Recording an
    /// existing pair must be a no-op so concurrent dispatches of the
    /// same pair stay safe.
    async fn record_match(&self, rule_id: Uuid, source: &str, candidate_id: &str);
}

/// Receives triggered actions.
///
/// The handoff is synchronous and fire-and-forget: the dispatcher never
/// awaits completion and never retries on the executor's behalf. A
/// typical implementation pushes into a channel consumed elsewhere.
pub trait ActionExecutor: Send + Sync {
    fn submit(&self, action: Action);
}

/// In-memory [`HistoryStore`].
///
/// Suitable for tests and single-process hosts; a persistent store can
/// replace it without touching dispatch logic.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    seen: Mutex<HashSet<(Uuid, String, String)>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded matches.
    pub async fn len(&self) -> usize {
        self.seen.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.seen.lock().await.is_empty()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn has_match(&self, rule_id: Uuid, source: &str, candidate_id: &str) -> bool {
        self.seen
            .lock()
            .await
            .contains(&(rule_id, source.to_string(), candidate_id.to_string()))
    }

    async fn record_match(&self, rule_id: Uuid, source: &str, candidate_id: &str) {
        self.seen
            .lock()
            .await
            .insert((rule_id, source.to_string(), candidate_id.to_string()));
    }
}

/// Dispatches matched (rule, candidate) pairs, each at most once ever.
///
/// Pairs are processed in the given order, which follows rule priority
/// when they come from `evaluate_all`. A pair already in the history is
/// suppressed. A new pair is recorded first, then its rule's actions
/// are handed to the executor and collected into the returned list.
pub async fn dispatch(
    matches: &[(&Rule, &Candidate)],
    history: &dyn HistoryStore,
    executor: &dyn ActionExecutor,
) -> Vec<Action> {
    let mut emitted = Vec::new();
    for (rule, candidate) in matches {
        if history
            .has_match(rule.id, &candidate.source, &candidate.id)
            .await
        {
            tracing::debug!(
                rule = %rule.name,
                source = %candidate.source,
                candidate = %candidate.id,
                "match already dispatched, suppressing"
            );
            continue;
        }
        history
            .record_match(rule.id, &candidate.source, &candidate.id)
            .await;
        tracing::info!(
            rule = %rule.name,
            source = %candidate.source,
            candidate = %candidate.id,
            actions = rule.actions.len(),
            "rule matched, dispatching actions"
        );
        for action in &rule.actions {
            executor.submit(action.clone());
            emitted.push(action.clone());
        }
    }
    emitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ConditionOperator;
    use serde_json::json;

    struct CollectingExecutor {
        submitted: std::sync::Mutex<Vec<Action>>,
    }

    impl CollectingExecutor {
        fn new() -> Self {
            Self {
                submitted: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn submitted(&self) -> Vec<Action> {
            self.submitted.lock().unwrap().clone()
        }
    }

    impl ActionExecutor for CollectingExecutor {
        fn submit(&self, action: Action) {
            self.submitted.lock().unwrap().push(action);
        }
    }

    fn download_rule(name: &str) -> Rule {
        Rule::new(name)
            .with_condition("type", ConditionOperator::Equals, json!("movie"))
            .with_action("download", json!({ "dir": "/media" }))
    }

    #[tokio::test]
    async fn dispatch_emits_actions_for_new_pairs() {
        let rule = download_rule("movies");
        let candidate = Candidate::new("tmdb", "tm-1", "流浪地球");
        let history = MemoryHistory::new();
        let executor = CollectingExecutor::new();

        let emitted = dispatch(&[(&rule, &candidate)], &history, &executor).await;

        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].kind, "download");
        assert_eq!(executor.submitted().len(), 1);
        assert_eq!(history.len().await, 1);
    }

    #[tokio::test]
    async fn repeat_dispatch_is_suppressed() {
        let rule = download_rule("movies");
        let candidate = Candidate::new("tmdb", "tm-1", "流浪地球");
        let history = MemoryHistory::new();
        let executor = CollectingExecutor::new();

        let first = dispatch(&[(&rule, &candidate)], &history, &executor).await;
        let second = dispatch(&[(&rule, &candidate)], &history, &executor).await;

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(executor.submitted().len(), 1);
    }

    #[tokio::test]
    async fn different_candidates_each_fire() {
        let rule = download_rule("movies");
        let first = Candidate::new("tmdb", "tm-1", "one");
        let second = Candidate::new("tmdb", "tm-2", "two");
        let history = MemoryHistory::new();
        let executor = CollectingExecutor::new();

        let emitted = dispatch(
            &[(&rule, &first), (&rule, &second)],
            &history,
            &executor,
        )
        .await;

        assert_eq!(emitted.len(), 2);
        assert_eq!(history.len().await, 2);
    }

    #[tokio::test]
    async fn same_id_from_different_sources_fires_separately() {
        let rule = download_rule("movies");
        let tmdb = Candidate::new("tmdb", "603", "matrix");
        let douban = Candidate::new("douban", "603", "matrix");
        let history = MemoryHistory::new();
        let executor = CollectingExecutor::new();

        let emitted = dispatch(&[(&rule, &tmdb), (&rule, &douban)], &history, &executor).await;

        assert_eq!(emitted.len(), 2);
    }

    #[tokio::test]
    async fn all_actions_of_a_rule_are_emitted_in_order() {
        let rule = Rule::new("notify and download")
            .with_action("download", json!({ "dir": "/media" }))
            .with_action("notify", json!({ "channel": "telegram" }));
        let candidate = Candidate::new("tmdb", "tm-1", "x");
        let history = MemoryHistory::new();
        let executor = CollectingExecutor::new();

        let emitted = dispatch(&[(&rule, &candidate)], &history, &executor).await;

        let kinds: Vec<&str> = emitted.iter().map(|a| a.kind.as_str()).collect();
        assert_eq!(kinds, vec!["download", "notify"]);
        assert_eq!(executor.submitted().len(), 2);
    }

    #[tokio::test]
    async fn pair_order_is_preserved() {
        let urgent = download_rule("urgent");
        let routine = download_rule("routine");
        let candidate = Candidate::new("tmdb", "tm-1", "x");
        let history = MemoryHistory::new();
        let executor = CollectingExecutor::new();

        dispatch(
            &[(&urgent, &candidate), (&routine, &candidate)],
            &history,
            &executor,
        )
        .await;

        assert_eq!(history.len().await, 2);
        assert_eq!(executor.submitted().len(), 2);
    }

    #[tokio::test]
    async fn empty_matches_dispatch_nothing() {
        let history = MemoryHistory::new();
        let executor = CollectingExecutor::new();
        let emitted = dispatch(&[], &history, &executor).await;
        assert!(emitted.is_empty());
        assert!(history.is_empty().await);
    }

    #[tokio::test]
    async fn channel_executor_handoff_works() {
        struct ChannelExecutor(tokio::sync::mpsc::UnboundedSender<Action>);

        impl ActionExecutor for ChannelExecutor {
            fn submit(&self, action: Action) {
                let _ = self.0.send(action);
            }
        }

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let rule = download_rule("movies");
        let candidate = Candidate::new("tmdb", "tm-1", "x");
        let history = MemoryHistory::new();

        dispatch(&[(&rule, &candidate)], &history, &ChannelExecutor(tx)).await;

        let received = rx.recv().await.expect("action should arrive");
        assert_eq!(received.kind, "download");
    }

    #[tokio::test]
    async fn memory_history_round_trip() {
        let history = MemoryHistory::new();
        let rule_id = Uuid::new_v4();

        assert!(!history.has_match(rule_id, "tmdb", "tm-1").await);
        history.record_match(rule_id, "tmdb", "tm-1").await;
        assert!(history.has_match(rule_id, "tmdb", "tm-1").await);

        // Re-recording is a no-op.
        history.record_match(rule_id, "tmdb", "tm-1").await;
        assert_eq!(history.len().await, 1);
    }
}
