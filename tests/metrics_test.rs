//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::{Map, Value, json};

use switchyard::providers::{Observed, RetryConfig, Retrying};
use switchyard::telemetry;
use switchyard::types::{CompleteOptions, Completion, FinishReason, Message, ToolCall, Usage};
use switchyard::{Completer, Result, SwitchyardError, Tool, Toolbox};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock providers
// ============================================================================

struct MockCompleter;

#[async_trait]
impl Completer for MockCompleter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, _messages: &[Message], _options: CompleteOptions) -> Result<Completion> {
        Ok(Completion {
            reason: Some(FinishReason::Stop),
            usage: Some(Usage {
                input_tokens: 10,
                output_tokens: 4,
            }),
            ..Completion::content_delta("m1", "ok")
        })
    }
}

struct FailingCompleter {
    calls: AtomicU32,
}

#[async_trait]
impl Completer for FailingCompleter {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _messages: &[Message], _options: CompleteOptions) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SwitchyardError::Http("connection refused".into()))
    }
}

/// Asks for `echo` once, then answers.
struct ToolOnce {
    calls: AtomicU32,
}

#[async_trait]
impl Completer for ToolOnce {
    fn name(&self) -> &str {
        "tool-once"
    }

    async fn complete(&self, _messages: &[Message], _options: CompleteOptions) -> Result<Completion> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(Completion {
                id: "t1".into(),
                reason: Some(FinishReason::ToolCalls),
                message: Message::assistant_with_tool_calls(
                    "",
                    vec![ToolCall::new("c1", "echo", "{}")],
                ),
                usage: None,
            })
        } else {
            Ok(Completion {
                reason: Some(FinishReason::Stop),
                ..Completion::content_delta("t2", "done")
            })
        }
    }
}

struct Echo;

#[async_trait]
impl Tool for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "echo"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object"})
    }

    async fn execute(
        &self,
        _arguments: Map<String, Value>,
        _cancel: &CancellationToken,
    ) -> Result<Value> {
        Ok(json!("pong"))
    }
}

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    counter_matching(snapshot, name, |_| true)
}

/// Sum counter values of `name` carrying `label = value`.
fn counter_with_label(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    counter_matching(snapshot, name, |key| {
        key.key()
            .labels()
            .any(|l| l.key() == label && l.value() == value)
    })
}

fn counter_matching(
    snapshot: &SnapshotVec,
    name: &str,
    keep: impl Fn(&metrics_util::CompositeKey) -> bool,
) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter && key.key().name() == name && keep(key)
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Check if any histogram entries exist for a given metric name.
fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

/// Runs async code within a local recorder scope on the multi-thread runtime.
///
/// `block_in_place` ensures the sync `with_local_recorder` closure stays
/// on the current thread while `block_on` drives the inner async work.
fn recorded<T>(fut: impl Future<Output = T>) -> (T, Snapshotter) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let output = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
    });
    (output, snapshotter)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn successful_request_records_metrics() {
    let observed = Observed::new(Arc::new(MockCompleter), "mock", "m");

    let (result, snapshotter) = recorded(async {
        observed
            .complete(&[Message::user("hi")], CompleteOptions::default())
            .await
    });
    assert!(result.is_ok());

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_with_label(&snapshot, telemetry::REQUESTS_TOTAL, "status", "ok"),
        1
    );
    assert!(
        has_histogram(&snapshot, telemetry::REQUEST_DURATION_SECONDS),
        "expected a duration histogram entry"
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::TOKENS_TOTAL, "direction", "input"),
        10
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::TOKENS_TOTAL, "direction", "output"),
        4
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn failed_request_records_error_metrics() {
    let observed = Observed::new(
        Arc::new(FailingCompleter {
            calls: AtomicU32::new(0),
        }),
        "failing",
        "m",
    );

    let (result, snapshotter) = recorded(async {
        observed
            .complete(&[Message::user("hi")], CompleteOptions::default())
            .await
    });
    assert!(result.is_err());

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::REQUESTS_TOTAL), 1);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::REQUESTS_TOTAL, "status", "error"),
        1
    );
    assert_eq!(counter_total(&snapshot, telemetry::TOKENS_TOTAL), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn retries_are_counted_without_the_first_attempt() {
    let inner = Arc::new(FailingCompleter {
        calls: AtomicU32::new(0),
    });
    let retrying = Retrying::new(
        Arc::clone(&inner),
        RetryConfig::new()
            .max_attempts(3)
            .initial_delay(Duration::from_millis(1)),
    );

    let (result, snapshotter) = recorded(async {
        retrying
            .complete(&[Message::user("hi")], CompleteOptions::default())
            .await
    });
    assert!(result.is_err());
    assert_eq!(inner.calls.load(Ordering::SeqCst), 3);

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::RETRIES_TOTAL), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn tool_executions_are_counted() {
    let toolbox = Toolbox::new(
        Arc::new(ToolOnce {
            calls: AtomicU32::new(0),
        }),
        [Arc::new(Echo) as Arc<dyn Tool>],
    );

    let (result, snapshotter) = recorded(async {
        toolbox
            .complete(&[Message::user("hi")], CompleteOptions::default())
            .await
    });
    assert_eq!(result.unwrap().message.content, "done");

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_with_label(&snapshot, telemetry::TOOL_CALLS_TOTAL, "tool", "echo"),
        1
    );
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let observed = Observed::new(Arc::new(MockCompleter), "mock", "m");
    observed
        .complete(&[Message::user("hi")], CompleteOptions::default())
        .await
        .unwrap();
}
