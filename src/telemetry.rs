//! Telemetry metric name constants.
//!
//! Centralised metric names for switchyard operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `switchyard_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider`: adapter name (e.g. "openai", "jina", "toolbox")
//! - `operation`: capability invoked (e.g. "complete", "embed", "rerank")
//! - `status`: outcome: "ok" or "error"
//! - `direction`: token direction: "input" or "output"

/// Total calls dispatched through an observed provider.
///
/// Labels: `provider`, `operation`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "switchyard_requests_total";

/// Call duration in seconds.
///
/// Labels: `provider`, `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "switchyard_request_duration_seconds";

/// Total retry attempts (not counting the initial call).
///
/// Labels: `provider`, `operation`.
pub const RETRIES_TOTAL: &str = "switchyard_retries_total";

/// Total tokens reported by vendors.
///
/// Labels: `provider`, `direction` ("input" | "output").
pub const TOKENS_TOTAL: &str = "switchyard_tokens_total";

/// Total tool executions performed by the orchestrator.
///
/// Labels: `tool`, `status` ("ok" | "error").
pub const TOOL_CALLS_TOTAL: &str = "switchyard_tool_calls_total";

/// Total calls that had to wait for a rate-limit permit.
///
/// Labels: `provider`.
pub const RATE_LIMIT_WAITS_TOTAL: &str = "switchyard_rate_limit_waits_total";
