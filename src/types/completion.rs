//! Completion results and streaming deltas

use super::message::Message;
use super::tool::ToolCall;
use serde::{Deserialize, Serialize};

/// Result of a completion call.
///
/// The same type carries streaming deltas: a delta's message holds only
/// the fragment produced since the previous delta, and only the terminal
/// delta has a `reason`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub id: String,
    /// Why generation stopped. `None` on non-terminal deltas and when the
    /// vendor reported nothing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FinishReason>,
    pub message: Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl Completion {
    /// An empty assistant completion, the starting point of an accumulator.
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reason: None,
            message: Message::assistant(""),
            usage: None,
        }
    }

    /// A content-only delta.
    pub fn content_delta(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            message: Message::assistant(content),
            ..Self::empty(id)
        }
    }

    /// A delta carrying one tool-call fragment.
    pub fn tool_call_delta(id: impl Into<String>, call: ToolCall) -> Self {
        Self {
            message: Message::assistant_with_tool_calls("", vec![call]),
            ..Self::empty(id)
        }
    }

    /// Whether this completion ends a stream.
    pub fn is_terminal(&self) -> bool {
        self.reason.is_some()
    }

    /// Whether the model asked for tools to run.
    pub fn wants_tools(&self) -> bool {
        self.reason == Some(FinishReason::ToolCalls)
    }
}

/// Token usage statistics. Advisory; absent when the vendor reports none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Reason the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::ContentFilter => "content_filter",
        }
    }
}
