//! Completion options and configuration types

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::tool::ToolDefinition;
use crate::streaming::DeltaSink;

/// Options for a single completion call (provider-agnostic)
///
/// Passed by value: the call owns its options, so an attached
/// [`DeltaSink`] is closed when the call returns, whatever the outcome.
/// `CompleteOptions::default()` stands for "no options"; adapters apply
/// their own defaults to unset fields.
#[derive(Debug, Clone, Default)]
pub struct CompleteOptions {
    pub stop: Vec<String>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub format: Option<ResponseFormat>,
    pub effort: Option<ReasoningEffort>,
    /// Tools advertised to the model for this call.
    pub tools: Vec<ToolDefinition>,
    /// Receives one delta per fragment when set.
    pub stream: Option<DeltaSink>,
    /// Cancels the call; adapters abort their outbound request.
    pub cancel: CancellationToken,
}

impl CompleteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }

    pub fn max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn format(mut self, format: ResponseFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn effort(mut self, effort: ReasoningEffort) -> Self {
        self.effort = Some(effort);
        self
    }

    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn stream(mut self, sink: DeltaSink) -> Self {
        self.stream = Some(sink);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Copy of these options without the delta sink.
    ///
    /// Used when a wrapper calls an inner completer that must not write to
    /// the caller's sink directly.
    pub fn without_stream(&self) -> Self {
        Self {
            stream: None,
            ..self.clone()
        }
    }
}

/// Reasoning effort hint for extended thinking models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Minimal,
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningEffort::Minimal => "minimal",
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }
}

/// Response format configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    JsonObject,
    JsonSchema(Schema),
}

/// Output schema for structured responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub strict: bool,
    pub schema: serde_json::Value,
}

impl Schema {
    pub fn new(name: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            description: None,
            strict: false,
            schema,
        }
    }
}
