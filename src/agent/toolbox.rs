//! The tool-calling loop.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::providers::Completer;
use crate::streaming::{DEFAULT_STREAM_BUFFER, DeltaSink, delta_channel};
use crate::telemetry;
use crate::tool::Tool;
use crate::types::{CompleteOptions, Completion, Message, ToolCall, ToolDefinition};
use crate::{Result, SwitchyardError};

/// Round cap applied when none is configured.
pub const DEFAULT_MAX_ROUNDS: usize = 25;

/// Settings of a [`Toolbox`].
#[derive(Debug, Clone)]
pub struct ToolboxConfig {
    /// Maximum number of dispatches per call before giving up with
    /// [`SwitchyardError::TooManyRounds`].
    pub max_rounds: usize,
    /// Temperature used when the caller leaves it unset.
    pub temperature: Option<f32>,
    /// Messages placed before the caller's history, typically a system
    /// prompt.
    pub messages: Vec<Message>,
}

impl Default for ToolboxConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            temperature: None,
            messages: Vec::new(),
        }
    }
}

/// A completer that runs tools on the model's behalf.
///
/// Each call dispatches the wrapped completer with the merged tool list.
/// When the model asks for tools, the assistant turn and one tool message
/// per executed call are appended to a private copy of the history and the
/// completer is dispatched again. The loop ends with the first round that
/// does not ask for a known tool, and that round's completion is returned
/// unchanged. A streaming caller receives only that round's deltas.
///
/// Calls naming a tool this toolbox does not own are skipped without error;
/// the caller may have advertised them and will see them in the result.
pub struct Toolbox {
    name: String,
    completer: Arc<dyn Completer>,
    tools: BTreeMap<String, Arc<dyn Tool>>,
    config: ToolboxConfig,
}

impl Toolbox {
    pub fn new(completer: Arc<dyn Completer>, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        Self {
            name: "toolbox".to_string(),
            completer,
            tools: tools
                .into_iter()
                .map(|tool| (tool.name().to_string(), tool))
                .collect(),
            config: ToolboxConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ToolboxConfig) -> Self {
        self.config = config;
        self
    }

    /// Name reported through [`Completer::name`].
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn config(&self) -> &ToolboxConfig {
        &self.config
    }

    /// Own tool definitions overlaid with the caller's; the caller's
    /// definition wins when names collide.
    fn merged_tools(&self, caller: &[ToolDefinition]) -> Vec<ToolDefinition> {
        let mut merged: BTreeMap<String, ToolDefinition> = self
            .tools
            .values()
            .map(|tool| (tool.name().to_string(), tool.definition()))
            .collect();
        for def in caller {
            merged.insert(def.name.clone(), def.clone());
        }
        merged.into_values().collect()
    }

    fn has_known_call(&self, completion: &Completion) -> bool {
        completion
            .message
            .tool_calls
            .iter()
            .any(|call| self.tools.contains_key(&call.name))
    }

    /// One call to the wrapped completer.
    ///
    /// With a caller sink, the round's deltas are held back and forwarded
    /// only when this round ends the loop, so the caller sees exactly the
    /// deltas of the completion that is returned.
    async fn dispatch(
        &self,
        history: &[Message],
        options: &CompleteOptions,
        sink: Option<&DeltaSink>,
    ) -> Result<Completion> {
        let Some(sink) = sink else {
            return self.completer.complete(history, options.clone()).await;
        };

        let (inner, mut rx) = delta_channel(DEFAULT_STREAM_BUFFER);
        let call = self.completer.complete(history, options.clone().stream(inner));

        let collect = async move {
            let mut held = Vec::new();
            while let Some(delta) = rx.recv().await {
                held.push(delta);
            }
            held
        };

        let (completion, held) = tokio::join!(call, collect);
        let completion = completion?;

        if self.is_terminal_round(&completion) {
            for delta in held {
                sink.send(delta).await?;
            }
        } else {
            debug!(held = held.len(), "dropping deltas of a tool round");
        }
        Ok(completion)
    }

    fn is_terminal_round(&self, completion: &Completion) -> bool {
        !completion.wants_tools() || !self.has_known_call(completion)
    }

    /// Execute every known call of one round, appending a tool message per
    /// call. Arguments of all known calls are validated before any runs.
    async fn run_tools(
        &self,
        calls: &[ToolCall],
        cancel: &CancellationToken,
        history: &mut Vec<Message>,
    ) -> Result<()> {
        let mut pending = Vec::new();
        for call in calls {
            let Some(tool) = self.tools.get(&call.name) else {
                debug!(tool = %call.name, id = %call.id, "skipping call to unknown tool");
                continue;
            };
            pending.push((call, tool, parse_arguments(call)?));
        }

        for (call, tool, arguments) in pending {
            debug!(tool = %call.name, id = %call.id, "executing tool");
            // the tool sees the token first; one that ignores it is dropped
            let result = tokio::select! {
                biased;
                result = tool.execute(arguments, cancel) => result,
                _ = cancel.cancelled() => Err(SwitchyardError::Cancelled),
            };

            let status = if result.is_ok() { "ok" } else { "error" };
            metrics::counter!(
                telemetry::TOOL_CALLS_TOTAL,
                "tool" => call.name.clone(),
                "status" => status
            )
            .increment(1);

            let value = result.map_err(|e| {
                warn!(tool = %call.name, error = %e, "tool execution failed");
                match e {
                    kept @ (SwitchyardError::Cancelled | SwitchyardError::Tool { .. }) => kept,
                    other => SwitchyardError::Tool {
                        name: call.name.clone(),
                        message: other.to_string(),
                    },
                }
            })?;

            history.push(Message::tool_result(
                call.id.clone(),
                serde_json::to_string(&value)?,
            ));
        }
        Ok(())
    }
}

/// Parse a call's arguments into a JSON object. Empty arguments mean `{}`.
fn parse_arguments(call: &ToolCall) -> Result<Map<String, Value>> {
    if call.arguments.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<Value>(&call.arguments) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(SwitchyardError::InvalidToolArguments {
            name: call.name.clone(),
            message: format!("expected a JSON object, got {other}"),
        }),
        Err(e) => Err(SwitchyardError::InvalidToolArguments {
            name: call.name.clone(),
            message: e.to_string(),
        }),
    }
}

#[async_trait]
impl Completer for Toolbox {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "toolbox.complete",
        skip_all,
        fields(toolbox = %self.name, completer = %self.completer.name())
    )]
    async fn complete(
        &self,
        messages: &[Message],
        mut options: CompleteOptions,
    ) -> Result<Completion> {
        let sink = options.stream.take();
        let cancel = options.cancel.clone();

        options.tools = self.merged_tools(&options.tools);
        if options.temperature.is_none() {
            options.temperature = self.config.temperature;
        }

        let mut history: Vec<Message> = self
            .config
            .messages
            .iter()
            .chain(messages)
            .cloned()
            .collect();

        for round in 1..=self.config.max_rounds {
            if cancel.is_cancelled() {
                return Err(SwitchyardError::Cancelled);
            }

            debug!(round, messages = history.len(), "dispatching");
            let completion = self.dispatch(&history, &options, sink.as_ref()).await?;

            if self.is_terminal_round(&completion) {
                debug!(round, reason = ?completion.reason, "toolbox finished");
                return Ok(completion);
            }

            history.push(Message::assistant_with_tool_calls(
                completion.message.content.clone(),
                completion.message.tool_calls.clone(),
            ));
            self.run_tools(&completion.message.tool_calls, &cancel, &mut history)
                .await?;
        }

        warn!(limit = self.config.max_rounds, "toolbox exceeded its round cap");
        Err(SwitchyardError::TooManyRounds {
            limit: self.config.max_rounds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Noop(&'static str);

    #[async_trait]
    impl Tool for Noop {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "own"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(
            &self,
            _arguments: Map<String, Value>,
            _cancel: &CancellationToken,
        ) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    struct Never;

    #[async_trait]
    impl Completer for Never {
        fn name(&self) -> &str {
            "never"
        }

        async fn complete(&self, _: &[Message], _: CompleteOptions) -> Result<Completion> {
            Err(SwitchyardError::NotImplemented("complete"))
        }
    }

    #[test]
    fn caller_definition_wins_on_collision() {
        let toolbox = Toolbox::new(
            Arc::new(Never),
            [Arc::new(Noop("search")) as Arc<dyn Tool>, Arc::new(Noop("clock"))],
        );
        let caller = ToolDefinition::new("search", "caller", json!({}));

        let merged = toolbox.merged_tools(&[caller]);
        assert_eq!(merged.len(), 2);
        let search = merged.iter().find(|d| d.name == "search").unwrap();
        assert_eq!(search.description, "caller");
    }

    #[test]
    fn parse_arguments_rules() {
        let empty = ToolCall::new("1", "t", "  ");
        assert!(parse_arguments(&empty).unwrap().is_empty());

        let object = ToolCall::new("1", "t", r#"{"x":"hi"}"#);
        assert_eq!(parse_arguments(&object).unwrap()["x"], "hi");

        let array = ToolCall::new("1", "t", "[1]");
        assert!(matches!(
            parse_arguments(&array),
            Err(SwitchyardError::InvalidToolArguments { .. })
        ));

        let garbage = ToolCall::new("1", "t", "not-json");
        assert!(matches!(
            parse_arguments(&garbage),
            Err(SwitchyardError::InvalidToolArguments { .. })
        ));
    }

    #[test]
    fn default_config() {
        let config = ToolboxConfig::default();
        assert_eq!(config.max_rounds, DEFAULT_MAX_ROUNDS);
        assert!(config.temperature.is_none());
    }
}
