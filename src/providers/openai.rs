//! OpenAI-compatible client for chat completions and embeddings.
//!
//! Works against any server speaking the `/chat/completions` and
//! `/embeddings` dialect (OpenAI, Azure-style proxies, vLLM, llama.cpp,
//! Ollama's compatibility layer, ...).
//! See: <https://platform.openai.com/docs/api-reference/chat>

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::http::{DEFAULT_TIMEOUT, build_client, cancellable, check_status};
use super::traits::{Completer, Embedder};
use crate::streaming::{DeltaSink, Fragment, Normalizer, VendorEvent, resolve_reason};
use crate::types::{
    CompleteOptions, Completion, Embedding, File, FinishReason, Message, ResponseFormat, Role,
    ToolCall, ToolDefinition, Usage,
};
use crate::{Result, SwitchyardError};

/// Default base URL for the OpenAI API
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Connection to one OpenAI-compatible endpoint.
///
/// Cheap to clone; hand out per-model [`OpenAiCompleter`]s and
/// [`OpenAiEmbedder`]s from a single client.
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    /// Client for the public OpenAI API.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self::with_base_url(DEFAULT_BASE_URL)?.with_api_key(api_key))
    }

    /// Client for a custom base URL (self-hosted servers, wiremock).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = (!key.is_empty()).then_some(key);
        self
    }

    pub fn completer(&self, model: impl Into<String>) -> OpenAiCompleter {
        OpenAiCompleter {
            client: self.clone(),
            model: model.into(),
        }
    }

    pub fn embedder(&self, model: impl Into<String>) -> OpenAiEmbedder {
        OpenAiEmbedder {
            client: self.clone(),
            model: model.into(),
        }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let request = self.http.post(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

// ============================================================================
// Completer
// ============================================================================

/// Chat completions for one model.
pub struct OpenAiCompleter {
    client: OpenAiClient,
    model: String,
}

impl OpenAiCompleter {
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn blocking(&self, messages: &[Message], options: &CompleteOptions) -> Result<Completion> {
        let request = chat_request(&self.model, messages, options, false);
        let response = self
            .client
            .post("/chat/completions")
            .json(&request)
            .send()
            .await?;
        let response: ChatResponse = check_status(response, &self.model).await?.json().await?;

        let usage = response.usage.map(Usage::from);
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(SwitchyardError::EmptyResponse)?;

        let calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .into_iter()
            .enumerate()
            .map(|(index, call)| {
                let id = if call.id.is_empty() {
                    format!("call_{index}")
                } else {
                    call.id
                };
                let arguments = if call.function.arguments.trim().is_empty() {
                    "{}".to_string()
                } else {
                    call.function.arguments
                };
                ToolCall::new(id, call.function.name, arguments)
            })
            .collect();

        let reason = resolve_reason(
            choice.finish_reason.as_deref().and_then(finish_reason),
            !calls.is_empty(),
        );

        Ok(Completion {
            id: response.id,
            reason: Some(reason),
            message: Message::assistant_with_tool_calls(
                choice.message.content.unwrap_or_default(),
                calls,
            ),
            usage,
        })
    }

    async fn streaming(
        &self,
        messages: &[Message],
        options: &CompleteOptions,
        sink: &DeltaSink,
    ) -> Result<Completion> {
        let request = chat_request(&self.model, messages, options, true);
        let response = self
            .client
            .post("/chat/completions")
            .json(&request)
            .send()
            .await?;
        let response = check_status(response, &self.model).await?;

        let mut events = response.bytes_stream().eventsource();
        let mut normalizer = Normalizer::new("", Some(sink.clone()));

        while let Some(event) = events.next().await {
            let event = event.map_err(|e| SwitchyardError::Stream(e.to_string()))?;
            let data = event.data.trim();
            if data == "[DONE]" {
                normalizer.apply(VendorEvent::Stop(None)).await?;
                break;
            }
            if data.is_empty() {
                continue;
            }

            let chunk: ChatChunk = serde_json::from_str(data).map_err(|e| {
                debug!(error = %e, data, "unparseable SSE chunk");
                SwitchyardError::Stream(format!("invalid chunk: {e}"))
            })?;
            for event in chunk_events(chunk) {
                normalizer.apply(event).await?;
            }
        }

        normalizer.finish().await
    }
}

#[async_trait]
impl Completer for OpenAiCompleter {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(
        name = "openai.complete",
        skip_all,
        fields(model = %self.model, stream = options.stream.is_some())
    )]
    async fn complete(&self, messages: &[Message], options: CompleteOptions) -> Result<Completion> {
        if messages.is_empty() {
            return Err(SwitchyardError::InvalidInput("no messages".to_string()));
        }

        let call = async {
            match &options.stream {
                Some(sink) => self.streaming(messages, &options, sink).await,
                None => self.blocking(messages, &options).await,
            }
        };
        cancellable(&options.cancel, call).await
    }
}

// ============================================================================
// Embedder
// ============================================================================

/// Embeddings for one model.
pub struct OpenAiEmbedder {
    client: OpenAiClient,
    model: String,
}

impl OpenAiEmbedder {
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai"
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or(SwitchyardError::EmptyResponse)
    }

    #[instrument(name = "openai.embed", skip_all, fields(model = %self.model, batch_size = texts.len()))]
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let response = self
            .client
            .post("/embeddings")
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;
        let response: EmbeddingResponse =
            check_status(response, &self.model).await?.json().await?;

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        if data.is_empty() && !texts.is_empty() {
            return Err(SwitchyardError::EmptyResponse);
        }

        let model = if response.model.is_empty() {
            self.model.clone()
        } else {
            response.model
        };
        Ok(data
            .into_iter()
            .map(|d| Embedding::new(d.embedding, model.clone()))
            .collect())
    }
}

// ============================================================================
// Request conversion
// ============================================================================

fn chat_request<'a>(
    model: &'a str,
    messages: &[Message],
    options: &'a CompleteOptions,
    stream: bool,
) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: messages.iter().map(wire_message).collect(),
        tools: options.tools.iter().map(wire_tool).collect(),
        stop: &options.stop,
        max_tokens: options.max_tokens,
        temperature: options.temperature,
        response_format: options.format.as_ref().map(response_format),
        reasoning_effort: options.effort.map(|e| e.as_str()),
        stream,
        stream_options: stream.then_some(StreamOptions {
            include_usage: true,
        }),
    }
}

fn wire_message(message: &Message) -> WireMessage {
    let content = if message.files.is_empty() {
        if message.content.is_empty() && !message.tool_calls.is_empty() {
            Value::Null
        } else {
            Value::String(message.content.clone())
        }
    } else {
        let mut parts = vec![json!({"type": "text", "text": message.content})];
        parts.extend(message.files.iter().map(|file| {
            json!({
                "type": "image_url",
                "image_url": {"url": data_url(file)},
            })
        }));
        Value::Array(parts)
    };

    WireMessage {
        role: message.role.as_str(),
        content,
        tool_call_id: match &message.role {
            Role::Tool { tool_call_id } => Some(tool_call_id.clone()),
            _ => None,
        },
        tool_calls: message
            .tool_calls
            .iter()
            .map(|call| WireToolCall {
                id: call.id.clone(),
                kind: "function",
                function: WireFunctionCall {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                },
            })
            .collect(),
    }
}

fn wire_tool(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        },
    })
}

fn response_format(format: &ResponseFormat) -> Value {
    match format {
        ResponseFormat::Text => json!({"type": "text"}),
        ResponseFormat::JsonObject => json!({"type": "json_object"}),
        ResponseFormat::JsonSchema(schema) => json!({
            "type": "json_schema",
            "json_schema": {
                "name": schema.name,
                "description": schema.description,
                "strict": schema.strict,
                "schema": schema.schema,
            },
        }),
    }
}

/// `data:` URL for an attached file.
fn data_url(file: &File) -> String {
    let content_type = file
        .content_type
        .as_deref()
        .unwrap_or_else(|| sniff_content_type(&file.content));
    format!("data:{content_type};base64,{}", STANDARD.encode(&file.content))
}

/// Best-effort MIME detection for files attached without a content type.
fn sniff_content_type(data: &[u8]) -> &'static str {
    match data {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        [b'%', b'P', b'D', b'F', ..] => "application/pdf",
        _ => "application/octet-stream",
    }
}

fn finish_reason(value: &str) -> Option<FinishReason> {
    match value {
        "stop" => Some(FinishReason::Stop),
        "length" => Some(FinishReason::Length),
        "tool_calls" | "function_call" => Some(FinishReason::ToolCalls),
        "content_filter" => Some(FinishReason::ContentFilter),
        _ => None,
    }
}

/// Decode one streamed chunk into vendor events, in wire order.
fn chunk_events(chunk: ChatChunk) -> Vec<VendorEvent> {
    let mut events = Vec::new();
    if !chunk.id.is_empty() {
        events.push(VendorEvent::Start { id: chunk.id });
    }

    if let Some(choice) = chunk.choices.into_iter().next() {
        if let Some(content) = choice.delta.content
            && !content.is_empty()
        {
            events.push(VendorEvent::Delta(Fragment::Content(content)));
        }
        for call in choice.delta.tool_calls {
            let (name, arguments) = match call.function {
                Some(f) => (f.name, f.arguments.unwrap_or_default()),
                None => (None, String::new()),
            };
            events.push(VendorEvent::Delta(Fragment::ToolCall {
                index: call.index,
                id: call.id,
                name,
                arguments,
            }));
        }
        if let Some(reason) = choice.finish_reason {
            events.push(VendorEvent::Stop(finish_reason(&reason)));
        }
    }

    if let Some(usage) = chunk.usage {
        events.push(VendorEvent::Metadata(usage.into()));
    }
    events
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<&'static str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Serialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionCall,
}

#[derive(Serialize, Deserialize)]
struct WireFunctionCall {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    choices: Vec<ResponseChoice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ResponseToolCall>,
}

#[derive(Deserialize)]
struct ResponseToolCall {
    #[serde(default)]
    id: String,
    function: WireFunctionCall,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl From<WireUsage> for Usage {
    fn from(usage: WireUsage) -> Self {
        Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }
    }
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    id: String,
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    finish_reason: Option<String>,
}

#[derive(Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChunkToolCall>,
}

#[derive(Deserialize)]
struct ChunkToolCall {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<ChunkFunction>,
}

#[derive(Deserialize)]
struct ChunkFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    model: String,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ReasoningEffort, Schema};

    #[test]
    fn test_request_serialization() {
        let messages = vec![
            Message::system("be brief"),
            Message::assistant_with_tool_calls("", vec![ToolCall::new("c1", "echo", "{}")]),
            Message::tool_result("c1", "\"ok\""),
        ];
        let options = CompleteOptions::new()
            .max_tokens(64)
            .effort(ReasoningEffort::Low)
            .format(ResponseFormat::JsonSchema(Schema::new(
                "answer",
                json!({"type": "object"}),
            )))
            .tools(vec![ToolDefinition::new("echo", "Echo", json!({"type": "object"}))]);

        let body = serde_json::to_value(chat_request("gpt-4o", &messages, &options, true)).unwrap();

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["reasoning_effort"], "low");
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "answer");
        assert_eq!(body["tools"][0]["function"]["name"], "echo");
        assert!(body.get("stop").is_none());
        assert!(body.get("temperature").is_none());

        assert!(body["messages"][1]["content"].is_null());
        assert_eq!(body["messages"][1]["tool_calls"][0]["type"], "function");
        assert_eq!(body["messages"][2]["role"], "tool");
        assert_eq!(body["messages"][2]["tool_call_id"], "c1");
    }

    #[test]
    fn test_blocking_request_omits_stream_fields() {
        let options = CompleteOptions::new();
        let body =
            serde_json::to_value(chat_request("m", &[Message::user("hi")], &options, false)).unwrap();
        assert!(body.get("stream").is_none());
        assert!(body.get("stream_options").is_none());
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_files_become_data_urls() {
        let png = File::new(vec![0x89, b'P', b'N', b'G', 0, 0]);
        let message = Message::user("what is this?").with_file(png);

        let wire = serde_json::to_value(wire_message(&message)).unwrap();
        let parts = wire["content"].as_array().unwrap();
        assert_eq!(parts[0]["text"], "what is this?");
        let url = parts[1]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(finish_reason("stop"), Some(FinishReason::Stop));
        assert_eq!(finish_reason("tool_calls"), Some(FinishReason::ToolCalls));
        assert_eq!(finish_reason("content_filter"), Some(FinishReason::ContentFilter));
        assert_eq!(finish_reason(""), None);
    }

    #[test]
    fn test_chunk_events() {
        let chunk: ChatChunk = serde_json::from_str(
            r#"{"id":"x","choices":[{"delta":{"tool_calls":[{"index":0,"id":"c","function":{"name":"f","arguments":"{"}}]},"finish_reason":"tool_calls"}]}"#,
        )
        .unwrap();
        let events = chunk_events(chunk);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], VendorEvent::Start { id: "x".into() });
        assert_eq!(events[2], VendorEvent::Stop(Some(FinishReason::ToolCalls)));

        let usage_only: ChatChunk =
            serde_json::from_str(r#"{"id":"x","choices":[],"usage":{"prompt_tokens":5,"completion_tokens":2}}"#)
                .unwrap();
        let events = chunk_events(usage_only);
        assert_eq!(
            events.last(),
            Some(&VendorEvent::Metadata(Usage {
                input_tokens: 5,
                output_tokens: 2
            }))
        );
    }
}
