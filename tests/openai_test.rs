//! Wiremock integration tests for the OpenAI-compatible adapter.

use std::time::Duration;

use futures_util::StreamExt;
use serde_json::json;
use switchyard::providers::OpenAiClient;
use switchyard::streaming::{DEFAULT_STREAM_BUFFER, spawn_completion};
use switchyard::types::{CompleteOptions, FinishReason, Message, ToolDefinition, Usage};
use switchyard::{Completer, Embedder, SwitchyardError};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> OpenAiClient {
    OpenAiClient::with_base_url(server.uri())
        .unwrap()
        .with_api_key("test-key")
}

/// Render chunks as an SSE body terminated by `[DONE]`.
fn sse(chunks: &[serde_json::Value]) -> String {
    let mut body: String = chunks
        .iter()
        .map(|chunk| format!("data: {chunk}\n\n"))
        .collect();
    body.push_str("data: [DONE]\n\n");
    body
}

#[tokio::test]
async fn blocking_completion_is_parsed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"model": "gpt-test", "temperature": 0.5})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Paris"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 9, "completion_tokens": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let completion = client(&server)
        .completer("gpt-test")
        .complete(
            &[Message::user("Capital of France?")],
            CompleteOptions::new().temperature(0.5),
        )
        .await
        .unwrap();

    assert_eq!(completion.id, "chatcmpl-1");
    assert_eq!(completion.message.content, "Paris");
    assert_eq!(completion.reason, Some(FinishReason::Stop));
    assert_eq!(
        completion.usage,
        Some(Usage {
            input_tokens: 9,
            output_tokens: 1
        })
    );
}

#[tokio::test]
async fn blocking_tool_calls_are_normalized() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "tools": [{"type": "function", "function": {"name": "lookup"}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-2",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "call_a", "type": "function",
                         "function": {"name": "lookup", "arguments": "{\"q\":\"rust\"}"}},
                        {"id": "", "type": "function",
                         "function": {"name": "lookup", "arguments": ""}}
                    ]
                },
                "finish_reason": "stop"
            }]
        })))
        .mount(&server)
        .await;

    let tools = vec![ToolDefinition::new(
        "lookup",
        "Look something up",
        json!({"type": "object"}),
    )];
    let completion = client(&server)
        .completer("gpt-test")
        .complete(&[Message::user("find rust")], CompleteOptions::new().tools(tools))
        .await
        .unwrap();

    // "stop" with calls present resolves to tool_calls
    assert_eq!(completion.reason, Some(FinishReason::ToolCalls));
    let calls = &completion.message.tool_calls;
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].id, "call_a");
    assert_eq!(calls[0].arguments, r#"{"q":"rust"}"#);
    assert_eq!(calls[1].id, "call_1");
    assert_eq!(calls[1].arguments, "{}");
    assert!(completion.usage.is_none());
}

#[tokio::test]
async fn streaming_completion_emits_deltas() {
    let server = MockServer::start().await;

    let body = sse(&[
        json!({"id": "s1", "choices": [{"delta": {"role": "assistant", "content": "Hel"}, "finish_reason": null}]}),
        json!({"id": "s1", "choices": [{"delta": {"content": "lo"}, "finish_reason": null}]}),
        json!({"id": "s1", "choices": [{"delta": {}, "finish_reason": "stop"}]}),
        json!({"id": "s1", "choices": [], "usage": {"prompt_tokens": 3, "completion_tokens": 2}}),
    ]);

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let completer = std::sync::Arc::new(client(&server).completer("gpt-test"));
    let mut stream = spawn_completion(
        completer,
        vec![Message::user("hi")],
        CompleteOptions::default(),
        DEFAULT_STREAM_BUFFER,
    );

    let mut deltas = Vec::new();
    while let Some(delta) = stream.next().await {
        deltas.push(delta);
    }
    let completion = stream.finish().await.unwrap();

    assert_eq!(deltas.len(), 3);
    assert_eq!(deltas[0].message.content, "Hel");
    assert_eq!(deltas[1].message.content, "lo");
    let terminal = &deltas[2];
    assert_eq!(terminal.reason, Some(FinishReason::Stop));
    assert_eq!(
        terminal.usage,
        Some(Usage {
            input_tokens: 3,
            output_tokens: 2
        })
    );

    assert_eq!(completion.id, "s1");
    assert_eq!(completion.message.content, "Hello");
}

#[tokio::test]
async fn streaming_tool_call_arguments_are_assembled() {
    let server = MockServer::start().await;

    let body = sse(&[
        json!({"id": "s2", "choices": [{"delta": {"tool_calls": [
            {"index": 0, "id": "call_x", "type": "function", "function": {"name": "echo", "arguments": ""}}
        ]}}]}),
        json!({"id": "s2", "choices": [{"delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": "{\"x\":"}}
        ]}}]}),
        json!({"id": "s2", "choices": [{"delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": "\"hi\"}"}}
        ]}}]}),
        json!({"id": "s2", "choices": [{"delta": {}, "finish_reason": "tool_calls"}]}),
    ]);

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let completer = std::sync::Arc::new(client(&server).completer("gpt-test"));
    let mut stream = spawn_completion(
        completer,
        vec![Message::user("echo hi")],
        CompleteOptions::default(),
        DEFAULT_STREAM_BUFFER,
    );
    let deltas: Vec<_> = (&mut stream).collect().await;
    let completion = stream.finish().await.unwrap();

    let streamed: String = deltas
        .iter()
        .flat_map(|d| &d.message.tool_calls)
        .map(|c| c.arguments.as_str())
        .collect();
    assert_eq!(streamed, r#"{"x":"hi"}"#);

    assert_eq!(completion.reason, Some(FinishReason::ToolCalls));
    assert_eq!(completion.message.tool_calls.len(), 1);
    assert_eq!(completion.message.tool_calls[0].id, "call_x");
    assert_eq!(completion.message.tool_calls[0].name, "echo");
    assert_eq!(completion.message.tool_calls[0].arguments, r#"{"x":"hi"}"#);
}

#[tokio::test]
async fn http_errors_map_to_error_kinds() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "locked"})))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "busy"})))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "broken"})))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({"error": {"message": "upstream exploded"}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "ghost"})))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client(&server);
    let messages = [Message::user("hi")];

    let err = client
        .completer("locked")
        .complete(&messages, CompleteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SwitchyardError::AuthenticationFailed));

    let err = client
        .completer("busy")
        .complete(&messages, CompleteOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));

    let err = client
        .completer("broken")
        .complete(&messages, CompleteOptions::default())
        .await
        .unwrap_err();
    match err {
        SwitchyardError::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "upstream exploded");
        }
        other => panic!("expected Api error, got {other:?}"),
    }

    let err = client
        .completer("ghost")
        .complete(&messages, CompleteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SwitchyardError::ModelNotFound(ref m) if m == "ghost"));
}

#[tokio::test]
async fn empty_history_is_invalid_input() {
    let server = MockServer::start().await;

    let err = client(&server)
        .completer("gpt-test")
        .complete(&[], CompleteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SwitchyardError::InvalidInput(_)));
}

#[tokio::test]
async fn cancellation_aborts_the_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(30))
                .set_body_json(json!({"id": "late", "choices": []})),
        )
        .mount(&server)
        .await;

    let options = CompleteOptions::default();
    let cancel = options.cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        client(&server)
            .completer("gpt-test")
            .complete(&[Message::user("hi")], options),
    )
    .await
    .expect("cancellation should end the call");
    assert!(matches!(result, Err(SwitchyardError::Cancelled)));
}

#[tokio::test]
async fn embeddings_are_returned_in_input_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(body_partial_json(json!({"model": "text-embedding-3-small"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ],
            "model": "text-embedding-3-small"
        })))
        .mount(&server)
        .await;

    let embeddings = client(&server)
        .embedder("text-embedding-3-small")
        .embed_batch(&["first", "second"])
        .await
        .unwrap();

    assert_eq!(embeddings.len(), 2);
    assert_eq!(embeddings[0].values, vec![1.0, 0.0]);
    assert_eq!(embeddings[1].values, vec![0.0, 1.0]);
    assert_eq!(embeddings[0].dimensions, 2);
    assert_eq!(embeddings[0].model, "text-embedding-3-small");
}

#[tokio::test]
async fn truncated_stream_is_an_error() {
    let server = MockServer::start().await;

    // no finish_reason and no [DONE]
    let body = format!(
        "data: {}\n\n",
        json!({"id": "s3", "choices": [{"delta": {"content": "The answer is"}, "finish_reason": null}]})
    );

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let completer = std::sync::Arc::new(client(&server).completer("gpt-test"));
    let mut stream = spawn_completion(
        completer,
        vec![Message::user("hi")],
        CompleteOptions::default(),
        DEFAULT_STREAM_BUFFER,
    );
    let deltas: Vec<_> = (&mut stream).collect().await;
    let result = stream.finish().await;

    assert!(matches!(result, Err(SwitchyardError::Stream(_))));
    assert!(deltas.iter().all(|d| !d.is_terminal()));
}

#[tokio::test]
async fn done_without_finish_reason_is_a_stop() {
    let server = MockServer::start().await;

    let body = sse(&[
        json!({"id": "s4", "choices": [{"delta": {"content": "fine"}, "finish_reason": null}]}),
    ]);

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let completer = std::sync::Arc::new(client(&server).completer("gpt-test"));
    let mut stream = spawn_completion(
        completer,
        vec![Message::user("hi")],
        CompleteOptions::default(),
        DEFAULT_STREAM_BUFFER,
    );
    let deltas: Vec<_> = (&mut stream).collect().await;
    let completion = stream.finish().await.unwrap();

    assert_eq!(completion.message.content, "fine");
    assert_eq!(completion.reason, Some(FinishReason::Stop));
    assert_eq!(deltas.last().unwrap().reason, Some(FinishReason::Stop));
}

#[tokio::test]
async fn streamed_empty_arguments_concatenate_to_an_object() {
    let server = MockServer::start().await;

    let body = sse(&[
        json!({"id": "s5", "choices": [{"delta": {"tool_calls": [
            {"index": 0, "id": "c0", "type": "function", "function": {"name": "clock", "arguments": ""}}
        ]}}]}),
        json!({"id": "s5", "choices": [{"delta": {}, "finish_reason": "tool_calls"}]}),
    ]);

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let completer = std::sync::Arc::new(client(&server).completer("gpt-test"));
    let mut stream = spawn_completion(
        completer,
        vec![Message::user("time?")],
        CompleteOptions::default(),
        DEFAULT_STREAM_BUFFER,
    );
    let deltas: Vec<_> = (&mut stream).collect().await;
    let completion = stream.finish().await.unwrap();

    let streamed: String = deltas
        .iter()
        .flat_map(|d| &d.message.tool_calls)
        .filter(|c| c.id == "c0")
        .map(|c| c.arguments.as_str())
        .collect();
    assert_eq!(streamed, "{}");
    assert_eq!(completion.message.tool_calls[0].arguments, streamed);
    serde_json::from_str::<serde_json::Value>(&streamed).unwrap();
}
