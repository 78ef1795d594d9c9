use switchyard::types::{Completion, File, FinishReason, Message, Role, ToolCall, Usage};

#[test]
fn test_message_constructors() {
    let sys = Message::system("You are helpful");
    assert!(matches!(sys.role, Role::System));

    let user = Message::user("Hello");
    assert!(matches!(user.role, Role::User));

    let asst = Message::assistant("Hi there!");
    assert!(matches!(asst.role, Role::Assistant));
    assert!(asst.tool_calls.is_empty());
}

#[test]
fn test_tool_result_message() {
    let tool = Message::tool_result("call_123", "result data");
    assert!(matches!(tool.role, Role::Tool { ref tool_call_id } if tool_call_id == "call_123"));
    assert_eq!(tool.tool_call_id(), Some("call_123"));
    assert_eq!(tool.role.as_str(), "tool");
    assert_eq!(Message::user("x").tool_call_id(), None);
}

#[test]
fn test_assistant_with_tool_calls() {
    let msg = Message::assistant_with_tool_calls(
        "",
        vec![ToolCall::new("c1", "search", r#"{"q":"rust"}"#)],
    );
    assert_eq!(msg.tool_calls.len(), 1);

    #[derive(serde::Deserialize)]
    struct Args {
        q: String,
    }
    let args: Args = msg.tool_calls[0].parse_arguments().unwrap();
    assert_eq!(args.q, "rust");
}

#[test]
fn test_file_attachment() {
    let msg = Message::user("look")
        .with_file(File::new(vec![1, 2, 3]).with_name("a.bin").with_content_type("image/png"));
    assert_eq!(msg.files.len(), 1);
    assert_eq!(msg.files[0].name.as_deref(), Some("a.bin"));
    assert_eq!(msg.files[0].content_type.as_deref(), Some("image/png"));
}

#[test]
fn test_message_serde_roundtrip() {
    let msg = Message::tool_result("call_9", "42");
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value["role"]["tool"]["tool_call_id"], "call_9");
    assert!(value.get("files").is_none());

    let back: Message = serde_json::from_value(value).unwrap();
    assert_eq!(back, msg);

    let user: Message = serde_json::from_str(r#"{"role":"user","content":"hi"}"#).unwrap();
    assert_eq!(user, Message::user("hi"));
}

#[test]
fn test_completion_helpers() {
    let delta = Completion::content_delta("c", "frag");
    assert!(!delta.is_terminal());
    assert!(!delta.wants_tools());

    let terminal = Completion {
        reason: Some(FinishReason::ToolCalls),
        usage: Some(Usage::default()),
        ..Completion::empty("c")
    };
    assert!(terminal.is_terminal());
    assert!(terminal.wants_tools());
    assert_eq!(FinishReason::ToolCalls.as_str(), "tool_calls");

    let value = serde_json::to_value(&delta).unwrap();
    assert!(value.get("reason").is_none());
    assert!(value.get("usage").is_none());
}
