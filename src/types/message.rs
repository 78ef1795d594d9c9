//! Message types for chat conversations

use super::tool::ToolCall;
use serde::{Deserialize, Serialize};

/// Role of a message participant
///
/// A tool message carries the id of the [`ToolCall`] it answers, so a tool
/// result can never be built without naming the call it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool { tool_call_id: String },
}

impl Role {
    /// Wire name of the role (`system`, `user`, `assistant`, `tool`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool { .. } => "tool",
        }
    }
}

/// A binary attachment (image, audio, document) carried by a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// MIME type, when known. Adapters sniff or default it otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub content: Vec<u8>,
}

impl File {
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: None,
            content_type: None,
            content: content.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A chat message
///
/// Histories are append-only: callers and the orchestrator push new
/// messages, they never edit earlier ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<File>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            files: Vec::new(),
            tool_calls: Vec::new(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create an assistant message with tool calls
    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::with_role(Role::Assistant, content)
        }
    }

    /// Create a tool result message answering the call with `tool_call_id`
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::with_role(
            Role::Tool {
                tool_call_id: tool_call_id.into(),
            },
            content,
        )
    }

    /// Attach a file
    pub fn with_file(mut self, file: File) -> Self {
        self.files.push(file);
        self
    }

    /// The id of the call this message answers, for tool messages.
    pub fn tool_call_id(&self) -> Option<&str> {
        match &self.role {
            Role::Tool { tool_call_id } => Some(tool_call_id),
            _ => None,
        }
    }
}
