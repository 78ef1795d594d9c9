//! Externally executed tools the orchestrator can invoke by name.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::types::ToolDefinition;

/// A capability the model can call.
///
/// Implementations hold all side effects (search, retrieval, speech, ...).
/// The orchestrator only parses arguments, calls [`execute`](Tool::execute)
/// and serializes the returned value back into the conversation.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name within the set a toolbox is built from.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the arguments object.
    fn parameters(&self) -> Value;

    /// Run the tool with already-parsed arguments.
    ///
    /// `cancel` is the calling request's token. A tool that owns resources
    /// should watch it and clean up; the orchestrator drops the future once
    /// the token fires and the tool has not returned.
    async fn execute(
        &self,
        arguments: Map<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<Value>;

    /// The definition advertised to the model.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters())
    }
}

/// Tools available to configuration, keyed by name.
///
/// Config chains reference tools by name; the host application supplies
/// the implementations.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any earlier tool with the same name.
    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.insert(tool);
        self
    }

    pub fn insert(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}
