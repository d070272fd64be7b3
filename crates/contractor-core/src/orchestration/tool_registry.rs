//! Tool Registry
//!
//! Single entry point for "what tools exist" and "run tool X". Built-in
//! tools run in-process; every other name is proxied to the backend
//! manager. Built-ins shadow remote tools of the same name.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::mcp_manager::BackendConnectionManager;
use crate::provider::ToolCallRequest;
use crate::session::DraftSlot;
use crate::tools::{
    BrowseDocumentation, CannedDocumentation, DocumentationSource, ProposeContract, Tool,
    ToolArguments, ToolDefinition, ToolExecutionContext,
};

use super::tool_result::{ToolCallResult, ToolResult};

/// Built-in tools plus the remote backends
pub struct ToolRegistry {
    builtins: Vec<Arc<dyn Tool>>,
    backends: Arc<BackendConnectionManager>,
}

impl ToolRegistry {
    /// Registry with no built-ins and no backends
    pub fn new(backends: Arc<BackendConnectionManager>) -> Self {
        Self {
            builtins: Vec::new(),
            backends,
        }
    }

    /// Register a built-in tool, replacing any built-in with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        match self.builtins.iter_mut().find(|t| t.name() == tool.name()) {
            Some(existing) => *existing = tool,
            None => self.builtins.push(tool),
        }
    }

    /// Get a built-in tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.builtins.iter().find(|t| t.name() == name).cloned()
    }

    /// Built-in tool definitions only
    pub fn builtin_definitions(&self) -> Vec<ToolDefinition> {
        self.builtins.iter().map(|t| t.to_definition()).collect()
    }

    pub fn backends(&self) -> &Arc<BackendConnectionManager> {
        &self.backends
    }

    /// Merged catalog offered to the model.
    ///
    /// Built-ins come first. Names are unique: a remote tool named like a
    /// built-in (or like an earlier remote tool) is dropped.
    pub async fn catalog(&self) -> Vec<ToolDefinition> {
        let mut definitions = self.builtin_definitions();
        let mut seen: HashSet<String> = definitions.iter().map(|d| d.name.clone()).collect();

        for remote in self.backends.get_tool_definitions().await {
            if seen.insert(remote.name.clone()) {
                definitions.push(remote);
            } else {
                debug!(tool = %remote.name, "Remote tool shadowed");
            }
        }

        definitions
    }

    /// Run one tool call. Never fails: any error becomes an error result.
    pub async fn execute(&self, request: &ToolCallRequest, draft: &DraftSlot) -> ToolCallResult {
        let args = match ToolArguments::parse(&request.raw_arguments) {
            Ok(args) => args,
            Err(e) => {
                warn!(tool = %request.name, call_id = %request.id, error = %e, "Unparsable tool arguments, using empty object");
                ToolArguments::new()
            }
        };
        let arguments = args.as_value();

        let result = match self.dispatch(request, args, draft).await {
            Ok(value) => ToolResult::Success(value),
            Err(e) => {
                warn!(tool = %request.name, call_id = %request.id, error = %e, "Tool execution failed");
                ToolResult::Error(e.to_string())
            }
        };

        ToolCallResult {
            id: request.id.clone(),
            name: request.name.clone(),
            arguments,
            result,
        }
    }

    async fn dispatch(
        &self,
        request: &ToolCallRequest,
        args: ToolArguments,
        draft: &DraftSlot,
    ) -> Result<Value, ToolError> {
        if let Some(tool) = self.get(&request.name) {
            debug!(tool = %request.name, call_id = %request.id, "Running built-in tool");
            let ctx = ToolExecutionContext::new(&request.id, &request.name, draft.clone());
            let output = tool.execute(args, ctx).await?;
            return Ok(output.content);
        }

        let text = self.backends.invoke(&request.name, args.into_value()).await?;
        Ok(json!({ "content": text }))
    }
}

/// Builder for creating a tool registry with customizable options
pub struct ToolRegistryBuilder {
    backends: Option<Arc<BackendConnectionManager>>,
    documentation: Option<Arc<dyn DocumentationSource>>,
    extra_tools: Vec<Arc<dyn Tool>>,
}

impl Default for ToolRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self {
            backends: None,
            documentation: None,
            extra_tools: Vec::new(),
        }
    }

    /// Set the backend manager for remote tools
    pub fn with_backends(mut self, backends: Arc<BackendConnectionManager>) -> Self {
        self.backends = Some(backends);
        self
    }

    /// Replace the canned documentation lookup
    pub fn with_documentation_source(mut self, source: Arc<dyn DocumentationSource>) -> Self {
        self.documentation = Some(source);
        self
    }

    /// Add another built-in tool
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.extra_tools.push(tool);
        self
    }

    pub fn build(self) -> ToolRegistry {
        let backends = self
            .backends
            .unwrap_or_else(|| Arc::new(BackendConnectionManager::empty()));
        let documentation = self
            .documentation
            .unwrap_or_else(|| Arc::new(CannedDocumentation));

        let mut registry = ToolRegistry::new(backends);
        registry.register(Arc::new(ProposeContract::new()));
        registry.register(Arc::new(BrowseDocumentation::new(documentation)));
        for tool in self.extra_tools {
            registry.register(tool);
        }
        registry
    }
}

/// Registry with the standard built-ins and the given backends
pub fn create_standard_tool_registry(backends: Arc<BackendConnectionManager>) -> ToolRegistry {
    ToolRegistryBuilder::new().with_backends(backends).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ChatState;

    fn registry() -> ToolRegistry {
        ToolRegistryBuilder::new().build()
    }

    #[tokio::test]
    async fn test_catalog_has_builtins() {
        let names: Vec<_> = registry().catalog().await.into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["propose_contract", "browse_documentation"]);
    }

    #[tokio::test]
    async fn test_unparsable_arguments_become_empty_object() {
        let registry = registry();
        let draft = DraftSlot::from_state(&ChatState::new());
        let request = ToolCallRequest::new("call_1", "browse_documentation", "{not json");

        let result = registry.execute(&request, &draft).await;
        assert_eq!(result.id, "call_1");
        assert_eq!(result.arguments, json!({}));
        assert!(!result.result.is_error());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_result() {
        let registry = registry();
        let draft = DraftSlot::from_state(&ChatState::new());
        let request = ToolCallRequest::new("call_9", "no_such_tool", "{}");

        let result = registry.execute(&request, &draft).await;
        assert_eq!(result.id, "call_9");
        assert_eq!(result.result, ToolResult::Error("Tool not found: no_such_tool".into()));
    }

    #[tokio::test]
    async fn test_register_replaces_same_name() {
        let mut registry = registry();
        registry.register(Arc::new(ProposeContract::new()));
        assert_eq!(registry.builtin_definitions().len(), 2);
    }
}
