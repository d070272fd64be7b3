//! LLM Provider abstraction
//!
//! The orchestration engine talks to the model through [`ModelProvider`].
//! [`GenAIProvider`] implements it on top of the genai framework, which
//! covers OpenAI, Anthropic, Gemini, Groq, DeepSeek, xAI and Ollama.

mod genai_provider;
mod logging;

pub use genai_provider::{GenAIProvider, ProviderType, create_provider};

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tools::ToolDefinition;

/// A tool invocation proposed by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// Argument text exactly as the model produced it
    pub raw_arguments: String,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, raw_arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            raw_arguments: raw_arguments.into(),
        }
    }
}

/// Message for LLM API calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum LlmMessage {
    System { content: String },
    User { content: String },
    Assistant { content: String },
    /// Assistant turn that requested tools; content is usually absent
    AssistantToolCalls {
        content: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
    },
    /// Result of one tool call, tagged with the originating call id
    Tool { call_id: String, content: String },
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System { content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User { content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant { content: content.into() }
    }

    pub fn assistant_with_tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self::AssistantToolCalls {
            content: None,
            tool_calls,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool {
            call_id: call_id.into(),
            content: content.into(),
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Assistant { .. } | Self::AssistantToolCalls { .. } => "assistant",
            Self::Tool { .. } => "tool",
        }
    }

    /// Text content as a string (for logging/display)
    pub fn content_as_text(&self) -> &str {
        match self {
            Self::System { content }
            | Self::User { content }
            | Self::Assistant { content }
            | Self::Tool { content, .. } => content,
            Self::AssistantToolCalls { content, .. } => content.as_deref().unwrap_or_default(),
        }
    }
}

/// Whether the model may call tools in this completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// Model decides whether to call zero or more tools
    #[default]
    Auto,
    /// Tools are not offered
    None,
}

/// A single completion request
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<LlmMessage>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<LlmMessage>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            tool_choice: ToolChoice::None,
            max_tokens: None,
        }
    }

    /// Offer tools with automatic tool choice
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self.tool_choice = ToolChoice::Auto;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Tools actually sent to the model
    pub fn offered_tools(&self) -> &[ToolDefinition] {
        match self.tool_choice {
            ToolChoice::Auto => &self.tools,
            ToolChoice::None => &[],
        }
    }
}

/// Response from completion that may contain both content and tool calls
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    /// Text content from the assistant (may be present even with tool calls)
    pub content: Option<String>,
    /// Tool calls requested by the model
    pub tool_calls: Vec<ToolCallRequest>,
}

impl CompletionResult {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: None,
            tool_calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Non-empty text content, if any
    pub fn non_empty_content(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// Incremental completion output. A stream yields zero or more text
/// deltas and ends with exactly one `Finished`.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionEvent {
    TextDelta(String),
    Finished(CompletionResult),
}

pub type CompletionStream = BoxStream<'static, Result<CompletionEvent>>;

/// Trait for LLM providers
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "openai", "anthropic")
    fn name(&self) -> &str;

    /// Run a completion and return the composed result
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResult>;

    /// Run a completion as a stream of partial text ending in the final result.
    ///
    /// The default emits the whole text as one delta after `complete`.
    async fn complete_stream(&self, request: CompletionRequest) -> Result<CompletionStream> {
        let result = self.complete(request).await?;
        let mut events = Vec::new();
        if let Some(content) = result.non_empty_content() {
            events.push(Ok(CompletionEvent::TextDelta(content.to_string())));
        }
        events.push(Ok(CompletionEvent::Finished(result)));
        Ok(stream::iter(events).boxed())
    }
}

/// Drain a completion stream into its final result
pub async fn collect_stream(mut stream: CompletionStream) -> Result<CompletionResult> {
    while let Some(event) = stream.next().await {
        if let CompletionEvent::Finished(result) = event? {
            return Ok(result);
        }
    }
    Err(Error::Provider("Completion stream ended without a result".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoProvider;

    #[async_trait]
    impl ModelProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResult> {
            let last = request.messages.last().map(|m| m.content_as_text().to_string());
            Ok(CompletionResult {
                content: last,
                tool_calls: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_default_stream_ends_with_result() {
        let request = CompletionRequest::new(vec![LlmMessage::user("hello")]);
        let mut stream = EchoProvider.complete_stream(request).await.unwrap();

        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            CompletionEvent::TextDelta("hello".into())
        );
        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            CompletionEvent::Finished(CompletionResult::text("hello"))
        );
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_collect_stream() {
        let request = CompletionRequest::new(vec![LlmMessage::user("hi")]);
        let stream = EchoProvider.complete_stream(request).await.unwrap();
        assert_eq!(collect_stream(stream).await.unwrap(), CompletionResult::text("hi"));
    }

    #[tokio::test]
    async fn test_collect_stream_without_result_fails() {
        let stream: CompletionStream =
            stream::iter(vec![Ok(CompletionEvent::TextDelta("partial".into()))]).boxed();
        assert!(matches!(collect_stream(stream).await, Err(Error::Provider(_))));
    }

    #[test]
    fn test_offered_tools_respects_choice() {
        let tools = vec![ToolDefinition {
            name: "t".into(),
            description: String::new(),
            parameters: serde_json::json!({}),
        }];
        let auto = CompletionRequest::new(vec![]).with_tools(tools.clone());
        assert_eq!(auto.offered_tools().len(), 1);

        let mut none = auto.clone();
        none.tool_choice = ToolChoice::None;
        assert!(none.offered_tools().is_empty());
    }

    #[test]
    fn test_non_empty_content() {
        assert_eq!(CompletionResult::text("  ").non_empty_content(), None);
        assert_eq!(CompletionResult::text("ok").non_empty_content(), Some("ok"));
        assert_eq!(CompletionResult::default().non_empty_content(), None);
    }

    #[test]
    fn test_message_serialization() {
        let value = serde_json::to_value(LlmMessage::tool_result("call_1", "{}")).unwrap();
        assert_eq!(value["role"], "tool");
        assert_eq!(value["call_id"], "call_1");
    }
}
