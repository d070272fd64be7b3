//! GenAI-based LLM provider implementation
//!
//! Uses the genai framework so one provider type covers the hosted APIs
//! and a local Ollama. Tool calls are returned to the caller rather than
//! executed here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use genai::chat::{
    ChatMessage, ChatOptions, ChatRequest, ChatStream, ChatStreamEvent, Tool, ToolCall,
    ToolResponse,
};
use genai::resolver::{AuthData, AuthResolver};
use genai::{Client, WebConfig};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use super::logging::{log_llm_interaction, LogConfig};
use super::{
    CompletionEvent, CompletionRequest, CompletionResult, CompletionStream, LlmMessage,
    ModelProvider, ToolCallRequest,
};
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::tools::ToolDefinition;

/// Supported LLM provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// OpenAI (GPT-4o, etc.)
    OpenAI,
    /// Anthropic (Claude)
    Anthropic,
    /// Google Gemini
    Gemini,
    /// Groq (fast inference)
    Groq,
    /// DeepSeek
    DeepSeek,
    /// xAI (Grok)
    XAI,
    /// Ollama (local)
    Ollama,
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderType::OpenAI),
            "anthropic" => Ok(ProviderType::Anthropic),
            "gemini" | "google" => Ok(ProviderType::Gemini),
            "groq" => Ok(ProviderType::Groq),
            "deepseek" => Ok(ProviderType::DeepSeek),
            "xai" | "grok" => Ok(ProviderType::XAI),
            "ollama" => Ok(ProviderType::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

impl ProviderType {
    /// Get the default model for this provider
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderType::OpenAI => "gpt-4o",
            ProviderType::Anthropic => "claude-sonnet-4-20250514",
            ProviderType::Gemini => "gemini-1.5-pro",
            ProviderType::Groq => "llama-3.3-70b-versatile",
            ProviderType::DeepSeek => "deepseek-chat",
            ProviderType::XAI => "grok-2",
            ProviderType::Ollama => "llama3.2",
        }
    }

    /// Get the environment variable name for API key
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderType::OpenAI => Some("OPENAI_API_KEY"),
            ProviderType::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderType::Gemini => Some("GEMINI_API_KEY"),
            ProviderType::Groq => Some("GROQ_API_KEY"),
            ProviderType::DeepSeek => Some("DEEPSEEK_API_KEY"),
            ProviderType::XAI => Some("XAI_API_KEY"),
            ProviderType::Ollama => None,
        }
    }

    /// Get the provider type as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::OpenAI => "openai",
            ProviderType::Anthropic => "anthropic",
            ProviderType::Gemini => "gemini",
            ProviderType::Groq => "groq",
            ProviderType::DeepSeek => "deepseek",
            ProviderType::XAI => "xai",
            ProviderType::Ollama => "ollama",
        }
    }
}

/// A provider implementation using genai
pub struct GenAIProvider {
    client: Client,
    provider_type: ProviderType,
    model: RwLock<String>,
}

impl GenAIProvider {
    /// Default timeout for LLM API requests (5 minutes)
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

    fn default_web_config() -> WebConfig {
        WebConfig::default()
            .with_timeout(Self::DEFAULT_TIMEOUT)
            .with_connect_timeout(Duration::from_secs(30))
    }

    /// Create a provider that resolves credentials from environment variables
    pub fn new(provider_type: ProviderType, model: Option<&str>) -> Self {
        let client = Client::builder()
            .with_web_config(Self::default_web_config())
            .build();
        Self {
            client,
            provider_type,
            model: RwLock::new(model.unwrap_or(provider_type.default_model()).to_string()),
        }
    }

    /// Create a provider with a specific API key
    pub fn with_api_key(provider_type: ProviderType, api_key: &str, model: Option<&str>) -> Self {
        let api_key = api_key.to_string();
        let auth_resolver = AuthResolver::from_resolver_fn(
            move |_model_iden| -> std::result::Result<Option<AuthData>, genai::resolver::Error> {
                Ok(Some(AuthData::from_single(api_key.clone())))
            },
        );

        let client = Client::builder()
            .with_web_config(Self::default_web_config())
            .with_auth_resolver(auth_resolver)
            .build();

        Self {
            client,
            provider_type,
            model: RwLock::new(model.unwrap_or(provider_type.default_model()).to_string()),
        }
    }

    pub fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    /// Current model name
    pub fn model(&self) -> String {
        self.model.read().clone()
    }

    /// Switch the model used by subsequent completions
    pub fn set_model(&self, model: impl Into<String>) {
        let model = model.into();
        debug!(provider = %self.provider_type, model = %model, "Switching model");
        *self.model.write() = model;
    }

    fn build_chat_request(messages: &[LlmMessage], tools: &[ToolDefinition]) -> ChatRequest {
        let mut chat_req = ChatRequest::default();

        for msg in messages {
            chat_req = match msg {
                LlmMessage::System { content } => chat_req.append_message(ChatMessage::system(content)),
                LlmMessage::User { content } => chat_req.append_message(ChatMessage::user(content)),
                LlmMessage::Assistant { content } => {
                    chat_req.append_message(ChatMessage::assistant(content))
                }
                LlmMessage::AssistantToolCalls { tool_calls, .. } => {
                    // Tool calls must travel as a single assistant message
                    let genai_tool_calls: Vec<ToolCall> = tool_calls
                        .iter()
                        .map(|tc| ToolCall {
                            call_id: tc.id.clone(),
                            fn_name: tc.name.clone(),
                            fn_arguments: arguments_value(&tc.raw_arguments),
                            thought_signatures: None,
                        })
                        .collect();
                    chat_req.append_message(genai_tool_calls)
                }
                LlmMessage::Tool { call_id, content } => {
                    chat_req.append_message(ToolResponse::new(call_id.clone(), content.clone()))
                }
            };
        }

        if !tools.is_empty() {
            let genai_tools: Vec<Tool> = tools
                .iter()
                .map(|t| {
                    Tool::new(&t.name)
                        .with_description(&t.description)
                        .with_schema(t.parameters.clone())
                })
                .collect();
            chat_req = chat_req.with_tools(genai_tools);
        }

        chat_req
    }
}

/// genai carries arguments as JSON; keep them as-is when the text parses
fn arguments_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Recover the model's argument text from genai's parsed form
fn raw_arguments(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Accumulates a genai stream into completion events
struct StreamState {
    inner: ChatStream,
    content: String,
    tool_calls: Vec<ToolCallRequest>,
    done: bool,
    log: Arc<RequestLog>,
}

/// Request details kept for logging once the stream ends
struct RequestLog {
    model: String,
    provider: &'static str,
    messages: Vec<LlmMessage>,
    tools: Vec<ToolDefinition>,
}

impl RequestLog {
    fn write(&self, result: Option<&CompletionResult>, error: Option<&str>) {
        log_llm_interaction(LogConfig {
            model: &self.model,
            provider: Some(self.provider),
            messages: &self.messages,
            tools: &self.tools,
            result,
            error,
        });
    }
}

impl StreamState {
    async fn next_event(&mut self) -> Option<Result<CompletionEvent>> {
        if self.done {
            return None;
        }

        while let Some(event) = self.inner.next().await {
            match event {
                Ok(ChatStreamEvent::Chunk(chunk)) => {
                    if chunk.content.is_empty() {
                        continue;
                    }
                    self.content.push_str(&chunk.content);
                    return Some(Ok(CompletionEvent::TextDelta(chunk.content)));
                }
                Ok(ChatStreamEvent::ToolCallChunk(tc)) => {
                    // Each ToolCallChunk carries a complete ToolCall
                    let tool_call = tc.tool_call;
                    self.tool_calls.push(ToolCallRequest {
                        id: tool_call.call_id,
                        name: tool_call.fn_name,
                        raw_arguments: raw_arguments(tool_call.fn_arguments),
                    });
                }
                Ok(ChatStreamEvent::End(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    self.done = true;
                    let error_msg = format!("GenAI stream error: {:?}", e);
                    self.log.write(None, Some(&error_msg));
                    error!(error = ?e, model = %self.log.model, "LLM stream error");
                    return Some(Err(Error::Provider(error_msg)));
                }
            }
        }

        self.done = true;
        let result = CompletionResult {
            content: if self.content.is_empty() {
                None
            } else {
                Some(std::mem::take(&mut self.content))
            },
            tool_calls: std::mem::take(&mut self.tool_calls),
        };
        self.log.write(Some(&result), None);
        Some(Ok(CompletionEvent::Finished(result)))
    }
}

#[async_trait]
impl ModelProvider for GenAIProvider {
    fn name(&self) -> &str {
        self.provider_type.as_str()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResult> {
        let stream = self.complete_stream(request).await?;
        super::collect_stream(stream).await
    }

    async fn complete_stream(&self, request: CompletionRequest) -> Result<CompletionStream> {
        let model = self.model();
        let tools = request.offered_tools().to_vec();
        let chat_req = Self::build_chat_request(&request.messages, &tools);

        let mut options = ChatOptions::default();
        if let Some(max_tokens) = request.max_tokens {
            options = options.with_max_tokens(max_tokens);
        }

        let log = Arc::new(RequestLog {
            model: model.clone(),
            provider: self.provider_type.as_str(),
            messages: request.messages,
            tools,
        });

        debug!(
            model = %model,
            messages = log.messages.len(),
            tools = log.tools.len(),
            "Sending completion request"
        );

        // Streaming keeps long completions clear of request timeouts
        let stream_response = match self
            .client
            .exec_chat_stream(&model, chat_req, Some(&options))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let error_msg = format!("GenAI error: {:?}", e);
                log.write(None, Some(&error_msg));
                error!(error = ?e, model = %model, "LLM request failed");
                return Err(Error::Provider(error_msg));
            }
        };

        let state = StreamState {
            inner: stream_response.stream,
            content: String::new(),
            tool_calls: Vec::new(),
            done: false,
            log,
        };

        Ok(stream::unfold(state, |mut state| async move {
            let event = state.next_event().await?;
            Some((event, state))
        })
        .boxed())
    }
}

/// Create a provider from configuration
pub fn create_provider(config: &ProviderConfig) -> Result<GenAIProvider> {
    let provider_type: ProviderType = config.provider_type.parse().map_err(Error::Config)?;
    let model = (!config.model.is_empty()).then_some(config.model.as_str());

    let provider = match config.get_api_key() {
        Some(key) => GenAIProvider::with_api_key(provider_type, &key, model),
        None if provider_type == ProviderType::Ollama => GenAIProvider::new(provider_type, model),
        None => {
            return Err(Error::Config(format!(
                "No API key configured for provider '{}'. Set {} or add api_key to the config file.",
                provider_type,
                provider_type.api_key_env().unwrap_or("an API key")
            )));
        }
    };

    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_parsing() {
        assert_eq!("OpenAI".parse::<ProviderType>(), Ok(ProviderType::OpenAI));
        assert_eq!("google".parse::<ProviderType>(), Ok(ProviderType::Gemini));
        assert_eq!("grok".parse::<ProviderType>(), Ok(ProviderType::XAI));
        assert!("cohere".parse::<ProviderType>().is_err());
    }

    #[test]
    fn test_default_model() {
        let provider = GenAIProvider::new(ProviderType::DeepSeek, None);
        assert_eq!(provider.model(), "deepseek-chat");
        assert_eq!(provider.name(), "deepseek");
    }

    #[test]
    fn test_set_model() {
        let provider = GenAIProvider::new(ProviderType::OpenAI, Some("gpt-4o"));
        provider.set_model("gpt-4o-mini");
        assert_eq!(provider.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_raw_arguments_roundtrip() {
        assert_eq!(raw_arguments(Value::String("{\"a\":1}".into())), "{\"a\":1}");
        assert_eq!(raw_arguments(serde_json::json!({"a": 1})), "{\"a\":1}");
        assert_eq!(raw_arguments(Value::Null), "");
        assert_eq!(arguments_value("{\"a\":1}"), serde_json::json!({"a": 1}));
        assert_eq!(arguments_value("{broken"), Value::String("{broken".into()));
    }

    #[test]
    fn test_create_provider_unknown_type() {
        let mut config = ProviderConfig::openai();
        config.provider_type = "nope".into();
        assert!(matches!(create_provider(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_create_provider_with_key() {
        let mut config = ProviderConfig::anthropic();
        config.api_key = Some("test-key".into());
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.provider_type(), ProviderType::Anthropic);
        assert_eq!(provider.model(), "claude-sonnet-4-20250514");
    }
}
