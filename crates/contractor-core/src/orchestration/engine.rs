//! Turn orchestration
//!
//! One turn runs at most two model round-trips:
//!
//! 1. The first completion sees the architect prompt, the trailing history
//!    window and the user message, with the merged tool catalog offered.
//! 2. If the model asked for tools, every call runs concurrently through the
//!    [`ToolRegistry`] and a follow-up completion (no tools) narrates the
//!    results.
//!
//! Provider failures abort the turn with nothing written to the session.
//! Tool failures never do; they reach the model as error results.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::OrchestrationConfig;
use crate::error::Result;
use crate::provider::{CompletionRequest, LlmMessage, ModelProvider, ToolCallRequest};
use crate::session::{ChatState, ContractDraft, DraftSlot, Message, Role};
use crate::tools::ToolArguments;

use super::system_prompt::SystemPrompt;
use super::tool_registry::ToolRegistry;
use super::tool_result::{ToolCallResult, ToolResult};

/// Product of one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    /// Reply shown to the user
    pub content: String,
    /// One result per requested tool call; absent when the model called none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallResult>>,
}

/// Turn output before the staged draft is committed
#[derive(Debug, Clone)]
pub struct StagedTurn {
    pub outcome: TurnOutcome,
    /// Draft proposed during the turn, if any
    pub proposed_draft: Option<ContractDraft>,
}

/// Drives conversational turns against a model provider and tool registry
pub struct OrchestrationEngine {
    provider: Arc<dyn ModelProvider>,
    registry: Arc<ToolRegistry>,
    settings: OrchestrationConfig,
    system_prompt: SystemPrompt,
    narration_prompt: SystemPrompt,
}

impl OrchestrationEngine {
    pub fn new(provider: Arc<dyn ModelProvider>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            registry,
            settings: OrchestrationConfig::default(),
            system_prompt: SystemPrompt::architect(),
            narration_prompt: SystemPrompt::narration(),
        }
    }

    pub fn with_settings(mut self, settings: OrchestrationConfig) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_system_prompt(mut self, prompt: SystemPrompt) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub fn with_narration_prompt(mut self, prompt: SystemPrompt) -> Self {
        self.narration_prompt = prompt;
        self
    }

    pub fn provider(&self) -> &Arc<dyn ModelProvider> {
        &self.provider
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &OrchestrationConfig {
        &self.settings
    }

    /// Run a turn against `state`.
    ///
    /// Reads the trailing window of `state.history` and, on success, commits
    /// any proposed draft to `state.latest_draft`. History itself is left to
    /// the caller. On error `state` is untouched.
    pub async fn process_turn(&self, user_text: &str, state: &mut ChatState) -> Result<TurnOutcome> {
        let draft = DraftSlot::from_state(state);
        let staged = self.run_turn(user_text, &state.history, &draft).await?;

        if let Some(proposed) = staged.proposed_draft {
            debug!("Committing proposed contract draft");
            state.latest_draft = Some(proposed);
        }

        Ok(staged.outcome)
    }

    /// Run a turn without touching session state.
    ///
    /// Tool handlers write into `draft`; the proposal made during this turn
    /// is returned for the caller to commit.
    pub async fn run_turn(
        &self,
        user_text: &str,
        history: &[Message],
        draft: &DraftSlot,
    ) -> Result<StagedTurn> {
        let window = self.history_window(history);
        let catalog = self.registry.catalog().await;

        let mut messages = Vec::with_capacity(window.len() + 2);
        messages.push(LlmMessage::system(self.system_prompt.build()));
        messages.extend(window.iter().cloned());
        messages.push(LlmMessage::user(user_text));

        debug!(
            history = window.len(),
            tools = catalog.len(),
            "Requesting first completion"
        );
        let first = self
            .provider
            .complete(
                CompletionRequest::new(messages)
                    .with_tools(catalog)
                    .with_max_tokens(self.settings.max_tokens),
            )
            .await?;

        if !first.has_tool_calls() {
            let content = first
                .non_empty_content()
                .map(str::to_string)
                .unwrap_or_else(|| self.settings.empty_reply_fallback.clone());
            return Ok(StagedTurn {
                outcome: TurnOutcome {
                    content,
                    tool_calls: None,
                },
                proposed_draft: None,
            });
        }

        let requests = first.tool_calls;
        info!(count = requests.len(), "Model requested tool calls");
        let results = self.execute_tool_calls(&requests, draft).await;

        let mut follow_up = Vec::with_capacity(window.len() + results.len() + 3);
        follow_up.push(LlmMessage::system(self.narration_prompt.build()));
        follow_up.extend(window);
        follow_up.push(LlmMessage::user(user_text));
        follow_up.push(LlmMessage::assistant_with_tool_calls(requests));
        for result in &results {
            follow_up.push(LlmMessage::tool_result(&result.id, result.llm_content()));
        }

        debug!(results = results.len(), "Requesting follow-up completion");
        let narration = self
            .provider
            .complete(CompletionRequest::new(follow_up).with_max_tokens(self.settings.max_tokens))
            .await?;

        let content = narration
            .non_empty_content()
            .map(str::to_string)
            .unwrap_or_else(|| self.settings.narration_fallback.clone());

        Ok(StagedTurn {
            outcome: TurnOutcome {
                content,
                tool_calls: Some(results),
            },
            proposed_draft: draft.take_proposal(),
        })
    }

    /// Trailing history as model messages, oldest first.
    ///
    /// Entries without content and tool-role entries carry nothing the model
    /// can use without their originating call, so they are skipped.
    fn history_window(&self, history: &[Message]) -> Vec<LlmMessage> {
        let start = history.len().saturating_sub(self.settings.history_window);
        history[start..]
            .iter()
            .filter_map(|m| {
                let content = m.content.as_ref()?;
                match m.role {
                    Role::System => Some(LlmMessage::system(content)),
                    Role::User => Some(LlmMessage::user(content)),
                    Role::Assistant => Some(LlmMessage::assistant(content)),
                    Role::Tool => None,
                }
            })
            .collect()
    }

    /// Run every call concurrently and return one result per request, in
    /// request order.
    async fn execute_tool_calls(
        &self,
        requests: &[ToolCallRequest],
        draft: &DraftSlot,
    ) -> Vec<ToolCallResult> {
        let mut join_set = JoinSet::new();

        for (index, request) in requests.iter().enumerate() {
            debug!(tool = %request.name, call_id = %request.id, "Dispatching tool call");
            let registry = Arc::clone(&self.registry);
            let request = request.clone();
            let draft = draft.clone();
            join_set.spawn(async move { (index, registry.execute(&request, &draft).await) });
        }

        // Results arrive in completion order; slot them back by request index
        let mut results: Vec<Option<ToolCallResult>> = vec![None; requests.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => warn!(error = %e, "Tool task aborted"),
            }
        }

        requests
            .iter()
            .zip(results)
            .map(|(request, result)| {
                result.unwrap_or_else(|| aborted_result(request, "task did not complete"))
            })
            .collect()
    }
}

fn aborted_result(request: &ToolCallRequest, reason: &str) -> ToolCallResult {
    ToolCallResult {
        id: request.id.clone(),
        name: request.name.clone(),
        arguments: ToolArguments::parse(&request.raw_arguments)
            .unwrap_or_default()
            .into_value(),
        result: ToolResult::Error(format!("Tool execution aborted: {}", reason)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::ToolRegistryBuilder;
    use crate::provider::CompletionResult;
    use async_trait::async_trait;

    struct FixedProvider(CompletionResult);

    #[async_trait]
    impl ModelProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResult> {
            Ok(self.0.clone())
        }
    }

    fn engine(reply: CompletionResult) -> OrchestrationEngine {
        OrchestrationEngine::new(
            Arc::new(FixedProvider(reply)),
            Arc::new(ToolRegistryBuilder::new().build()),
        )
    }

    #[test]
    fn test_history_window_is_trailing_and_skips_unusable_entries() {
        let engine = engine(CompletionResult::default());
        let mut history: Vec<Message> = (0..12).map(|i| Message::user(format!("m{i}"))).collect();
        history.push(Message::new(Role::Tool, Some("{}".into())));
        history.push(Message::new(Role::Assistant, None));

        let window = engine.history_window(&history);
        // Last 10 entries: m4..m11 plus the two skipped ones
        assert_eq!(window.len(), 8);
        assert_eq!(window[0], LlmMessage::user("m4"));
        assert_eq!(window[7], LlmMessage::user("m11"));
    }

    #[tokio::test]
    async fn test_empty_first_reply_uses_fallback() {
        let engine = engine(CompletionResult::default());
        let mut state = ChatState::new();

        let outcome = engine.process_turn("hi", &mut state).await.unwrap();
        assert_eq!(outcome.content, "How can I help you refine your prompt contract today?");
        assert!(outcome.tool_calls.is_none());
    }

    #[test]
    fn test_aborted_result_keeps_request_identity() {
        let request = ToolCallRequest::new("call_3", "propose_contract", r#"{"goal":"g"}"#);
        let result = aborted_result(&request, "panicked");
        assert_eq!(result.id, "call_3");
        assert_eq!(result.arguments["goal"], "g");
        assert!(result.result.is_error());
    }
}
