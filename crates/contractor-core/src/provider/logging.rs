//! LLM request/response logging
//!
//! Set the `LLM_LOG_FILE` environment variable to append one JSON object per
//! completion (request, parsed response, error) to that file.
//!
//! Example: `LLM_LOG_FILE=/tmp/llm.log contractor chat`

use std::io::Write;

use serde_json::json;
use tracing::{debug, warn};

use super::{CompletionResult, LlmMessage};
use crate::tools::ToolDefinition;

pub const LOG_FILE_ENV: &str = "LLM_LOG_FILE";

/// What to include in the log entry
#[derive(Default)]
pub struct LogConfig<'a> {
    /// The model used for this request
    pub model: &'a str,
    /// Provider name (e.g., "openai")
    pub provider: Option<&'a str>,
    /// Messages in the request
    pub messages: &'a [LlmMessage],
    /// Tools offered with the request
    pub tools: &'a [ToolDefinition],
    /// Parsed completion result
    pub result: Option<&'a CompletionResult>,
    /// Error message if the request failed
    pub error: Option<&'a str>,
}

fn build_entry(config: &LogConfig<'_>) -> serde_json::Value {
    json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "model": config.model,
        "provider": config.provider,
        "request": {
            "messages": config.messages,
            "message_count": config.messages.len(),
            "tools": config.tools.iter().map(|tool| json!({
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters
            })).collect::<Vec<_>>(),
            "tool_count": config.tools.len(),
        },
        "response": config.result.map(|r| json!({
            "type": if r.has_tool_calls() { "tool_calls" } else { "message" },
            "content": r.content,
            "tool_calls": r.tool_calls.iter().map(|c| json!({
                "name": c.name,
                "call_id": c.id,
                "arguments": c.raw_arguments
            })).collect::<Vec<_>>()
        })),
        "error": config.error,
    })
}

/// Append an interaction to the log file if `LLM_LOG_FILE` is set
pub fn log_llm_interaction(config: LogConfig<'_>) {
    let log_file = match std::env::var(LOG_FILE_ENV) {
        Ok(path) if !path.is_empty() => path,
        _ => return,
    };

    let entry = build_entry(&config);

    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
    {
        Ok(mut file) => {
            if let Err(e) = writeln!(file, "{}", serde_json::to_string(&entry).unwrap_or_default()) {
                warn!("Failed to write to LLM log file: {}", e);
            }
        }
        Err(e) => {
            warn!("Failed to open LLM log file {}: {}", log_file, e);
        }
    }

    debug!("Logged LLM interaction to {}", log_file);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ToolCallRequest;

    #[test]
    fn test_entry_for_tool_calls() {
        let messages = vec![LlmMessage::user("draft a contract")];
        let result = CompletionResult::with_tool_calls(vec![ToolCallRequest::new(
            "call_1",
            "propose_contract",
            r#"{"goal":"x"}"#,
        )]);

        let entry = build_entry(&LogConfig {
            model: "gpt-4o",
            provider: Some("openai"),
            messages: &messages,
            result: Some(&result),
            ..Default::default()
        });

        assert_eq!(entry["request"]["message_count"], 1);
        assert_eq!(entry["request"]["messages"][0]["role"], "user");
        assert_eq!(entry["response"]["type"], "tool_calls");
        assert_eq!(entry["response"]["tool_calls"][0]["call_id"], "call_1");
        assert!(entry["error"].is_null());
    }

    #[test]
    fn test_entry_for_error() {
        let entry = build_entry(&LogConfig {
            model: "gpt-4o",
            error: Some("boom"),
            ..Default::default()
        });
        assert!(entry["response"].is_null());
        assert_eq!(entry["error"], "boom");
    }
}
