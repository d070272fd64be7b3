//! Tool call results
//!
//! Every tool call the model requests yields exactly one [`ToolCallResult`]
//! carrying the request id, whatever happened during execution.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Outcome of a single tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "status", content = "value")]
pub enum ToolResult {
    Success(Value),
    Error(String),
}

impl ToolResult {
    pub fn is_error(&self) -> bool {
        matches!(self, ToolResult::Error(_))
    }

    /// Payload as sent to the model: the success value, or `{"error": msg}`
    pub fn to_llm_value(&self) -> Value {
        match self {
            ToolResult::Success(value) => value.clone(),
            ToolResult::Error(message) => json!({ "error": message }),
        }
    }
}

/// Result of a tool call, keyed by the id of the request that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub id: String,
    pub name: String,
    /// Parsed arguments; the empty object when the model's text did not parse
    pub arguments: Value,
    pub result: ToolResult,
}

impl ToolCallResult {
    /// Serialized content for the tool-role message
    pub fn llm_content(&self) -> String {
        format_tool_result_for_llm(&self.result)
    }
}

/// Format a tool result for sending back to the LLM
pub fn format_tool_result_for_llm(result: &ToolResult) -> String {
    result.to_llm_value().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_content_is_payload() {
        let result = ToolResult::Success(json!({"status": "success"}));
        assert_eq!(format_tool_result_for_llm(&result), r#"{"status":"success"}"#);
    }

    #[test]
    fn test_error_content_is_wrapped() {
        let result = ToolResult::Error("Tool not found: x".into());
        assert!(result.is_error());
        assert_eq!(format_tool_result_for_llm(&result), r#"{"error":"Tool not found: x"}"#);
    }
}
