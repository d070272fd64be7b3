//! Orchestration module
//!
//! Everything a single turn needs:
//! - System prompts
//! - The merged tool registry
//! - Tool result shapes
//! - The turn engine

mod engine;
mod system_prompt;
mod tool_registry;
mod tool_result;

pub use engine::{OrchestrationEngine, StagedTurn, TurnOutcome};
pub use system_prompt::{SystemPrompt, ARCHITECT_PROMPT, NARRATION_PROMPT};
pub use tool_registry::{create_standard_tool_registry, ToolRegistry, ToolRegistryBuilder};
pub use tool_result::{format_tool_result_for_llm, ToolCallResult, ToolResult};
