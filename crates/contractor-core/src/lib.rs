//! Contractor Core - tool orchestration for a prompt-contract assistant
//!
//! This crate provides the core functionality for Contractor:
//! - A model provider abstraction backed by genai
//! - Built-in tools and a registry merging them with remote MCP backends
//! - The two-round turn engine (completion, tool fan-out, narration)
//! - Per-session chat state and the service front ends talk to

pub mod config;
pub mod error;
pub mod mcp_manager;
pub mod orchestration;
pub mod provider;
pub mod session;
pub mod tools;

pub use config::{BackendConfig, BackendTransport, Config, ConfigManager, OrchestrationConfig, ProviderConfig};
pub use error::{Error, Result, ToolError};
pub use mcp_manager::{
    BackendClient, BackendConnectionManager, BackendConnector, BackendRegistration, BackendStatus,
    McpConnector,
};
pub use provider::{
    create_provider, CompletionEvent, CompletionRequest, CompletionResult, CompletionStream,
    GenAIProvider, LlmMessage, ModelProvider, ProviderType, ToolCallRequest, ToolChoice,
};
pub use tools::{Tool, ToolArguments, ToolDefinition, ToolOutput};

// Orchestration exports
pub use orchestration::{
    create_standard_tool_registry, OrchestrationEngine, SystemPrompt, ToolCallResult,
    ToolRegistry, ToolRegistryBuilder, ToolResult, TurnOutcome,
};

// Session exports
pub use session::{
    ChatService, ChatState, ContractDraft, DraftSlot, Message, Role, SessionId, SessionSnapshot,
};
