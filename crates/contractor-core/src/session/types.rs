//! Session types
//!
//! Messages, the contract draft and the per-conversation `ChatState` that
//! every turn reads from and writes to.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Unique identifier for a session
pub type SessionId = String;

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message in the conversation history.
///
/// History is ordered by insertion; `timestamp` is informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, Some(content.into()))
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, Some(content.into()))
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, Some(content.into()))
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// The four-clause contract artifact proposed by the assistant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDraft {
    pub goal: String,
    pub constraints: String,
    pub format: String,
    pub failure_conditions: String,
}

/// Per-conversation state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatState {
    /// Append-only, ordered by insertion
    pub history: Vec<Message>,
    /// Most recent proposal. Replaced wholesale, cleared only by the editor side.
    pub latest_draft: Option<ContractDraft>,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finished turn's messages in one step
    pub fn commit_turn(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.history.extend(messages);
    }

    /// Drop the pending draft once the editor has taken it
    pub fn clear_draft(&mut self) -> Option<ContractDraft> {
        self.latest_draft.take()
    }
}

/// Turn-scoped view of the session draft handed to tool handlers.
///
/// Handlers read the draft as it was when the turn started and stage new
/// proposals here; the engine copies a staged proposal into `ChatState`
/// only after the turn completes. Concurrent proposals within one turn are
/// last-write-wins with no defined order.
#[derive(Debug, Clone, Default)]
pub struct DraftSlot {
    inner: Arc<Mutex<DraftStage>>,
}

#[derive(Debug, Default)]
struct DraftStage {
    current: Option<ContractDraft>,
    proposed: bool,
}

impl DraftSlot {
    /// Start a turn from the session's current draft
    pub fn from_state(state: &ChatState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DraftStage {
                current: state.latest_draft.clone(),
                proposed: false,
            })),
        }
    }

    pub fn current(&self) -> Option<ContractDraft> {
        self.inner.lock().current.clone()
    }

    /// Stage a proposal, replacing whatever was there
    pub fn propose(&self, draft: ContractDraft) {
        let mut stage = self.inner.lock();
        stage.current = Some(draft);
        stage.proposed = true;
    }

    /// The staged proposal, if any handler made one this turn
    pub fn take_proposal(&self) -> Option<ContractDraft> {
        let mut stage = self.inner.lock();
        if stage.proposed {
            stage.proposed = false;
            stage.current.clone()
        } else {
            None
        }
    }
}
