//! Chat service
//!
//! The seam a front end talks to: per-session `ChatState` keyed by session
//! id, plus the operations that wrap a turn with history bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::types::{ChatState, ContractDraft, Message, SessionId};
use crate::error::{Error, Result};
use crate::orchestration::{OrchestrationEngine, TurnOutcome};

/// Session used until the front end switches to another
pub const DEFAULT_SESSION_ID: &str = "default";

/// What the front end renders for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub messages: Vec<Message>,
    pub latest_draft: Option<ContractDraft>,
}

/// Multi-session chat front door over an [`OrchestrationEngine`]
pub struct ChatService {
    engine: Arc<OrchestrationEngine>,
    /// Each session's state sits behind its own lock; holding it for a whole
    /// turn serializes turns on that session.
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<ChatState>>>>,
    active: RwLock<SessionId>,
}

impl ChatService {
    pub fn new(engine: Arc<OrchestrationEngine>) -> Self {
        Self {
            engine,
            sessions: RwLock::new(HashMap::new()),
            active: RwLock::new(DEFAULT_SESSION_ID.to_string()),
        }
    }

    pub fn engine(&self) -> &Arc<OrchestrationEngine> {
        &self.engine
    }

    /// Id of the session subsequent calls operate on
    pub fn active_session(&self) -> SessionId {
        self.active.read().clone()
    }

    /// Known session ids, sorted
    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Point subsequent calls at `session_id`, creating its state if new
    pub fn switch_session(&self, session_id: impl Into<SessionId>) -> Result<()> {
        let session_id = session_id.into();
        if session_id.trim().is_empty() {
            return Err(Error::Session("Session id cannot be empty".to_string()));
        }

        self.state_for(&session_id);
        info!(session_id = %session_id, "Switched session");
        *self.active.write() = session_id;
        Ok(())
    }

    /// Messages and pending draft of the active session
    pub async fn get_messages(&self) -> SessionSnapshot {
        let session_id = self.active_session();
        let state = self.state_for(&session_id);
        let state = state.lock().await;
        SessionSnapshot {
            session_id,
            messages: state.history.clone(),
            latest_draft: state.latest_draft.clone(),
        }
    }

    /// Run a turn on the active session.
    ///
    /// The user message and the reply are appended together once the turn
    /// succeeds. A failed turn leaves history and draft as they were.
    pub async fn send_message(&self, text: &str) -> Result<TurnOutcome> {
        if text.trim().is_empty() {
            return Err(Error::Session("Message cannot be empty".to_string()));
        }

        let session_id = self.active_session();
        let state = self.state_for(&session_id);
        let mut state = state.lock().await;

        debug!(session_id = %session_id, history = state.history.len(), "Starting turn");
        let outcome = match self.engine.process_turn(text, &mut state).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Turn failed");
                return Err(e);
            }
        };

        state.commit_turn([Message::user(text), Message::assistant(&outcome.content)]);
        Ok(outcome)
    }

    /// Drop the active session's pending draft, returning it
    pub async fn clear_draft(&self) -> Option<ContractDraft> {
        let state = self.state_for(&self.active_session());
        let mut state = state.lock().await;
        state.clear_draft()
    }

    /// Forget a session. Returns whether it existed.
    ///
    /// Removing the active session leaves it active with fresh state on
    /// next use.
    pub fn remove_session(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().remove(session_id).is_some();
        if removed {
            info!(session_id, "Removed session");
        }
        removed
    }

    fn state_for(&self, session_id: &str) -> Arc<Mutex<ChatState>> {
        if let Some(state) = self.sessions.read().get(session_id) {
            return Arc::clone(state);
        }

        let mut sessions = self.sessions.write();
        Arc::clone(
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(ChatState::new()))),
        )
    }
}
