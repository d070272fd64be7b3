//! Session module
//!
//! Per-conversation state and the service front ends drive it through.
//!
//! - `ChatState`: history plus the pending contract draft
//! - `DraftSlot`: turn-scoped staging area tools write proposals into
//! - `ChatService`: sessions keyed by id, one turn at a time per session

mod service;
mod types;

pub use service::{ChatService, SessionSnapshot, DEFAULT_SESSION_ID};
pub use types::{ChatState, ContractDraft, DraftSlot, Message, Role, SessionId};
