use bv_core::{ModelId, Position, SourceId, VoterSession};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An imported blind-comparison conversation. Immutable after import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub title: String,
    pub source: SourceId,
    pub imported_at: DateTime<Utc>,
    /// Free-form import metadata (export tool, file hash, ...).
    pub metadata: serde_json::Value,
}

/// One user prompt within a conversation, answered by every roster model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub conversation_id: Uuid,
    /// 1-based sequence number, unique within the conversation.
    pub turn_number: u32,
    pub user_prompt: String,
}

/// A single model's answer to a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: Uuid,
    pub turn_id: Uuid,
    pub model: ModelId,
    pub response_text: String,
    /// 1-based import order, unique within the turn.
    pub ordinal: u32,
}

/// One row of a turn's response → label bijection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionAssignment {
    pub turn_id: Uuid,
    pub response_id: Uuid,
    pub position: Position,
}

/// A reviewer's choice for one turn. At most one per (turn, session).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub id: Uuid,
    pub turn_id: Uuid,
    pub position: Position,
    pub voter_session: VoterSession,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Conversation listing row for navigation, with its turn count.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub title: String,
    pub source: SourceId,
    pub imported_at: DateTime<Utc>,
    pub turn_count: u32,
}
