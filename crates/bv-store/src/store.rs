use std::io::{Error as IoError, ErrorKind};
use std::path::Path;
use std::sync::Mutex;

use bv_core::{ModelId, Position, SourceId, VoterSession};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::models::{
    Conversation, ConversationSummary, PositionAssignment, Response, Turn, Vote,
};

const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    source TEXT NOT NULL,
    imported_at TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS turns (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    turn_number INTEGER NOT NULL,
    user_prompt TEXT NOT NULL,
    UNIQUE (conversation_id, turn_number)
);
CREATE INDEX IF NOT EXISTS idx_turns_conversation ON turns(conversation_id);

CREATE TABLE IF NOT EXISTS responses (
    id TEXT PRIMARY KEY,
    turn_id TEXT NOT NULL REFERENCES turns(id) ON DELETE CASCADE,
    model TEXT NOT NULL,
    response_text TEXT NOT NULL,
    ordinal INTEGER NOT NULL,
    UNIQUE (turn_id, ordinal),
    UNIQUE (turn_id, model)
);
CREATE INDEX IF NOT EXISTS idx_responses_turn ON responses(turn_id);

CREATE TABLE IF NOT EXISTS position_assignments (
    turn_id TEXT NOT NULL REFERENCES turns(id) ON DELETE CASCADE,
    response_id TEXT NOT NULL REFERENCES responses(id) ON DELETE CASCADE,
    position TEXT NOT NULL,
    PRIMARY KEY (turn_id, position),
    UNIQUE (turn_id, response_id)
);

CREATE TABLE IF NOT EXISTS votes (
    id TEXT PRIMARY KEY,
    turn_id TEXT NOT NULL REFERENCES turns(id) ON DELETE CASCADE,
    position TEXT NOT NULL,
    voter_session TEXT NOT NULL,
    notes TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (turn_id, voter_session)
);
CREATE INDEX IF NOT EXISTS idx_votes_session ON votes(voter_session);
"#;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result of a constrained insert: the row went in, or a uniqueness
/// constraint says an equivalent row already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

pub trait VoteStore: Send + Sync {
    fn init(&self) -> Result<(), StoreError>;

    fn insert_conversation(&self, conversation: &Conversation) -> Result<(), StoreError>;
    fn insert_turn(&self, turn: &Turn) -> Result<(), StoreError>;
    fn insert_response(&self, response: &Response) -> Result<(), StoreError>;

    /// Insert a conversation with all of its turns and responses in one
    /// transaction. A failure anywhere rolls the whole conversation back.
    fn insert_conversation_tree(
        &self,
        conversation: &Conversation,
        turns: &[(Turn, Vec<Response>)],
    ) -> Result<(), StoreError>;

    fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StoreError>;
    fn get_conversation(&self, conversation_id: &Uuid)
        -> Result<Option<Conversation>, StoreError>;
    fn get_turn(&self, turn_id: &Uuid) -> Result<Option<Turn>, StoreError>;
    fn get_turns_for_conversation(&self, conversation_id: &Uuid)
        -> Result<Vec<Turn>, StoreError>;
    fn get_responses_for_turn(&self, turn_id: &Uuid) -> Result<Vec<Response>, StoreError>;

    /// The persisted bijection for a turn, ordered by label. Empty when the
    /// turn has not been assigned yet.
    fn get_assignment(&self, turn_id: &Uuid) -> Result<Vec<PositionAssignment>, StoreError>;

    /// Insert a full assignment atomically. `Duplicate` means another
    /// writer won the race and its mapping is the one that stands.
    fn insert_assignment(&self, rows: &[PositionAssignment]) -> Result<InsertOutcome, StoreError>;

    /// Drop a turn's assignment (explicit re-shuffle only).
    fn delete_assignment(&self, turn_id: &Uuid) -> Result<(), StoreError>;

    fn get_vote(
        &self,
        turn_id: &Uuid,
        session: &VoterSession,
    ) -> Result<Option<Vote>, StoreError>;

    /// `Duplicate` means the (turn, session) uniqueness constraint fired;
    /// the storage engine is the single arbiter of that decision.
    fn insert_vote(&self, vote: &Vote) -> Result<InsertOutcome, StoreError>;

    fn count_votes_for_session(&self, session: &VoterSession) -> Result<u64, StoreError>;

    /// De-anonymized models behind each vote in scope, in cast order: the
    /// join Vote → PositionAssignment → Response → model.
    fn vote_models(&self, conversation_id: Option<&Uuid>) -> Result<Vec<ModelId>, StoreError>;

    /// Administrative reset: deletes every vote, touches nothing else.
    fn purge_votes(&self) -> Result<u64, StoreError>;
}

pub struct SqliteVoteStore {
    conn: Mutex<Connection>,
}

impl SqliteVoteStore {
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock_conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("sqlite mutex poisoned")
    }
}

impl VoteStore for SqliteVoteStore {
    fn init(&self) -> Result<(), StoreError> {
        let conn = self.lock_conn();
        let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < SCHEMA_VERSION {
            conn.execute_batch(SCHEMA_SQL)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        } else {
            conn.execute_batch(SCHEMA_SQL)?;
        }

        Ok(())
    }

    fn insert_conversation(&self, conversation: &Conversation) -> Result<(), StoreError> {
        let metadata = serde_json::to_string(&conversation.metadata)?;
        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO conversations (id, title, source, imported_at, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                conversation.id.to_string(),
                conversation.title.as_str(),
                conversation.source.as_str(),
                conversation.imported_at.to_rfc3339(),
                metadata,
            ],
        )?;
        Ok(())
    }

    fn insert_turn(&self, turn: &Turn) -> Result<(), StoreError> {
        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO turns (id, conversation_id, turn_number, user_prompt)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                turn.id.to_string(),
                turn.conversation_id.to_string(),
                turn.turn_number,
                turn.user_prompt.as_str(),
            ],
        )?;
        Ok(())
    }

    fn insert_response(&self, response: &Response) -> Result<(), StoreError> {
        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO responses (id, turn_id, model, response_text, ordinal)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                response.id.to_string(),
                response.turn_id.to_string(),
                response.model.as_str(),
                response.response_text.as_str(),
                response.ordinal,
            ],
        )?;
        Ok(())
    }

    fn insert_conversation_tree(
        &self,
        conversation: &Conversation,
        turns: &[(Turn, Vec<Response>)],
    ) -> Result<(), StoreError> {
        let metadata = serde_json::to_string(&conversation.metadata)?;
        let mut conn = self.lock_conn();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO conversations (id, title, source, imported_at, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                conversation.id.to_string(),
                conversation.title.as_str(),
                conversation.source.as_str(),
                conversation.imported_at.to_rfc3339(),
                metadata,
            ],
        )?;

        for (turn, responses) in turns {
            tx.execute(
                "INSERT INTO turns (id, conversation_id, turn_number, user_prompt)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    turn.id.to_string(),
                    turn.conversation_id.to_string(),
                    turn.turn_number,
                    turn.user_prompt.as_str(),
                ],
            )?;

            for response in responses {
                tx.execute(
                    "INSERT INTO responses (id, turn_id, model, response_text, ordinal)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        response.id.to_string(),
                        response.turn_id.to_string(),
                        response.model.as_str(),
                        response.response_text.as_str(),
                        response.ordinal,
                    ],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StoreError> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.title, c.source, c.imported_at,
                    (SELECT COUNT(*) FROM turns t WHERE t.conversation_id = c.id)
             FROM conversations c
             ORDER BY c.imported_at ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let title: String = row.get(1)?;
            let source: String = row.get(2)?;
            let imported_at: String = row.get(3)?;
            let turn_count: u32 = row.get(4)?;

            Ok(ConversationSummary {
                id: parse_uuid(0, &id)?,
                title,
                source: SourceId::new(source),
                imported_at: parse_datetime_utc(3, &imported_at)?,
                turn_count,
            })
        })?;

        let conversations = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(conversations)
    }

    fn get_conversation(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<Conversation>, StoreError> {
        let conn = self.lock_conn();
        let conversation = conn
            .query_row(
                "SELECT id, title, source, imported_at, metadata
                 FROM conversations
                 WHERE id = ?1",
                params![conversation_id.to_string()],
                |row| {
                    let id: String = row.get(0)?;
                    let title: String = row.get(1)?;
                    let source: String = row.get(2)?;
                    let imported_at: String = row.get(3)?;
                    let metadata: String = row.get(4)?;

                    Ok(Conversation {
                        id: parse_uuid(0, &id)?,
                        title,
                        source: SourceId::new(source),
                        imported_at: parse_datetime_utc(3, &imported_at)?,
                        metadata: parse_json(4, &metadata)?,
                    })
                },
            )
            .optional()?;
        Ok(conversation)
    }

    fn get_turn(&self, turn_id: &Uuid) -> Result<Option<Turn>, StoreError> {
        let conn = self.lock_conn();
        let turn = conn
            .query_row(
                "SELECT id, conversation_id, turn_number, user_prompt
                 FROM turns
                 WHERE id = ?1",
                params![turn_id.to_string()],
                |row| {
                    let id: String = row.get(0)?;
                    let conversation_id: String = row.get(1)?;
                    let turn_number: u32 = row.get(2)?;
                    let user_prompt: String = row.get(3)?;

                    Ok(Turn {
                        id: parse_uuid(0, &id)?,
                        conversation_id: parse_uuid(1, &conversation_id)?,
                        turn_number,
                        user_prompt,
                    })
                },
            )
            .optional()?;
        Ok(turn)
    }

    fn get_turns_for_conversation(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Vec<Turn>, StoreError> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, turn_number, user_prompt
             FROM turns
             WHERE conversation_id = ?1
             ORDER BY turn_number ASC",
        )?;

        let rows = stmt.query_map(params![conversation_id.to_string()], |row| {
            let id: String = row.get(0)?;
            let conversation_id: String = row.get(1)?;
            let turn_number: u32 = row.get(2)?;
            let user_prompt: String = row.get(3)?;

            Ok(Turn {
                id: parse_uuid(0, &id)?,
                conversation_id: parse_uuid(1, &conversation_id)?,
                turn_number,
                user_prompt,
            })
        })?;

        let turns = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(turns)
    }

    fn get_responses_for_turn(&self, turn_id: &Uuid) -> Result<Vec<Response>, StoreError> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(
            "SELECT id, turn_id, model, response_text, ordinal
             FROM responses
             WHERE turn_id = ?1
             ORDER BY ordinal ASC",
        )?;

        let rows = stmt.query_map(params![turn_id.to_string()], |row| {
            let id: String = row.get(0)?;
            let turn_id: String = row.get(1)?;
            let model: String = row.get(2)?;
            let response_text: String = row.get(3)?;
            let ordinal: u32 = row.get(4)?;

            Ok(Response {
                id: parse_uuid(0, &id)?,
                turn_id: parse_uuid(1, &turn_id)?,
                model: ModelId::new(model),
                response_text,
                ordinal,
            })
        })?;

        let responses = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(responses)
    }

    fn get_assignment(&self, turn_id: &Uuid) -> Result<Vec<PositionAssignment>, StoreError> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(
            "SELECT turn_id, response_id, position
             FROM position_assignments
             WHERE turn_id = ?1
             ORDER BY position ASC",
        )?;

        let rows = stmt.query_map(params![turn_id.to_string()], |row| {
            let turn_id: String = row.get(0)?;
            let response_id: String = row.get(1)?;
            let position: String = row.get(2)?;

            Ok(PositionAssignment {
                turn_id: parse_uuid(0, &turn_id)?,
                response_id: parse_uuid(1, &response_id)?,
                position: parse_position(2, &position)?,
            })
        })?;

        let assignment = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(assignment)
    }

    fn insert_assignment(&self, rows: &[PositionAssignment]) -> Result<InsertOutcome, StoreError> {
        let mut conn = self.lock_conn();
        let tx = conn.transaction()?;

        for row in rows {
            let result = tx.execute(
                "INSERT INTO position_assignments (turn_id, response_id, position)
                 VALUES (?1, ?2, ?3)",
                params![
                    row.turn_id.to_string(),
                    row.response_id.to_string(),
                    row.position.as_str(),
                ],
            );

            match result {
                Ok(_) => {}
                Err(err) if is_unique_violation(&err) => {
                    // The whole mapping stands or falls together.
                    tx.rollback()?;
                    return Ok(InsertOutcome::Duplicate);
                }
                Err(err) => return Err(err.into()),
            }
        }

        tx.commit()?;
        Ok(InsertOutcome::Inserted)
    }

    fn delete_assignment(&self, turn_id: &Uuid) -> Result<(), StoreError> {
        let conn = self.lock_conn();
        conn.execute(
            "DELETE FROM position_assignments WHERE turn_id = ?1",
            params![turn_id.to_string()],
        )?;
        Ok(())
    }

    fn get_vote(
        &self,
        turn_id: &Uuid,
        session: &VoterSession,
    ) -> Result<Option<Vote>, StoreError> {
        let conn = self.lock_conn();
        let vote = conn
            .query_row(
                "SELECT id, turn_id, position, voter_session, notes, created_at
                 FROM votes
                 WHERE turn_id = ?1 AND voter_session = ?2",
                params![turn_id.to_string(), session.as_str()],
                map_vote_row,
            )
            .optional()?;
        Ok(vote)
    }

    fn insert_vote(&self, vote: &Vote) -> Result<InsertOutcome, StoreError> {
        let conn = self.lock_conn();
        let result = conn.execute(
            "INSERT INTO votes (id, turn_id, position, voter_session, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                vote.id.to_string(),
                vote.turn_id.to_string(),
                vote.position.as_str(),
                vote.voter_session.as_str(),
                vote.notes.as_deref(),
                vote.created_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Duplicate),
            Err(err) => Err(err.into()),
        }
    }

    fn count_votes_for_session(&self, session: &VoterSession) -> Result<u64, StoreError> {
        let conn = self.lock_conn();
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM votes WHERE voter_session = ?1",
            params![session.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn vote_models(&self, conversation_id: Option<&Uuid>) -> Result<Vec<ModelId>, StoreError> {
        let conn = self.lock_conn();

        let sql_all = "SELECT r.model
             FROM votes v
             JOIN position_assignments pa
               ON pa.turn_id = v.turn_id AND pa.position = v.position
             JOIN responses r ON r.id = pa.response_id
             ORDER BY v.created_at ASC, v.id ASC";
        let sql_scoped = "SELECT r.model
             FROM votes v
             JOIN position_assignments pa
               ON pa.turn_id = v.turn_id AND pa.position = v.position
             JOIN responses r ON r.id = pa.response_id
             JOIN turns t ON t.id = v.turn_id
             WHERE t.conversation_id = ?1
             ORDER BY v.created_at ASC, v.id ASC";

        let map_model = |row: &rusqlite::Row<'_>| {
            let model: String = row.get(0)?;
            Ok(ModelId::new(model))
        };

        let models = match conversation_id {
            Some(conversation_id) => {
                let mut stmt = conn.prepare(sql_scoped)?;
                let rows = stmt.query_map(params![conversation_id.to_string()], map_model)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(sql_all)?;
                let rows = stmt.query_map([], map_model)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(models)
    }

    fn purge_votes(&self) -> Result<u64, StoreError> {
        let conn = self.lock_conn();
        let purged = conn.execute("DELETE FROM votes", [])?;
        Ok(purged as u64)
    }
}

fn map_vote_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Vote> {
    let id: String = row.get(0)?;
    let turn_id: String = row.get(1)?;
    let position: String = row.get(2)?;
    let voter_session: String = row.get(3)?;
    let notes: Option<String> = row.get(4)?;
    let created_at: String = row.get(5)?;

    Ok(Vote {
        id: parse_uuid(0, &id)?,
        turn_id: parse_uuid(1, &turn_id)?,
        position: parse_position(2, &position)?,
        voter_session: parse_session(3, &voter_session)?,
        notes,
        created_at: parse_datetime_utc(5, &created_at)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn parse_uuid(column: usize, value: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value).map_err(|_| sql_text_parse_error(column, "uuid", value))
}

fn parse_datetime_utc(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| sql_text_parse_error(column, "datetime", value))
}

fn parse_position(column: usize, value: &str) -> rusqlite::Result<Position> {
    Position::parse(value).ok_or_else(|| sql_text_parse_error(column, "position label", value))
}

fn parse_session(column: usize, value: &str) -> rusqlite::Result<VoterSession> {
    VoterSession::new(value).ok_or_else(|| sql_text_parse_error(column, "voter session", value))
}

fn parse_json(column: usize, value: &str) -> rusqlite::Result<serde_json::Value> {
    serde_json::from_str(value).map_err(|_| sql_text_parse_error(column, "json", value))
}

fn sql_text_parse_error(column: usize, field: &'static str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        Type::Text,
        Box::new(IoError::new(
            ErrorKind::InvalidData,
            format!("invalid {field}: {value}"),
        )),
    )
}
