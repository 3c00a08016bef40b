use std::net::SocketAddr;
use std::sync::Arc;

use bv_core::{ModelId, Position};
use bv_server::bootstrap;
use bv_server::config::{AppConfig, LoggingConfig, ServerConfig, VotingConfig};
use bv_server::handler::{self, AppState};
use bv_store::{Conversation, Response, SqliteVoteStore, Turn, VoteStore};
use chrono::Utc;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// TestServer — a real blindvote server over an in-memory store
// ---------------------------------------------------------------------------

pub struct TestServer {
    pub addr: SocketAddr,
    pub store: Arc<SqliteVoteStore>,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a server with the default four-model roster and vote cap.
    pub async fn start() -> Self {
        Self::start_with_options(&DEFAULT_ROSTER, 50).await
    }

    pub async fn start_with_options(roster: &[&str], session_vote_cap: u32) -> Self {
        let config = AppConfig {
            server: ServerConfig {
                listen: "127.0.0.1:0".to_owned(),
            },
            logging: LoggingConfig::default(),
            voting: VotingConfig {
                database_path: ":memory:".to_owned(),
                session_vote_cap,
            },
            roster: roster.iter().map(|m| m.to_string()).collect(),
        };

        let runtime = bootstrap::into_runtime(config).expect("test config should be valid");

        let store = Arc::new(SqliteVoteStore::new_in_memory().expect("in-memory store"));
        store.init().expect("init schema");

        let state = Arc::new(AppState {
            store: Arc::clone(&store) as Arc<dyn VoteStore>,
            roster: runtime.roster,
            session_vote_cap: runtime.session_vote_cap,
        });

        let app = handler::router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test server");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            addr,
            store,
            _handle: handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

pub const DEFAULT_ROSTER: [&str; 4] = [
    "google/gemini-2.5-pro",
    "anthropic/claude-sonnet-4.5",
    "openai/gpt-4.1",
    "openai/gpt-5",
];

pub fn seed_conversation(store: &dyn VoteStore, title: &str) -> Uuid {
    let conversation = Conversation {
        id: Uuid::new_v4(),
        title: title.to_owned(),
        source: bv_core::SourceId::new(format!("{title}.md")),
        imported_at: Utc::now(),
        metadata: serde_json::json!({}),
    };
    store
        .insert_conversation(&conversation)
        .expect("insert conversation");
    conversation.id
}

pub fn seed_turn(
    store: &dyn VoteStore,
    conversation_id: Uuid,
    turn_number: u32,
    models: &[&str],
) -> Uuid {
    let turn = Turn {
        id: Uuid::new_v4(),
        conversation_id,
        turn_number,
        user_prompt: format!("prompt {turn_number}"),
    };
    store.insert_turn(&turn).expect("insert turn");

    for (index, model) in models.iter().enumerate() {
        let response = Response {
            id: Uuid::new_v4(),
            turn_id: turn.id,
            model: ModelId::new(*model),
            response_text: format!("answer {}", index + 1),
            ordinal: index as u32 + 1,
        };
        store.insert_response(&response).expect("insert response");
    }

    turn.id
}

/// Seed a conversation with one complete (full-roster) turn.
pub fn seed_full_turn(store: &dyn VoteStore) -> (Uuid, Uuid) {
    let conversation_id = seed_conversation(store, "test-conversation");
    let turn_id = seed_turn(store, conversation_id, 1, &DEFAULT_ROSTER);
    (conversation_id, turn_id)
}

/// The label the server assigned to `model` on `turn_id`. Only valid after
/// something has triggered assignment (e.g. fetching the turn).
pub fn label_of(store: &dyn VoteStore, turn_id: Uuid, model: &str) -> Position {
    let assignment = store.get_assignment(&turn_id).expect("assignment");
    let responses = store.get_responses_for_turn(&turn_id).expect("responses");
    let response = responses
        .iter()
        .find(|r| r.model.as_str() == model)
        .expect("model present in turn");
    assignment
        .iter()
        .find(|row| row.response_id == response.id)
        .expect("response has a label")
        .position
}

pub fn vote_body(turn_id: Uuid, position: &str, session: &str) -> serde_json::Value {
    serde_json::json!({
        "turn_id": turn_id,
        "position": position,
        "voter_session": session,
    })
}
