use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use bv_core::{Position, Roster, VoteRejection, VoterSession};
use bv_store::{
    aggregate_results, get_anonymized_turn, record_vote, VoteOutcome, VoteRequest, VoteStore,
    VotingError,
};

// ---------------------------------------------------------------------------
// AppState — shared state for all handlers
// ---------------------------------------------------------------------------

pub struct AppState {
    pub store: Arc<dyn VoteStore>,
    pub roster: Roster,
    pub session_vote_cap: u32,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/conversations", get(list_conversations))
        .route(
            "/api/conversations/{conversation_id}/turns",
            get(list_turns),
        )
        .route("/api/turns/{turn_id}", get(get_turn))
        .route("/api/votes", axum::routing::post(submit_vote).delete(purge_votes))
        .route("/api/results", get(get_results))
        .with_state(state)
}

type HandlerError = (StatusCode, Json<serde_json::Value>);

// ---------------------------------------------------------------------------
// Anonymized voting path
// ---------------------------------------------------------------------------

/// The blind view of a turn: prompt plus responses keyed by position label
/// only. Model identity never enters this projection. Positions are
/// assigned on the first read of the turn.
pub async fn get_turn(
    State(state): State<Arc<AppState>>,
    Path(turn_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let store = Arc::clone(&state.store);
    let roster = state.roster.clone();

    let view = run_store_task(move || {
        let mut rng = rand::rng();
        get_anonymized_turn(store.as_ref(), &roster, turn_id, &mut rng)
    })
    .await?;

    Ok((StatusCode::OK, Json(view)))
}

#[derive(Debug, Deserialize)]
pub struct VoteSubmission {
    pub turn_id: Uuid,
    pub position: String,
    pub voter_session: String,
    pub notes: Option<String>,
}

pub async fn submit_vote(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VoteSubmission>,
) -> Result<impl IntoResponse, HandlerError> {
    let position = Position::parse(&body.position).ok_or_else(|| {
        json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("invalid position label: {}", body.position),
        )
    })?;

    let voter_session = VoterSession::new(body.voter_session).ok_or_else(|| {
        json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            VoteRejection::EmptySession.to_string(),
        )
    })?;

    let request = VoteRequest {
        turn_id: body.turn_id,
        position,
        voter_session,
        notes: body.notes,
    };

    let store = Arc::clone(&state.store);
    let cap = state.session_vote_cap;
    let outcome = run_store_task(move || record_vote(store.as_ref(), request, cap)).await?;

    let response = match outcome {
        VoteOutcome::Accepted(vote) => {
            tracing::info!(
                turn_id = %vote.turn_id,
                position = %vote.position,
                session = ?vote.voter_session,
                "vote recorded"
            );
            (
                StatusCode::CREATED,
                Json(json!({
                    "status": "accepted",
                    "turn_id": vote.turn_id,
                    "position": vote.position,
                })),
            )
        }
        VoteOutcome::AlreadyVoted(prior) => (
            StatusCode::OK,
            Json(json!({
                "status": "already_voted",
                "turn_id": prior.turn_id,
                "position": prior.position,
                "voted_at": prior.created_at,
            })),
        ),
        VoteOutcome::LimitReached { cap } => (
            StatusCode::OK,
            Json(json!({
                "status": "limit_reached",
                "cap": cap,
            })),
        ),
    };

    Ok(response)
}

// ---------------------------------------------------------------------------
// Analytics path — the only surface that exposes model identity
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    pub conversation_id: Option<Uuid>,
}

pub async fn get_results(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ResultsQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let store = Arc::clone(&state.store);
    let roster = state.roster.clone();
    let conversation_id = query.conversation_id;

    let summary =
        run_store_task(move || aggregate_results(store.as_ref(), &roster, conversation_id))
            .await?;

    Ok((StatusCode::OK, Json(summary)))
}

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let store = Arc::clone(&state.store);
    let summaries =
        run_store_task(move || store.list_conversations().map_err(VotingError::Store)).await?;
    Ok((StatusCode::OK, Json(summaries)))
}

pub async fn list_turns(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let store = Arc::clone(&state.store);

    let turns = run_store_task(move || {
        if store.get_conversation(&conversation_id)?.is_none() {
            return Err(VotingError::ConversationNotFound(conversation_id));
        }
        Ok(store.get_turns_for_conversation(&conversation_id)?)
    })
    .await?;

    let listing: Vec<serde_json::Value> = turns
        .iter()
        .map(|turn| {
            json!({
                "turn_id": turn.id,
                "turn_number": turn.turn_number,
            })
        })
        .collect();

    Ok((StatusCode::OK, Json(listing)))
}

// ---------------------------------------------------------------------------
// Administration
// ---------------------------------------------------------------------------

/// Full-table vote purge for resetting test data. Conversations, turns,
/// responses and position assignments are untouched.
pub async fn purge_votes(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let store = Arc::clone(&state.store);
    let purged = run_store_task(move || store.purge_votes().map_err(VotingError::Store)).await?;

    tracing::warn!(purged, "all votes purged");
    Ok((StatusCode::OK, Json(json!({ "purged": purged }))))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn run_store_task<T, F>(task: F) -> Result<T, HandlerError>
where
    F: FnOnce() -> Result<T, VotingError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| {
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                format!("failed to join store task: {err}"),
            )
        })?
        .map_err(voting_error_response)
}

fn voting_error_response(err: VotingError) -> HandlerError {
    match &err {
        VotingError::TurnNotFound(_) | VotingError::ConversationNotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "not_found_error", err.to_string())
        }
        VotingError::RosterMismatch(_) => {
            json_error(StatusCode::CONFLICT, "roster_mismatch", err.to_string())
        }
        VotingError::Rejected(_) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", err.to_string())
        }
        VotingError::Store(store_err) => {
            tracing::error!(error = %store_err, "store operation failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "internal storage error, please retry",
            )
        }
    }
}

fn json_error(
    status: StatusCode,
    error_type: &'static str,
    message: impl Into<String>,
) -> HandlerError {
    let message = message.into();
    (
        status,
        Json(json!({
            "error": {
                "message": message,
                "type": error_type,
                "code": status.as_u16(),
            }
        })),
    )
}
