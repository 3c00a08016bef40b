use bv_core::{
    assign_positions, tally_votes, AssignError, ModelTally, Position, Roster, VoteRejection,
    VoterSession,
};
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{PositionAssignment, Vote};
use crate::store::{InsertOutcome, StoreError, VoteStore};

// ---------------------------------------------------------------------------
// VotingError — top-level error for the voting operations
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum VotingError {
    #[error("turn {0} not found")]
    TurnNotFound(Uuid),
    #[error("conversation {0} not found")]
    ConversationNotFound(Uuid),
    #[error(transparent)]
    RosterMismatch(#[from] AssignError),
    #[error(transparent)]
    Rejected(#[from] VoteRejection),
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Position Assigner — idempotent, constraint-backed label assignment
// ---------------------------------------------------------------------------

/// Return the turn's persisted label bijection, creating it on first use.
///
/// Assignment happens at most once per turn: a turn that already has rows
/// gets them back unchanged, so every read during the voting window sees
/// the same mapping. When two callers race to assign, the store's
/// uniqueness constraints pick a winner and the loser reads back the
/// winner's rows.
pub fn ensure_assignment<R: Rng + ?Sized>(
    store: &dyn VoteStore,
    roster: &Roster,
    turn_id: Uuid,
    rng: &mut R,
) -> Result<Vec<PositionAssignment>, VotingError> {
    let existing = store.get_assignment(&turn_id)?;
    if !existing.is_empty() {
        return Ok(existing);
    }

    if store.get_turn(&turn_id)?.is_none() {
        return Err(VotingError::TurnNotFound(turn_id));
    }

    let responses = store.get_responses_for_turn(&turn_id)?;
    let models: Vec<_> = responses.iter().map(|r| r.model.clone()).collect();
    let labels = assign_positions(roster, &models, rng)?;

    let mut rows: Vec<PositionAssignment> = responses
        .iter()
        .zip(labels)
        .map(|(response, position)| PositionAssignment {
            turn_id,
            response_id: response.id,
            position,
        })
        .collect();
    rows.sort_by_key(|row| row.position);

    match store.insert_assignment(&rows)? {
        InsertOutcome::Inserted => Ok(rows),
        // Lost the first-assignment race; the winner's mapping stands.
        InsertOutcome::Duplicate => Ok(store.get_assignment(&turn_id)?),
    }
}

/// Explicit admin re-shuffle: drop the turn's mapping and draw a new one.
/// Not part of normal operation; existing votes for the turn keep their
/// labels and would de-anonymize against the new mapping.
pub fn reshuffle_assignment<R: Rng + ?Sized>(
    store: &dyn VoteStore,
    roster: &Roster,
    turn_id: Uuid,
    rng: &mut R,
) -> Result<Vec<PositionAssignment>, VotingError> {
    store.delete_assignment(&turn_id)?;
    ensure_assignment(store, roster, turn_id, rng)
}

// ---------------------------------------------------------------------------
// Anonymized read path — never carries model identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct AnonymizedResponse {
    pub position: Position,
    pub text: String,
}

/// The voting-facing projection of a turn. Model identity is absent by
/// construction, not hidden by serialization.
#[derive(Debug, Clone, Serialize)]
pub struct AnonymizedTurn {
    pub turn_id: Uuid,
    pub turn_number: u32,
    pub prompt: String,
    pub responses: Vec<AnonymizedResponse>,
}

pub fn get_anonymized_turn<R: Rng + ?Sized>(
    store: &dyn VoteStore,
    roster: &Roster,
    turn_id: Uuid,
    rng: &mut R,
) -> Result<AnonymizedTurn, VotingError> {
    let turn = store
        .get_turn(&turn_id)?
        .ok_or(VotingError::TurnNotFound(turn_id))?;

    let assignment = ensure_assignment(store, roster, turn_id, rng)?;
    let responses = store.get_responses_for_turn(&turn_id)?;

    let mut anonymized = Vec::with_capacity(assignment.len());
    for row in &assignment {
        let response = responses
            .iter()
            .find(|r| r.id == row.response_id)
            .ok_or_else(|| {
                StoreError::NotFound(format!("response {} for assignment", row.response_id))
            })?;
        anonymized.push(AnonymizedResponse {
            position: row.position,
            text: response.response_text.clone(),
        });
    }
    anonymized.sort_by_key(|r| r.position);

    Ok(AnonymizedTurn {
        turn_id,
        turn_number: turn.turn_number,
        prompt: turn.user_prompt,
        responses: anonymized,
    })
}

// ---------------------------------------------------------------------------
// Vote Recorder — at most one vote per (turn, session)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct VoteRequest {
    pub turn_id: Uuid,
    pub position: Position,
    pub voter_session: VoterSession,
    pub notes: Option<String>,
}

/// Outcome of a vote submission. `AlreadyVoted` and `LimitReached` are
/// expected conditions, not errors.
#[derive(Debug, Clone)]
pub enum VoteOutcome {
    Accepted(Vote),
    /// The session already voted on this turn; carries the prior choice so
    /// the caller can show it instead of an error.
    AlreadyVoted(Vote),
    LimitReached { cap: u32 },
}

/// Record a vote, enforcing the per-(turn, session) uniqueness invariant
/// and the advisory session-wide cap.
///
/// A duplicate is reported before the cap: a capped session re-voting a
/// turn it already voted gets `AlreadyVoted`, the more specific outcome.
/// The uniqueness check rides on the store's constraint, so of two racing
/// submissions exactly one is `Accepted`.
pub fn record_vote(
    store: &dyn VoteStore,
    request: VoteRequest,
    session_vote_cap: u32,
) -> Result<VoteOutcome, VotingError> {
    if store.get_turn(&request.turn_id)?.is_none() {
        return Err(VotingError::TurnNotFound(request.turn_id));
    }

    let assignment = store.get_assignment(&request.turn_id)?;
    let position_assigned = assignment.iter().any(|row| row.position == request.position);
    if !position_assigned {
        return Err(VoteRejection::PositionNotAssigned {
            position: request.position,
        }
        .into());
    }

    if let Some(prior) = store.get_vote(&request.turn_id, &request.voter_session)? {
        return Ok(VoteOutcome::AlreadyVoted(prior));
    }

    // Check-then-insert: two racing votes from one session on different
    // turns can overshoot the cap by one. The cap is advisory, so that is
    // tolerated rather than locked against.
    if store.count_votes_for_session(&request.voter_session)? >= u64::from(session_vote_cap) {
        return Ok(VoteOutcome::LimitReached {
            cap: session_vote_cap,
        });
    }

    let vote = Vote {
        id: Uuid::new_v4(),
        turn_id: request.turn_id,
        position: request.position,
        voter_session: request.voter_session.clone(),
        notes: request.notes,
        created_at: Utc::now(),
    };

    match store.insert_vote(&vote)? {
        InsertOutcome::Inserted => Ok(VoteOutcome::Accepted(vote)),
        InsertOutcome::Duplicate => {
            // Lost a racing submission after the pre-check; surface the
            // winner's vote exactly as in the non-racing duplicate path.
            let prior = store
                .get_vote(&request.turn_id, &request.voter_session)?
                .ok_or_else(|| {
                    StoreError::NotFound(format!(
                        "vote for turn {} session {}",
                        request.turn_id, request.voter_session
                    ))
                })?;
            Ok(VoteOutcome::AlreadyVoted(prior))
        }
    }
}

// ---------------------------------------------------------------------------
// Result Aggregator — de-anonymizes only at aggregation time
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ResultSummary {
    pub total_votes: u64,
    pub tallies: Vec<ModelTally>,
}

/// Per-model counts and win rates for one conversation or for everything.
///
/// Recomputed from persisted rows on every call; no running tally is
/// authoritative.
pub fn aggregate_results(
    store: &dyn VoteStore,
    roster: &Roster,
    conversation_id: Option<Uuid>,
) -> Result<ResultSummary, VotingError> {
    if let Some(conversation_id) = conversation_id {
        if store.get_conversation(&conversation_id)?.is_none() {
            return Err(VotingError::ConversationNotFound(conversation_id));
        }
    }

    let cast_order = store.vote_models(conversation_id.as_ref())?;
    let tallies = tally_votes(roster, &cast_order);

    Ok(ResultSummary {
        total_votes: cast_order.len() as u64,
        tallies,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
