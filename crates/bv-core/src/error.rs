use crate::{ModelId, Position};

// ---------------------------------------------------------------------------
// RosterError — configuration-time roster validation failures
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("roster must contain at least one model")]
    Empty,
    #[error("duplicate model in roster: {model}")]
    DuplicateModel { model: ModelId },
    #[error("roster has {size} models but only {max} position labels exist")]
    TooLarge { size: usize, max: usize },
}

// ---------------------------------------------------------------------------
// AssignError — a turn's responses cannot be mapped onto the roster
// ---------------------------------------------------------------------------

/// Assignment fails fast on any roster mismatch: a partial or skewed label
/// set would silently bias the blind comparison.
#[derive(Debug, thiserror::Error)]
pub enum AssignError {
    #[error("turn has {actual} responses but the roster expects {expected}")]
    ResponseCountMismatch { expected: usize, actual: usize },
    #[error("response model {model} is not in the configured roster")]
    ModelNotInRoster { model: ModelId },
    #[error("turn has more than one response from model {model}")]
    DuplicateResponseModel { model: ModelId },
}

// ---------------------------------------------------------------------------
// VoteRejection — per-request vote validation failures
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum VoteRejection {
    #[error("voter session must be a non-empty string")]
    EmptySession,
    #[error("position {position} is not assigned for this turn")]
    PositionNotAssigned { position: Position },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
