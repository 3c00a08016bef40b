use rand::seq::SliceRandom;
use rand::Rng;

use crate::{AssignError, ModelId, Position, Roster};

// ---------------------------------------------------------------------------
// Position assignment — uniform random bijection responses → labels
// ---------------------------------------------------------------------------

/// Draw a uniformly random bijection from a turn's responses onto the first
/// K position labels.
///
/// `models` lists the turn's responses in their original import order; the
/// returned labels align index-for-index with that slice. The turn must
/// carry exactly one response per roster model, otherwise no labels are
/// produced at all.
///
/// Randomness only needs to defeat evaluator bias, not an attacker with
/// database access, so any non-adversarial [`Rng`] is acceptable.
pub fn assign_positions<R: Rng + ?Sized>(
    roster: &Roster,
    models: &[ModelId],
    rng: &mut R,
) -> Result<Vec<Position>, AssignError> {
    validate_against_roster(roster, models)?;

    let mut labels: Vec<Position> = roster.labels().to_vec();
    labels.shuffle(rng);
    Ok(labels)
}

/// Check that `models` is exactly the roster, one response per model.
pub fn validate_against_roster(roster: &Roster, models: &[ModelId]) -> Result<(), AssignError> {
    if models.len() != roster.size() {
        return Err(AssignError::ResponseCountMismatch {
            expected: roster.size(),
            actual: models.len(),
        });
    }

    for (index, model) in models.iter().enumerate() {
        if !roster.contains(model) {
            return Err(AssignError::ModelNotInRoster {
                model: model.clone(),
            });
        }
        if models[..index].contains(model) {
            return Err(AssignError::DuplicateResponseModel {
                model: model.clone(),
            });
        }
    }

    // Equal length, all members, no duplicates: this is the roster exactly.
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
