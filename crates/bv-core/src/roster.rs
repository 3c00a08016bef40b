use crate::{ModelId, Position, RosterError};

// ---------------------------------------------------------------------------
// Roster — the fixed set of models expected to answer every turn
// ---------------------------------------------------------------------------

/// Validated roster of competing models.
///
/// Every turn must carry exactly one response per roster model, and the
/// roster size determines which position labels are in play.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Roster {
    models: Vec<ModelId>,
}

impl Roster {
    pub fn new(models: Vec<ModelId>) -> Result<Self, RosterError> {
        if models.is_empty() {
            return Err(RosterError::Empty);
        }
        if models.len() > Position::MAX_LABELS {
            return Err(RosterError::TooLarge {
                size: models.len(),
                max: Position::MAX_LABELS,
            });
        }
        for (index, model) in models.iter().enumerate() {
            if models[..index].contains(model) {
                return Err(RosterError::DuplicateModel {
                    model: model.clone(),
                });
            }
        }
        Ok(Self { models })
    }

    pub fn size(&self) -> usize {
        self.models.len()
    }

    pub fn models(&self) -> &[ModelId] {
        &self.models
    }

    pub fn contains(&self, model: &ModelId) -> bool {
        self.models.contains(model)
    }

    pub fn index_of(&self, model: &ModelId) -> Option<usize> {
        self.models.iter().position(|m| m == model)
    }

    /// The label alphabet in play for this roster: the first K labels.
    pub fn labels(&self) -> &'static [Position] {
        Position::first(self.size())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn four_models() -> Vec<ModelId> {
        vec![
            ModelId::new("google/gemini-2.5-pro"),
            ModelId::new("anthropic/claude-sonnet-4.5"),
            ModelId::new("openai/gpt-4.1"),
            ModelId::new("openai/gpt-5"),
        ]
    }

    #[test]
    fn test_valid_roster() {
        let roster = Roster::new(four_models()).expect("valid roster");
        assert_eq!(roster.size(), 4);
        assert_eq!(
            roster.labels(),
            &[Position::A, Position::B, Position::C, Position::D]
        );
        assert!(roster.contains(&ModelId::new("openai/gpt-5")));
        assert!(!roster.contains(&ModelId::new("mistral/large")));
        assert_eq!(roster.index_of(&ModelId::new("openai/gpt-4.1")), Some(2));
    }

    #[test]
    fn test_empty_roster_rejected() {
        assert!(matches!(Roster::new(vec![]), Err(RosterError::Empty)));
    }

    #[test]
    fn test_duplicate_model_rejected() {
        let mut models = four_models();
        models.push(ModelId::new("openai/gpt-5"));
        match Roster::new(models) {
            Err(RosterError::DuplicateModel { model }) => {
                assert_eq!(model.as_str(), "openai/gpt-5");
            }
            other => panic!("expected DuplicateModel, got {other:?}"),
        }
    }

    #[test]
    fn test_oversized_roster_rejected() {
        let models = (0..7).map(|i| ModelId::new(format!("model-{i}"))).collect();
        match Roster::new(models) {
            Err(RosterError::TooLarge { size, max }) => {
                assert_eq!(size, 7);
                assert_eq!(max, 6);
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }
}
