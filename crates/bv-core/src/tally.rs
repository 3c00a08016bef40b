use std::collections::HashMap;

use serde::Serialize;

use crate::{ModelId, Roster};

// ---------------------------------------------------------------------------
// ModelTally — aggregated per-model standing
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModelTally {
    pub model: ModelId,
    pub votes: u64,
    /// Share of all votes in scope, 0.0 when no votes were cast.
    pub win_rate: f64,
}

// ---------------------------------------------------------------------------
// tally_votes — rank roster models from de-anonymized vote records
// ---------------------------------------------------------------------------

/// Aggregate de-anonymized votes into a ranked per-model tally.
///
/// `cast_order` lists the model behind each vote, ordered by the time the
/// vote was cast. Ranking is by total vote count descending; ties break in
/// favor of the model that reached the tied count earliest. Roster models
/// with no votes appear with a zero count, in roster order, after every
/// model that received votes.
///
/// The result is a pure function of the vote records: recomputing from
/// scratch after any interleaving of the same votes yields the same counts.
pub fn tally_votes(roster: &Roster, cast_order: &[ModelId]) -> Vec<ModelTally> {
    let mut counts: HashMap<&ModelId, u64> = HashMap::new();
    // Index in the vote stream at which each model reached its final count.
    let mut reached_at: HashMap<&ModelId, usize> = HashMap::new();

    for (index, model) in cast_order.iter().enumerate() {
        *counts.entry(model).or_insert(0) += 1;
        reached_at.insert(model, index);
    }

    let total = cast_order.len() as u64;

    let mut tallies: Vec<(usize, usize, ModelTally)> = roster
        .models()
        .iter()
        .enumerate()
        .map(|(roster_index, model)| {
            let votes = counts.get(model).copied().unwrap_or(0);
            let win_rate = if total == 0 {
                0.0
            } else {
                votes as f64 / total as f64
            };
            let reached = reached_at.get(model).copied().unwrap_or(usize::MAX);
            (
                reached,
                roster_index,
                ModelTally {
                    model: model.clone(),
                    votes,
                    win_rate,
                },
            )
        })
        .collect();

    tallies.sort_by(|(reached_a, roster_a, a), (reached_b, roster_b, b)| {
        b.votes
            .cmp(&a.votes)
            .then(reached_a.cmp(reached_b))
            .then(roster_a.cmp(roster_b))
    });

    tallies.into_iter().map(|(_, _, tally)| tally).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Roster {
        Roster::new(vec![
            ModelId::new("google/gemini-2.5-pro"),
            ModelId::new("anthropic/claude-sonnet-4.5"),
            ModelId::new("openai/gpt-4.1"),
            ModelId::new("openai/gpt-5"),
        ])
        .expect("valid roster")
    }

    fn gemini() -> ModelId {
        ModelId::new("google/gemini-2.5-pro")
    }

    fn claude() -> ModelId {
        ModelId::new("anthropic/claude-sonnet-4.5")
    }

    fn gpt5() -> ModelId {
        ModelId::new("openai/gpt-5")
    }

    #[test]
    fn test_empty_votes_yield_zero_tallies_in_roster_order() {
        let tallies = tally_votes(&roster(), &[]);
        assert_eq!(tallies.len(), 4);
        for (tally, model) in tallies.iter().zip(roster().models()) {
            assert_eq!(&tally.model, model);
            assert_eq!(tally.votes, 0);
            assert_eq!(tally.win_rate, 0.0);
        }
    }

    #[test]
    fn test_single_vote_scenario() {
        let tallies = tally_votes(&roster(), &[gemini()]);
        assert_eq!(tallies[0].model, gemini());
        assert_eq!(tallies[0].votes, 1);
        assert_eq!(tallies[0].win_rate, 1.0);
        for tally in &tallies[1..] {
            assert_eq!(tally.votes, 0);
        }
    }

    #[test]
    fn test_counts_and_win_rates() {
        let votes = vec![claude(), gemini(), claude(), gpt5(), claude()];
        let tallies = tally_votes(&roster(), &votes);

        assert_eq!(tallies[0].model, claude());
        assert_eq!(tallies[0].votes, 3);
        assert!((tallies[0].win_rate - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tie_breaks_to_earliest_cumulative_adoption() {
        // gemini and claude both end at 2, but gemini hit 2 first.
        let votes = vec![gemini(), claude(), gemini(), claude()];
        let tallies = tally_votes(&roster(), &votes);

        assert_eq!(tallies[0].model, gemini());
        assert_eq!(tallies[1].model, claude());
        assert_eq!(tallies[0].votes, 2);
        assert_eq!(tallies[1].votes, 2);
    }

    #[test]
    fn test_counts_are_order_independent() {
        let forward = vec![gemini(), claude(), gpt5(), claude()];
        let mut reversed = forward.clone();
        reversed.reverse();

        let counts = |tallies: Vec<ModelTally>| {
            let mut pairs: Vec<(ModelId, u64)> =
                tallies.into_iter().map(|t| (t.model, t.votes)).collect();
            pairs.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
            pairs
        };

        assert_eq!(
            counts(tally_votes(&roster(), &forward)),
            counts(tally_votes(&roster(), &reversed))
        );
    }
}
