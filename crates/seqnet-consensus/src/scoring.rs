// BATCH SCORING
// Optional accelerator consulted by the engine's batch vote path

use seqnet_core::{Identifier, Vote};

/// One vote as seen by a scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreInput {
    pub voter_id: Identifier,
    pub candidate_id: Identifier,
    pub preference: bool,
}

impl From<&Vote> for ScoreInput {
    fn from(vote: &Vote) -> Self {
        ScoreInput {
            voter_id: vote.voter_id,
            candidate_id: vote.candidate_id,
            preference: vote.preference,
        }
    }
}

/// Strategy deciding which votes of a batch are tallied.
///
/// Returning `None`, or a result whose length differs from the input,
/// makes the engine fall back to tallying every vote.
pub trait BatchScorer: Send + Sync {
    fn score(&self, batch: &[ScoreInput]) -> Option<Vec<bool>>;
}

/// Tallies only votes whose preference is `true`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreferenceScorer;

impl BatchScorer for PreferenceScorer {
    fn score(&self, batch: &[ScoreInput]) -> Option<Vec<bool>> {
        Some(batch.iter().map(|input| input.preference).collect())
    }
}
