// REFERENCE QUORUM ENGINE
// Linear quorum counting over a single chain of candidates
//
// SAFETY INVARIANTS:
// 1. A candidate becomes Accepted once its tally reaches `alpha` votes
// 2. The last-accepted pointer only moves to a strictly greater height
// 3. Genesis (zero ID, height 0) is Accepted from start()
// 4. Every mutation happens under one write lock, so concurrent callers
//    observe a consistent tally/status/pointer triple
//
// KNOWN LIMITATION: votes are not deduplicated by voter and two conflicting
// candidates at the same height can both reach the raw count. Validator
// weighting belongs to a FinalityPolicy, not to this engine.

use crate::config::{EngineConfig, SequencerConfig};
use crate::engine::{AcceptanceEngine, EngineError, EngineStats, Status};
use crate::scoring::{BatchScorer, ScoreInput};
use log::{debug, info, warn};
use parking_lot::RwLock;
use seqnet_core::{Candidate, Identifier, ValidatorSet, Vote};
use std::collections::HashMap;
use std::sync::Arc;

struct Entry {
    candidate: Candidate,
    status: Status,
    votes: Vec<Vote>,
}

struct ChainState {
    running: bool,
    entries: HashMap<Identifier, Entry>,
    last_accepted: Identifier,
    height: u64,
    stats: EngineStats,
}

impl ChainState {
    fn ensure_running(&self) -> Result<(), EngineError> {
        if self.running {
            Ok(())
        } else {
            Err(EngineError::NotStarted)
        }
    }

    /// Append a vote to a known candidate, accepting it at quorum.
    fn tally(&mut self, vote: &Vote, alpha: usize) {
        let Some(entry) = self.entries.get_mut(&vote.candidate_id) else {
            return;
        };
        entry.votes.push(vote.clone());
        self.stats.votes_processed += 1;

        if entry.status != Status::Processing || entry.votes.len() < alpha {
            return;
        }
        entry.status = Status::Accepted;
        let height = entry.candidate.height;
        self.stats.accepted += 1;

        if height > self.height {
            self.height = height;
            self.last_accepted = vote.candidate_id;
            info!(
                "Candidate {} accepted at height {} ({} votes), now preferred",
                vote.candidate_id, height, alpha
            );
        } else {
            info!(
                "Candidate {} accepted at height {} (not above preferred height {})",
                vote.candidate_id, height, self.height
            );
        }
    }
}

/// Reference [`AcceptanceEngine`].
pub struct Chain {
    config: EngineConfig,
    scorer: Option<Arc<dyn BatchScorer>>,
    state: RwLock<ChainState>,
}

impl Chain {
    pub fn new(config: EngineConfig) -> Self {
        Chain {
            config,
            scorer: None,
            state: RwLock::new(ChainState {
                running: false,
                entries: HashMap::new(),
                last_accepted: Identifier::ZERO,
                height: 0,
                stats: EngineStats::default(),
            }),
        }
    }

    /// Engine whose quorum is `ceil(alpha * k)` of the sequencer config.
    pub fn from_sequencer(config: &SequencerConfig) -> Result<Self, EngineError> {
        Ok(Self::new(EngineConfig::from_sequencer(config)?))
    }

    /// Inject a batch-scoring strategy for `record_votes`.
    pub fn with_scorer(mut self, scorer: Arc<dyn BatchScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Candidate registered under `candidate_id`, if any.
    pub fn candidate(&self, candidate_id: &Identifier) -> Option<Candidate> {
        self.state
            .read()
            .entries
            .get(candidate_id)
            .map(|e| e.candidate.clone())
    }

    /// Mask of votes to tally; all-true when no scorer is set or it declines.
    fn score(&self, votes: &[Vote]) -> Vec<bool> {
        let Some(scorer) = &self.scorer else {
            return vec![true; votes.len()];
        };
        let inputs: Vec<ScoreInput> = votes.iter().map(ScoreInput::from).collect();
        match scorer.score(&inputs) {
            Some(mask) if mask.len() == votes.len() => mask,
            Some(mask) => {
                warn!(
                    "Batch scorer returned {} results for {} votes, tallying all",
                    mask.len(),
                    votes.len()
                );
                vec![true; votes.len()]
            }
            None => vec![true; votes.len()],
        }
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl AcceptanceEngine for Chain {
    fn start(&self) {
        let mut state = self.state.write();
        if state.running {
            return;
        }
        state.entries.entry(Identifier::ZERO).or_insert_with(|| Entry {
            candidate: Candidate::genesis(),
            status: Status::Accepted,
            votes: Vec::new(),
        });
        state.running = true;
        info!(
            "Chain engine started (k={}, alpha={}, preferred={})",
            self.config.k, self.config.alpha, state.last_accepted
        );
    }

    fn stop(&self) {
        let mut state = self.state.write();
        if state.running {
            state.running = false;
            info!("Chain engine stopped at height {}", state.height);
        }
    }

    fn is_running(&self) -> bool {
        self.state.read().running
    }

    fn add(&self, candidate: Candidate) -> Result<(), EngineError> {
        let mut state = self.state.write();
        state.ensure_running()?;
        if state.entries.contains_key(&candidate.id) {
            return Ok(());
        }
        debug!("Candidate {} added at height {}", candidate.id, candidate.height);
        state.entries.insert(
            candidate.id,
            Entry {
                candidate,
                status: Status::Processing,
                votes: Vec::new(),
            },
        );
        state.stats.candidates_added += 1;
        Ok(())
    }

    fn record_vote(&self, vote: &Vote) -> Result<(), EngineError> {
        let mut state = self.state.write();
        state.ensure_running()?;
        if !state.entries.contains_key(&vote.candidate_id) {
            return Err(EngineError::CandidateNotFound(vote.candidate_id));
        }
        state.tally(vote, self.config.alpha);
        Ok(())
    }

    fn record_votes(&self, votes: &[Vote]) -> Result<usize, EngineError> {
        let mask = self.score(votes);

        let mut state = self.state.write();
        state.ensure_running()?;
        // The whole batch is checked first so a bad vote leaves no partial tally
        if let Some(unknown) = votes
            .iter()
            .find(|v| !state.entries.contains_key(&v.candidate_id))
        {
            return Err(EngineError::CandidateNotFound(unknown.candidate_id));
        }

        let mut tallied = 0;
        for (vote, keep) in votes.iter().zip(mask) {
            if keep {
                state.tally(vote, self.config.alpha);
                tallied += 1;
            }
        }
        debug!("Batch of {} votes, {} tallied", votes.len(), tallied);
        Ok(tallied)
    }

    fn reject(&self, candidate_id: &Identifier) -> Result<Status, EngineError> {
        let mut state = self.state.write();
        state.ensure_running()?;
        let entry = state
            .entries
            .get_mut(candidate_id)
            .ok_or(EngineError::CandidateNotFound(*candidate_id))?;
        if entry.status != Status::Processing {
            return Ok(entry.status);
        }
        entry.status = Status::Rejected;
        state.stats.rejected += 1;
        info!("Candidate {} rejected", candidate_id);
        Ok(Status::Rejected)
    }

    fn poll(&self, validators: &ValidatorSet) -> Result<usize, EngineError> {
        let mut state = self.state.write();
        state.ensure_running()?;
        state.stats.polls_completed += 1;
        let processing = state
            .entries
            .values()
            .filter(|e| e.status == Status::Processing)
            .count();
        debug!(
            "Poll {} over {} validators (epoch {}): {} candidates processing",
            state.stats.polls_completed,
            validators.len(),
            validators.epoch,
            processing
        );
        Ok(processing)
    }

    fn is_accepted(&self, candidate_id: &Identifier) -> bool {
        self.status(candidate_id) == Status::Accepted
    }

    fn status(&self, candidate_id: &Identifier) -> Status {
        self.state
            .read()
            .entries
            .get(candidate_id)
            .map(|e| e.status)
            .unwrap_or(Status::Unknown)
    }

    fn tally(&self, candidate_id: &Identifier) -> Option<usize> {
        self.state.read().entries.get(candidate_id).map(|e| e.votes.len())
    }

    fn preference(&self) -> Identifier {
        self.state.read().last_accepted
    }

    fn height(&self) -> u64 {
        self.state.read().height
    }

    fn stats(&self) -> EngineStats {
        self.state.read().stats
    }
}
