use std::collections::HashMap;
use std::sync::Mutex;

use log::{info, warn};
use serde::Serialize;

use super::Block;

/// Fraction of total stake whose approvals finalize a candidate.
pub const VOTE_THRESHOLD: f64 = 0.67;

/// Each unit of stake counts as this many vote points.
pub const VOTE_SCALE: f64 = 100.0;

/// A PoW-mined block awaiting stake votes.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateBlock {
    pub block: Block,
    /// The block's nonce, reported as a proxy for work. Never compared.
    pub work: u64,
    pub valid_votes: u64,
}

#[derive(Debug, Default)]
struct Inner {
    candidates: Vec<CandidateBlock>,
    stakeholders: HashMap<String, f64>,
}

/// Stake-weighted finality gate on top of PoW proposals.
///
/// Candidates are only ever appended and tallies only grow. All operations
/// lock the same mutex, so proposals and votes arriving from different
/// network tasks are applied one at a time.
#[derive(Debug)]
pub struct HybridConsensusManager {
    inner: Mutex<Inner>,
    vote_threshold: f64,
}

impl Default for HybridConsensusManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HybridConsensusManager {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            vote_threshold: VOTE_THRESHOLD,
        }
    }

    pub fn set_stake(&self, validator: &str, stake: f64) {
        let mut inner = self.inner.lock().expect("mutex poisoned");
        inner.stakeholders.insert(validator.to_string(), stake);
    }

    pub fn total_stake(&self) -> f64 {
        let inner = self.inner.lock().expect("mutex poisoned");
        inner.stakeholders.values().sum()
    }

    /// Register `block` as a new candidate with no votes. Returns its index.
    pub fn propose_block(&self, block: Block) -> usize {
        let mut inner = self.inner.lock().expect("mutex poisoned");
        info!(
            "CONSENSUS - block proposed: {} with work {}",
            block.hash, block.nonce
        );
        inner.candidates.push(CandidateBlock {
            work: block.nonce,
            block,
            valid_votes: 0,
        });
        inner.candidates.len() - 1
    }

    /// Record a vote. An approval adds `stake * VOTE_SCALE` to the
    /// candidate's tally; a rejection changes nothing. Unknown candidates or
    /// validators are logged and ignored. Returns whether the tally changed.
    pub fn cast_vote(&self, candidate_index: usize, validator: &str, approve: bool) -> bool {
        let mut inner = self.inner.lock().expect("mutex poisoned");
        if candidate_index >= inner.candidates.len() {
            warn!("CONSENSUS - invalid candidate index {candidate_index}");
            return false;
        }
        let Some(&stake) = inner.stakeholders.get(validator) else {
            warn!("CONSENSUS - validator {validator} has no stake");
            return false;
        };
        if !approve {
            return false;
        }
        let points = (stake * VOTE_SCALE) as u64;
        inner.candidates[candidate_index].valid_votes += points;
        true
    }

    /// First candidate, in proposal order, whose tally reaches
    /// `total_stake * VOTE_SCALE * threshold`.
    pub fn finalize_block(&self, total_stake: f64) -> Option<Block> {
        let inner = self.inner.lock().expect("mutex poisoned");
        let threshold = (total_stake * VOTE_SCALE * self.vote_threshold).round() as u64;
        let candidate = inner
            .candidates
            .iter()
            .find(|c| c.valid_votes >= threshold)?;
        info!(
            "CONSENSUS - finalizing block {} with votes {} (threshold {})",
            candidate.block.hash, candidate.valid_votes, threshold
        );
        Some(candidate.block.clone())
    }

    pub fn candidates(&self) -> Vec<CandidateBlock> {
        let inner = self.inner.lock().expect("mutex poisoned");
        inner.candidates.clone()
    }
}
