use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::validation::{cumulative_difficulty, is_valid_window, should_replace};
use super::{
    AUTO_PRUNE_LABEL, AUTO_PRUNE_RETAIN, Block, ChainError, LightHeader, MAX_CHAIN_LEN, Payloads,
};

/// In-memory chain of blocks. Owns its blocks; pruned history is written to
/// `archive_dir`.
#[derive(Debug, Clone)]
pub struct Blockchain {
    pub chain: Vec<Block>,
    archive_dir: PathBuf,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Empty chain archiving into the working directory.
    pub fn new() -> Self {
        Self::with_archive_dir(".")
    }

    pub fn with_archive_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            chain: Vec::new(),
            archive_dir: dir.into(),
        }
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn last_block(&self) -> Option<&Block> {
        self.chain.last()
    }

    /// Index and hash a new block must build on: `(0, "")` for an empty chain.
    pub fn next_link(&self) -> (u64, String) {
        match self.chain.last() {
            Some(tip) => (tip.index + 1, tip.hash.clone()),
            None => (0, String::new()),
        }
    }

    /// Append `block`. Once the chain grows past `MAX_CHAIN_LEN` the oldest
    /// blocks are archived; a failed archive is logged and the chain is kept.
    pub fn append_block(&mut self, block: Block) {
        self.chain.push(block);
        if self.chain.len() > MAX_CHAIN_LEN {
            if let Err(e) = self.prune_and_archive(AUTO_PRUNE_RETAIN, AUTO_PRUNE_LABEL) {
                warn!("PRUNE - automatic pruning failed: {e}");
            }
        }
    }

    /// Mine a sub-block amending the block at `parent_index` and attach it.
    /// The parent's own fields and hash are untouched.
    pub fn append_sub_block(
        &mut self,
        parent_index: usize,
        payloads: &Payloads,
        category: &str,
    ) -> Result<&Block, ChainError> {
        let len = self.chain.len();
        let parent = self
            .chain
            .get_mut(parent_index)
            .ok_or(ChainError::ParentOutOfRange {
                index: parent_index,
                len,
            })?;
        let sub = Block::sub_block(parent, payloads, category);
        debug!(
            "CHAIN - sub-block {} ({}) attached to block #{}",
            sub.hash, sub.category, parent.index
        );
        parent.sub_blocks.push(sub);
        Ok(&*parent)
    }

    /// Linear scan by hash.
    pub fn find_by_hash(&self, hash: &str) -> Result<&Block, ChainError> {
        self.chain
            .iter()
            .find(|b| b.hash == hash)
            .ok_or_else(|| ChainError::BlockNotFound(hash.to_string()))
    }

    pub fn sub_blocks(&self, hash: &str) -> Result<&[Block], ChainError> {
        Ok(&self.find_by_hash(hash)?.sub_blocks)
    }

    pub fn headers(&self) -> Vec<LightHeader> {
        self.chain.iter().map(LightHeader::from).collect()
    }

    pub fn cumulative_difficulty(&self) -> u64 {
        cumulative_difficulty(&self.chain)
    }

    /// Validity of the blocks currently held. After pruning the first block
    /// links outside memory, so only the retained window is checked.
    pub fn is_valid(&self) -> bool {
        is_valid_window(&self.chain)
    }

    /// Adopt `candidate` if it is a valid chain with strictly more cumulative
    /// difficulty than ours.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> bool {
        if !should_replace(&self.chain, &candidate) {
            return false;
        }
        self.chain = candidate;
        true
    }
}
