use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::MAIN_CATEGORY;
use crate::transaction::{Transaction, TransactionPool};

/// Encrypted payloads carried by a block. Opaque to the node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payloads {
    pub text: String,
    pub audio: String,
    pub video: String,
}

impl Payloads {
    pub fn new(text: &str, audio: &str, video: &str) -> Self {
        Self {
            text: text.to_string(),
            audio: audio.to_string(),
            video: video.to_string(),
        }
    }
}

/// A single block. Field names are the wire and storage format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: i64, // Unix timestamp (UTC)
    pub prev_hash: String,
    pub hash: String,
    pub nonce: u64, // Proof-of-Work nonce
    pub relationship_type: String,
    pub receivers: Vec<String>,
    pub text_data: String,
    pub audio_data: String,
    pub video_data: String,
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub sub_blocks: Vec<Block>,
    pub difficulty: u32,
    pub category: String,
}

/// Reduced projection of a block for light clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightHeader {
    pub index: u64,
    pub timestamp: i64,
    pub prev_hash: String,
    pub hash: String,
    pub difficulty: u32,
    pub nonce: u64,
}

impl From<&Block> for LightHeader {
    fn from(b: &Block) -> Self {
        Self {
            index: b.index,
            timestamp: b.timestamp,
            prev_hash: b.prev_hash.clone(),
            hash: b.hash.clone(),
            difficulty: b.difficulty,
            nonce: b.nonce,
        }
    }
}

impl Block {
    /// Build the unmined shell of a top-level block: the coinbase crediting
    /// `miner_address` goes first, followed by the pool's transactions.
    /// The pool itself is left untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        index: u64,
        prev_hash: &str,
        relationship_type: &str,
        receivers: &[String],
        payloads: &Payloads,
        pool: &TransactionPool,
        difficulty: u32,
        miner_address: &str,
        reward: f64,
    ) -> Self {
        let mut transactions = Vec::with_capacity(pool.len() + 1);
        transactions.push(Transaction::coinbase(miner_address, reward));
        transactions.extend_from_slice(pool.transactions());

        let mut block = Self {
            index,
            timestamp: Utc::now().timestamp(),
            prev_hash: prev_hash.to_string(),
            hash: String::new(),
            nonce: 0,
            relationship_type: relationship_type.to_string(),
            receivers: receivers.to_vec(),
            text_data: payloads.text.clone(),
            audio_data: payloads.audio.clone(),
            video_data: payloads.video.clone(),
            transactions,
            sub_blocks: Vec::new(),
            difficulty,
            category: MAIN_CATEGORY.to_string(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// Assemble and mine a top-level block. Blocks until PoW is found.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        index: u64,
        prev_hash: &str,
        relationship_type: &str,
        receivers: &[String],
        payloads: &Payloads,
        pool: &TransactionPool,
        difficulty: u32,
        miner_address: &str,
        reward: f64,
    ) -> Self {
        let mut block = Self::assemble(
            index,
            prev_hash,
            relationship_type,
            receivers,
            payloads,
            pool,
            difficulty,
            miner_address,
            reward,
        );
        block.mine(difficulty);
        block
    }

    /// Build and mine an amendment to `parent` at difficulty 1.
    pub fn sub_block(parent: &Block, payloads: &Payloads, category: &str) -> Self {
        let mut sub = Self {
            index: parent.index,
            timestamp: Utc::now().timestamp(),
            prev_hash: parent.hash.clone(),
            hash: String::new(),
            nonce: 0,
            relationship_type: parent.relationship_type.clone(),
            receivers: parent.receivers.clone(),
            text_data: payloads.text.clone(),
            audio_data: payloads.audio.clone(),
            video_data: payloads.video.clone(),
            transactions: Vec::new(),
            sub_blocks: Vec::new(),
            difficulty: 1,
            category: category.to_string(),
        };
        sub.mine(sub.difficulty);
        sub.hash = sub.compute_hash();
        sub
    }

    /// SHA-256 over every hashed field (not `hash`, transactions or
    /// sub-blocks). Receivers are serialized as a JSON array.
    pub fn compute_hash(&self) -> String {
        let receivers = serde_json::to_string(&self.receivers).unwrap_or_default();
        let preimage = format!(
            "{}:{}:{}:{}:{}:{}:{}:{}:{}:{}:{}",
            self.index,
            self.timestamp,
            self.prev_hash,
            self.relationship_type,
            self.text_data,
            self.audio_data,
            self.video_data,
            receivers,
            self.difficulty,
            self.nonce,
            self.category
        );
        hex::encode(Sha256::digest(preimage.as_bytes()))
    }

    /// The stored hash matches a fresh recomputation.
    pub fn has_valid_hash(&self) -> bool {
        self.hash == self.compute_hash()
    }

    /// Perform Proof-of-Work by walking the nonce up from 0 until the hash
    /// starts with `difficulty` zero hex digits. Unbounded.
    pub fn mine(&mut self, difficulty: u32) {
        let never = AtomicBool::new(false);
        self.mine_cancellable(difficulty, &never);
    }

    /// Same search as [`Block::mine`], checking `cancel` between attempts.
    /// Returns `false` if the search was interrupted; the block is then not
    /// a valid solution.
    pub fn mine_cancellable(&mut self, difficulty: u32, cancel: &AtomicBool) -> bool {
        self.nonce = 0;
        loop {
            self.hash = self.compute_hash();
            if meets_difficulty(&self.hash, difficulty) {
                return true;
            }
            if cancel.load(Ordering::Relaxed) {
                return false;
            }
            self.nonce = self.nonce.wrapping_add(1);
        }
    }

    pub fn header(&self) -> LightHeader {
        LightHeader::from(self)
    }
}

/// `hash` has at least `difficulty` leading '0' characters.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let needed = difficulty as usize;
    hash.len() >= needed && hash.bytes().take(needed).all(|c| c == b'0')
}
