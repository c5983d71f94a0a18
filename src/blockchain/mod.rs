pub mod block;
pub mod consensus;
pub mod difficulty;
pub mod error;
pub mod ledger;
pub mod model;
pub mod prune;
pub mod shard;
pub mod validation;

pub use block::{Block, LightHeader, Payloads, meets_difficulty};
pub use consensus::{CandidateBlock, HybridConsensusManager};
pub use difficulty::adjust_difficulty;
pub use error::ChainError;
pub use ledger::{Ledger, LedgerError};
pub use model::Blockchain;
pub use shard::Beacon;
pub use validation::{cumulative_difficulty, is_valid_chain, is_valid_window};

/// Category of every top-level block.
pub const MAIN_CATEGORY: &str = "main";

/// Default Proof-of-Work difficulty (number of leading zeros).
pub const DEFAULT_DIFFICULTY: u32 = 3;

/// Coinbase reward per block (dev value).
pub const BASE_REWARD: f64 = 12.5;

/// Appending past this many blocks triggers automatic pruning.
pub const MAX_CHAIN_LEN: usize = 100;

/// Blocks kept in memory after automatic pruning.
pub const AUTO_PRUNE_RETAIN: usize = 50;

/// File label for automatic archives.
pub const AUTO_PRUNE_LABEL: &str = "archive";
