use log::info;
use sha2::{Digest, Sha256};

use super::Blockchain;
use crate::transaction::Transaction;

/// One partition with its own independently rooted chain.
#[derive(Debug)]
pub struct Shard {
    pub id: usize,
    pub blockchain: Blockchain,
}

/// Fixed set of shards created at startup.
#[derive(Debug)]
pub struct Beacon {
    shards: Vec<Shard>,
}

impl Beacon {
    /// A beacon always has at least one shard.
    pub fn new(num_shards: usize) -> Self {
        let shards = (0..num_shards.max(1))
            .map(|id| Shard {
                id,
                blockchain: Blockchain::new(),
            })
            .collect();
        Self { shards }
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    /// First byte of SHA-256(sender) modulo the shard count.
    pub fn assign_shard(&self, tx: &Transaction) -> usize {
        let digest = Sha256::digest(tx.sender.as_bytes());
        usize::from(digest[0]) % self.shards.len()
    }

    /// Decide the shard for `tx` and log it. Nothing is executed on the shard.
    pub fn route(&self, tx: &Transaction) -> usize {
        let id = self.assign_shard(tx);
        info!("SHARD - transaction from {} routed to shard {}", tx.sender, id);
        id
    }
}
