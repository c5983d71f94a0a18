//! Block persistence on an embedded sled tree, keyed by block hash.

use std::collections::HashMap;
use std::path::Path;

use log::debug;
use thiserror::Error;

use crate::blockchain::{Block, LightHeader};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Sled(#[from] sled::Error),
    #[error("corrupt block record: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Block store. Each write is flushed before returning.
#[derive(Clone)]
pub struct BlockStore {
    db: sled::Db,
}

impl BlockStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Throwaway store removed on drop.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    pub fn put(&self, block: &Block) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(block)?;
        self.db.insert(block.hash.as_bytes(), bytes)?;
        self.db.flush()?;
        debug!("STORE - saved block #{} {}", block.index, block.hash);
        Ok(())
    }

    pub fn get(&self, hash: &str) -> Result<Option<Block>, StoreError> {
        match self.db.get(hash.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every stored block, in key (hash) order.
    pub fn iter_all(&self) -> Result<Vec<Block>, StoreError> {
        self.db
            .iter()
            .map(|entry| -> Result<Block, StoreError> {
                let (_key, bytes) = entry?;
                Ok(serde_json::from_slice(&bytes)?)
            })
            .collect()
    }

    pub fn headers(&self) -> Result<Vec<LightHeader>, StoreError> {
        Ok(self.iter_all()?.iter().map(LightHeader::from).collect())
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// Rebuild the heaviest linked chain out of everything stored.
    ///
    /// The store keeps every block ever saved, including abandoned forks, so
    /// blocks are linked by `prev_hash` from roots with an empty `prev_hash`
    /// and the tip with the greatest cumulative difficulty wins.
    pub fn load_best_chain(&self) -> Result<Vec<Block>, StoreError> {
        let mut blocks = self.iter_all()?;
        blocks.sort_by_key(|b| b.index);

        // hash -> (cumulative difficulty, parent hash)
        let mut weight: HashMap<String, (u64, Option<String>)> = HashMap::new();
        let mut best: Option<(u64, String)> = None;
        for b in &blocks {
            let parent = if b.prev_hash.is_empty() {
                Some((0, None))
            } else {
                weight
                    .get(&b.prev_hash)
                    .map(|(w, _)| (*w, Some(b.prev_hash.clone())))
            };
            let Some((parent_weight, parent_hash)) = parent else {
                continue;
            };
            if !b.has_valid_hash() {
                continue;
            }
            let w = parent_weight + u64::from(b.difficulty);
            weight.insert(b.hash.clone(), (w, parent_hash));
            if best.as_ref().is_none_or(|(bw, _)| w > *bw) {
                best = Some((w, b.hash.clone()));
            }
        }

        let by_hash: HashMap<&str, &Block> = blocks.iter().map(|b| (b.hash.as_str(), b)).collect();
        let mut chain = Vec::new();
        let mut cursor = best.map(|(_, h)| h);
        while let Some(hash) = cursor {
            let Some(block) = by_hash.get(hash.as_str()) else {
                break;
            };
            chain.push((*block).clone());
            cursor = weight.get(&hash).and_then(|(_, p)| p.clone());
        }
        chain.reverse();
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{Payloads, is_valid_chain};
    use crate::transaction::TransactionPool;

    fn mined(index: u64, prev: &str, tag: &str, difficulty: u32) -> Block {
        Block::create(
            index,
            prev,
            "one-to-one",
            &["ReceiverA".to_string()],
            &Payloads::new(tag, "", ""),
            &TransactionPool::new(),
            difficulty,
            "Miner1",
            12.5,
        )
    }

    #[test]
    fn put_then_get() {
        let store = BlockStore::temporary().unwrap();
        let b = mined(0, "", "g", 1);
        store.put(&b).unwrap();
        assert_eq!(store.get(&b.hash).unwrap(), Some(b.clone()));
        assert_eq!(store.get("missing").unwrap(), None);
        assert_eq!(store.headers().unwrap(), vec![b.header()]);
    }

    #[test]
    fn rewriting_a_block_keeps_one_entry() {
        let store = BlockStore::temporary().unwrap();
        let mut b = mined(0, "", "g", 1);
        store.put(&b).unwrap();
        let sub = Block::sub_block(&b, &Payloads::new("edit", "", ""), "text");
        b.sub_blocks.push(sub);
        store.put(&b).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&b.hash).unwrap().unwrap().sub_blocks.len(), 1);
    }

    #[test]
    fn best_chain_follows_heaviest_fork() {
        let store = BlockStore::temporary().unwrap();
        let genesis = mined(0, "", "g", 1);
        let light = mined(1, &genesis.hash, "light", 1);
        let heavy = mined(1, &genesis.hash, "heavy", 2);
        let heavy_next = mined(2, &heavy.hash, "next", 1);
        let orphan = mined(5, "unknown-parent", "orphan", 3);
        for b in [&genesis, &light, &heavy, &heavy_next, &orphan] {
            store.put(b).unwrap();
        }

        let chain = store.load_best_chain().unwrap();
        assert_eq!(chain, vec![genesis, heavy, heavy_next]);
        assert!(is_valid_chain(&chain));
    }

    #[test]
    fn empty_store_loads_empty_chain() {
        let store = BlockStore::temporary().unwrap();
        assert!(store.is_empty());
        assert!(store.load_best_chain().unwrap().is_empty());
    }
}
