use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::blockchain::{
    Beacon, Block, Blockchain, ChainError, HybridConsensusManager, Ledger, Payloads,
    adjust_difficulty,
};
use crate::config::NodeConfig;
use crate::contract::ContractRegistry;
use crate::p2p::PeerList;
use crate::storage::{BlockStore, StoreError};
use crate::transaction::{Transaction, TransactionPool};
use crate::wallet::{SignatureError, verify_transaction};

const GENESIS_RELATIONSHIP: &str = "one-to-one";
const MINED_RELATIONSHIP: &str = "one-to-many";

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("coinbase transactions cannot be submitted")]
    Coinbase,
    #[error("amount must be positive")]
    InvalidAmount,
    #[error("signature check failed: {0}")]
    Signature(#[from] SignatureError),
    #[error("invalid transaction signature")]
    BadSignature,
    #[error("insufficient funds: {account} has {balance}, needs {amount}")]
    InsufficientFunds {
        account: String,
        balance: f64,
        amount: f64,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MineError {
    #[error("mining was cancelled")]
    Cancelled,
    #[error("chain tip moved while mining")]
    Stale,
}

/// Everything the node shares between the HTTP API, the P2P handlers and
/// the background tasks. Built once in `main` and handed out as an `Arc`.
pub struct AppState {
    pub config: NodeConfig,
    pub blockchain: RwLock<Blockchain>,
    pub ledger: Mutex<Ledger>,
    pub mempool: Mutex<TransactionPool>,
    pub consensus: HybridConsensusManager,
    pub peers: PeerList,
    pub contracts: ContractRegistry,
    pub beacon: Beacon,
    pub store: Option<BlockStore>,
    pub started_at: Instant,
    difficulty: AtomicU32,
    mining_jobs: Mutex<Vec<Arc<AtomicBool>>>,
}

impl AppState {
    /// Wire up every service from `config`, reloading the heaviest stored
    /// chain when a database path is configured.
    pub fn new(config: NodeConfig) -> Result<Self, StoreError> {
        let store = match &config.db_path {
            Some(path) => Some(BlockStore::open(path)?),
            None => None,
        };
        Self::with_store(config, store)
    }

    pub fn with_store(config: NodeConfig, store: Option<BlockStore>) -> Result<Self, StoreError> {
        let mut blockchain = Blockchain::with_archive_dir(&config.archive_dir);
        if let Some(store) = &store {
            blockchain.chain = store.load_best_chain()?;
            info!("STORE - loaded {} blocks", blockchain.len());
        }
        let ledger = Ledger::replay(&blockchain.chain);
        let difficulty = blockchain
            .last_block()
            .map(|b| b.difficulty)
            .unwrap_or(config.initial_difficulty);

        let consensus = HybridConsensusManager::new();
        for (validator, stake) in &config.stakeholders {
            consensus.set_stake(validator, *stake);
        }

        Ok(Self {
            blockchain: RwLock::new(blockchain),
            ledger: Mutex::new(ledger),
            mempool: Mutex::new(TransactionPool::new()),
            consensus,
            peers: PeerList::new(&config.p2p_listen, config.peers.clone()),
            contracts: ContractRegistry::with_builtins(),
            beacon: Beacon::new(config.shard_count),
            store,
            started_at: Instant::now(),
            difficulty: AtomicU32::new(difficulty),
            mining_jobs: Mutex::new(Vec::new()),
            config,
        })
    }

    /* ---------- chain ---------- */

    pub fn difficulty(&self) -> u32 {
        self.difficulty.load(Ordering::SeqCst)
    }

    pub fn set_difficulty(&self, difficulty: u32) {
        self.difficulty.store(difficulty, Ordering::SeqCst);
    }

    pub fn chain_snapshot(&self) -> Vec<Block> {
        self.blockchain.read().expect("rwlock poisoned").chain.clone()
    }

    pub fn chain_len(&self) -> usize {
        self.blockchain.read().expect("rwlock poisoned").len()
    }

    /// Mine and append a genesis block if the chain is empty.
    pub fn ensure_genesis(&self) -> Option<Block> {
        let mut bc = self.blockchain.write().expect("rwlock poisoned");
        if !bc.is_empty() {
            return None;
        }
        let genesis = Block::create(
            0,
            "",
            GENESIS_RELATIONSHIP,
            &[],
            &Payloads::default(),
            &TransactionPool::new(),
            self.difficulty(),
            &self.config.miner_address,
            self.config.block_reward,
        );
        bc.append_block(genesis.clone());
        self.ledger
            .lock()
            .expect("mutex poisoned")
            .apply_block(&genesis);
        drop(bc);

        self.persist(&genesis);
        info!("CHAIN - genesis block {}", genesis.hash);
        Some(genesis)
    }

    /// Fork-choice entry point for chains received from peers. On adoption
    /// the ledger is rebuilt from the new chain, pooled transactions it
    /// already carries are dropped and any running mining job is cancelled.
    ///
    /// Lock order is chain, then ledger, then mempool.
    pub fn replace_chain(&self, candidate: Vec<Block>) -> bool {
        let adopted = {
            let mut bc = self.blockchain.write().expect("rwlock poisoned");
            if !bc.replace_chain(candidate) {
                return false;
            }
            let adopted = bc.chain.clone();
            *self.ledger.lock().expect("mutex poisoned") = Ledger::replay(&adopted);
            adopted
        };
        let removed: usize = {
            let mut pool = self.mempool.lock().expect("mutex poisoned");
            adopted
                .iter()
                .map(|b| pool.remove_included(&b.transactions))
                .sum()
        };
        if removed > 0 {
            debug!("CHAIN - dropped {removed} pooled transactions already on the adopted chain");
        }
        if let Some(tip) = adopted.last() {
            self.set_difficulty(tip.difficulty);
        }
        self.cancel_mining();
        for b in &adopted {
            self.persist(b);
        }
        info!(
            "CHAIN - local chain replaced ({} blocks, tip {})",
            adopted.len(),
            adopted.last().map(|b| b.hash.as_str()).unwrap_or_default()
        );
        true
    }

    /// Append a block announced by a peer if it extends our tip and its hash
    /// is self-consistent.
    pub fn accept_new_block(&self, block: Block) -> bool {
        {
            let mut bc = self.blockchain.write().expect("rwlock poisoned");
            let extends_tip = bc
                .last_block()
                .is_some_and(|tip| tip.hash == block.prev_hash);
            if !extends_tip || !block.has_valid_hash() {
                return false;
            }
            bc.append_block(block.clone());
            self.ledger
                .lock()
                .expect("mutex poisoned")
                .apply_block(&block);
        }
        self.mempool
            .lock()
            .expect("mutex poisoned")
            .remove_included(&block.transactions);
        self.cancel_mining();
        self.persist(&block);
        true
    }

    pub fn append_sub_block(
        &self,
        parent_index: usize,
        payloads: &Payloads,
        category: &str,
    ) -> Result<Block, ChainError> {
        let parent = {
            let mut bc = self.blockchain.write().expect("rwlock poisoned");
            bc.append_sub_block(parent_index, payloads, category)?.clone()
        };
        self.persist(&parent);
        Ok(parent)
    }

    pub fn prune(&self, retain_count: usize, label: &str) -> Result<usize, ChainError> {
        self.blockchain
            .write()
            .expect("rwlock poisoned")
            .prune_and_archive(retain_count, label)
    }

    /// Recompute the mining difficulty from recent block times.
    pub fn adjust_difficulty(&self) -> u32 {
        let adjusted = {
            let bc = self.blockchain.read().expect("rwlock poisoned");
            adjust_difficulty(
                &bc.chain,
                self.config.target_block_time,
                self.config.difficulty_window,
            )
        };
        if let Some(d) = adjusted {
            self.set_difficulty(d);
        }
        self.difficulty()
    }

    fn persist(&self, block: &Block) {
        if let Some(store) = &self.store {
            if let Err(e) = store.put(block) {
                error!("STORE - failed to save block {}: {e}", block.hash);
            }
        }
    }

    /* ---------- transactions ---------- */

    /// Verify and pool a client transaction. The sender field carries the
    /// hex public key that signed it. Returns the shard it routes to.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<usize, SubmitError> {
        if tx.is_coinbase() {
            return Err(SubmitError::Coinbase);
        }
        if !(tx.amount > 0.0) {
            return Err(SubmitError::InvalidAmount);
        }
        if !verify_transaction(&tx, &tx.sender)? {
            return Err(SubmitError::BadSignature);
        }
        let shard = self.beacon.route(&tx);

        let balance = self.ledger.lock().expect("mutex poisoned").balance(&tx.sender);
        if balance < tx.amount {
            return Err(SubmitError::InsufficientFunds {
                account: tx.sender.clone(),
                balance,
                amount: tx.amount,
            });
        }

        let mut pool = self.mempool.lock().expect("mutex poisoned");
        pool.add(tx);
        debug!("MEMPOOL - size now {}", pool.len());
        Ok(shard)
    }

    /// Dev faucet: credit `address` the way a block reward would.
    pub fn credit_faucet(&self, address: &str, amount: f64) -> f64 {
        let mut ledger = self.ledger.lock().expect("mutex poisoned");
        ledger.credit_coinbase(address, amount);
        ledger.balance(address)
    }

    /* ---------- mining ---------- */

    /// Unmined block on top of the current tip holding the pooled
    /// transactions the ledger can cover, in pool order.
    pub fn prepare_candidate(&self) -> Block {
        let (index, prev_hash) = self
            .blockchain
            .read()
            .expect("rwlock poisoned")
            .next_link();
        let pending = self.mempool.lock().expect("mutex poisoned").snapshot();

        let mut trial = self.ledger.lock().expect("mutex poisoned").clone();
        trial.credit_coinbase(&self.config.miner_address, self.config.block_reward);
        let selected: Vec<Transaction> = pending
            .into_iter()
            .filter(|tx| match trial.apply_transaction(tx) {
                Ok(()) => true,
                Err(e) => {
                    warn!("MINER - leaving {} out: {e}", tx.hash());
                    false
                }
            })
            .collect();

        Block::assemble(
            index,
            &prev_hash,
            MINED_RELATIONSHIP,
            &[],
            &Payloads::default(),
            &TransactionPool::from_transactions(selected),
            self.difficulty(),
            &self.config.miner_address,
            self.config.block_reward,
        )
    }

    /// Append a freshly mined block built by [`AppState::prepare_candidate`].
    pub fn commit_mined_block(&self, block: Block) -> Result<Block, MineError> {
        let skipped = {
            let mut bc = self.blockchain.write().expect("rwlock poisoned");
            let (_, tip_hash) = bc.next_link();
            if tip_hash != block.prev_hash {
                return Err(MineError::Stale);
            }
            bc.append_block(block.clone());
            self.ledger
                .lock()
                .expect("mutex poisoned")
                .apply_block(&block)
        };
        if skipped > 0 {
            warn!("MINER - {skipped} transfers in block #{} were not covered", block.index);
        }
        let removed = self
            .mempool
            .lock()
            .expect("mutex poisoned")
            .remove_included(&block.transactions);
        self.persist(&block);
        info!(
            "MINER - sealed block #{} (hash={}, nonce={}, txs={})",
            block.index, block.hash, block.nonce, removed
        );
        Ok(block)
    }

    /// Prepare, mine and commit one block. CPU bound; run it off the async
    /// executor. Returns `Cancelled` if a competing chain or block was
    /// adopted mid-search.
    pub fn mine_next_block(&self) -> Result<Block, MineError> {
        let cancel = Arc::new(AtomicBool::new(false));
        self.mining_jobs
            .lock()
            .expect("mutex poisoned")
            .push(Arc::clone(&cancel));

        let mut block = self.prepare_candidate();
        let difficulty = block.difficulty;
        let solved = block.mine_cancellable(difficulty, &cancel);

        self.mining_jobs
            .lock()
            .expect("mutex poisoned")
            .retain(|job| !Arc::ptr_eq(job, &cancel));
        if !solved {
            info!("MINER - search for block #{} cancelled", block.index);
            return Err(MineError::Cancelled);
        }
        self.commit_mined_block(block)
    }

    /// Interrupt every in-flight mining job.
    pub fn cancel_mining(&self) {
        for flag in self.mining_jobs.lock().expect("mutex poisoned").iter() {
            flag.store(true, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::blockchain::is_valid_chain;
    use crate::wallet::{generate_keypair_hex, sign_transaction};

    pub(crate) fn test_config() -> NodeConfig {
        NodeConfig {
            p2p_listen: "127.0.0.1:0".into(),
            peers: Vec::new(),
            initial_difficulty: 1,
            archive_dir: std::env::temp_dir(),
            ..NodeConfig::default()
        }
    }

    pub(crate) fn test_state() -> AppState {
        let state = AppState::with_store(test_config(), None).unwrap();
        state.ensure_genesis();
        state
    }

    fn signed(sk: &str, pk: &str, to: &str, amount: f64) -> Transaction {
        let mut tx = Transaction::new(pk, to, amount, Some(1));
        sign_transaction(&mut tx, sk).unwrap();
        tx
    }

    #[test]
    fn genesis_is_created_once_and_credits_miner() {
        let state = test_state();
        assert!(state.ensure_genesis().is_none());
        assert_eq!(state.chain_len(), 1);
        let ledger = state.ledger.lock().unwrap();
        assert_eq!(ledger.balance("Miner1"), 12.5);
    }

    #[test]
    fn submitted_transaction_is_mined_and_applied() {
        let state = test_state();
        let (sk, pk) = generate_keypair_hex();
        state.credit_faucet(&pk, 20.0);

        state.submit_transaction(signed(&sk, &pk, "Bob", 5.0)).unwrap();
        assert_eq!(state.mempool.lock().unwrap().len(), 1);

        let block = state.mine_next_block().unwrap();
        assert_eq!(block.index, 1);
        assert_eq!(block.transactions.len(), 2);
        assert!(state.mempool.lock().unwrap().is_empty());
        assert!(is_valid_chain(&state.chain_snapshot()));

        let ledger = state.ledger.lock().unwrap();
        assert_eq!(ledger.balance(&pk), 15.0);
        assert_eq!(ledger.balance("Bob"), 5.0);
        assert_eq!(ledger.balance("Miner1"), 25.0);
    }

    #[test]
    fn submission_rejections() {
        let state = test_state();
        let (sk, pk) = generate_keypair_hex();

        assert!(matches!(
            state.submit_transaction(signed(&sk, &pk, "Bob", 5.0)),
            Err(SubmitError::InsufficientFunds { .. })
        ));

        let mut forged = signed(&sk, &pk, "Bob", 5.0);
        forged.amount = 50.0;
        assert!(matches!(
            state.submit_transaction(forged),
            Err(SubmitError::BadSignature)
        ));

        assert!(matches!(
            state.submit_transaction(Transaction::coinbase("me", 1.0)),
            Err(SubmitError::Coinbase)
        ));
        assert!(matches!(
            state.submit_transaction(Transaction::new(&pk, "Bob", 1.0, None)),
            Err(SubmitError::Signature(SignatureError::MissingSignature))
        ));
        assert!(state.mempool.lock().unwrap().is_empty());
    }

    #[test]
    fn stale_candidate_is_refused() {
        let state = test_state();
        let mut first = state.prepare_candidate();
        let mut second = state.prepare_candidate();
        first.mine(first.difficulty);
        second.mine(second.difficulty);
        state.commit_mined_block(first).unwrap();
        assert_eq!(state.commit_mined_block(second), Err(MineError::Stale));
        assert_eq!(state.chain_len(), 2);
    }

    #[test]
    fn peer_block_must_extend_tip() {
        let state = test_state();
        let tip = state.chain_snapshot()[0].clone();

        let mut good = state.prepare_candidate();
        good.mine(good.difficulty);
        let mut orphan = good.clone();
        orphan.prev_hash = "elsewhere".into();
        orphan.hash = orphan.compute_hash();
        let mut tampered = good.clone();
        tampered.text_data = "x".into();

        assert!(!state.accept_new_block(orphan));
        assert!(!state.accept_new_block(tampered));
        assert!(state.accept_new_block(good.clone()));
        assert_eq!(state.chain_snapshot(), vec![tip, good]);
    }

    #[test]
    fn adopting_heavier_chain_cancels_mining() {
        let state = Arc::new(test_state());
        state.set_difficulty(64); // unreachable target

        let miner = {
            let state = Arc::clone(&state);
            thread::spawn(move || state.mine_next_block())
        };

        // build a heavier competing chain from scratch
        let genesis = Block::create(
            0,
            "",
            "one-to-one",
            &[],
            &Payloads::default(),
            &TransactionPool::new(),
            2,
            "Other",
            12.5,
        );
        let next = Block::create(
            1,
            &genesis.hash,
            "one-to-one",
            &[],
            &Payloads::default(),
            &TransactionPool::new(),
            1,
            "Other",
            12.5,
        );

        // wait until the job has registered its cancel flag
        while state.mining_jobs.lock().unwrap().is_empty() {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(state.replace_chain(vec![genesis, next]));
        assert_eq!(miner.join().unwrap(), Err(MineError::Cancelled));
        assert_eq!(state.ledger.lock().unwrap().balance("Other"), 25.0);
        assert_eq!(state.ledger.lock().unwrap().balance("Miner1"), 0.0);
    }

    #[test]
    fn concurrent_mining_jobs_are_all_cancelled() {
        let state = Arc::new(test_state());
        state.set_difficulty(64);

        let jobs: Vec<_> = (0..2)
            .map(|_| {
                let state = Arc::clone(&state);
                thread::spawn(move || state.mine_next_block())
            })
            .collect();
        while state.mining_jobs.lock().unwrap().len() < 2 {
            thread::sleep(Duration::from_millis(5));
        }

        state.cancel_mining();
        for job in jobs {
            assert_eq!(job.join().unwrap(), Err(MineError::Cancelled));
        }
        assert!(state.mining_jobs.lock().unwrap().is_empty());
        assert_eq!(state.chain_len(), 1);
    }

    #[test]
    fn finished_job_leaves_other_job_cancellable() {
        let state = Arc::new(test_state());
        state.set_difficulty(64);
        let slow = {
            let state = Arc::clone(&state);
            thread::spawn(move || state.mine_next_block())
        };
        while state.mining_jobs.lock().unwrap().is_empty() {
            thread::sleep(Duration::from_millis(5));
        }
        // let it assemble its candidate at the unreachable difficulty
        thread::sleep(Duration::from_millis(100));

        // a second job that solves and deregisters while the first still runs
        state.set_difficulty(0);
        state.mine_next_block().unwrap();
        assert_eq!(state.mining_jobs.lock().unwrap().len(), 1);

        state.cancel_mining();
        assert_eq!(slow.join().unwrap(), Err(MineError::Cancelled));
    }

    #[test]
    fn adopted_chain_clears_pooled_duplicates() {
        let (sk, pk) = generate_keypair_hex();
        let funded = || {
            let config = NodeConfig {
                miner_address: pk.clone(),
                ..test_config()
            };
            let state = AppState::with_store(config, None).unwrap();
            state.ensure_genesis();
            state
        };
        let local = funded();
        let remote = funded();

        let tx = signed(&sk, &pk, "Bob", 5.0);
        local.submit_transaction(tx.clone()).unwrap();
        remote.submit_transaction(tx.clone()).unwrap();
        remote.mine_next_block().unwrap();
        remote.mine_next_block().unwrap();

        assert!(local.replace_chain(remote.chain_snapshot()));
        assert!(local.mempool.lock().unwrap().is_empty());

        local.mine_next_block().unwrap();
        let copies = local
            .chain_snapshot()
            .iter()
            .flat_map(|b| b.transactions.iter())
            .filter(|t| t.hash() == tx.hash())
            .count();
        assert_eq!(copies, 1);
        assert_eq!(local.ledger.lock().unwrap().balance("Bob"), 5.0);
    }

    #[test]
    fn ledger_tracks_chain_while_mining_races_adoption() {
        let remote = AppState::with_store(
            NodeConfig {
                miner_address: "Other".into(),
                initial_difficulty: 2,
                ..test_config()
            },
            None,
        )
        .unwrap();
        remote.ensure_genesis();
        let forks: Vec<Vec<Block>> = (0..8)
            .map(|_| {
                remote.mine_next_block().unwrap();
                remote.chain_snapshot()
            })
            .collect();

        let state = Arc::new(test_state());
        let miner = {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                for _ in 0..30 {
                    let _ = state.mine_next_block();
                }
            })
        };
        for fork in forks {
            state.replace_chain(fork);
            thread::sleep(Duration::from_millis(2));
        }
        miner.join().unwrap();

        let replayed = Ledger::replay(&state.chain_snapshot());
        let ledger = state.ledger.lock().unwrap();
        for account in ["Miner1", "Other"] {
            assert_eq!(ledger.balance(account), replayed.balance(account));
        }
        assert_eq!(ledger.total(), replayed.total());
    }

    #[test]
    fn sub_blocks_and_pruning_go_through_state() {
        let state = test_state();
        let parent = state
            .append_sub_block(0, &Payloads::new("Metadata: Node updated", "", ""), "metadata")
            .unwrap();
        assert_eq!(parent.sub_blocks.len(), 1);
        assert!(matches!(
            state.append_sub_block(4, &Payloads::default(), "text"),
            Err(ChainError::ParentOutOfRange { .. })
        ));
        assert_eq!(state.prune(10, "archive_manual").unwrap(), 0);
    }

    #[test]
    fn persisted_chain_is_reloaded() {
        let store = BlockStore::temporary().unwrap();
        let state = AppState::with_store(test_config(), Some(store.clone())).unwrap();
        state.ensure_genesis();
        state.mine_next_block().unwrap();
        let chain = state.chain_snapshot();

        let reloaded = AppState::with_store(test_config(), Some(store)).unwrap();
        assert_eq!(reloaded.chain_snapshot(), chain);
        assert_eq!(reloaded.ledger.lock().unwrap().balance("Miner1"), 25.0);
        assert!(reloaded.ensure_genesis().is_none());
    }
}
