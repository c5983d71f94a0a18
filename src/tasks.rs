//! Periodic background jobs. Each one talks to the node only through
//! `AppState`, the same as the HTTP and P2P handlers.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::blockchain::{AUTO_PRUNE_LABEL, AUTO_PRUNE_RETAIN, MAX_CHAIN_LEN};
use crate::p2p::{self, Message};
use crate::state::{AppState, MineError};

/// Start every background job that applies to this node's mode.
pub fn spawn_all(state: &Arc<AppState>) -> Vec<JoinHandle<()>> {
    let mut handles = vec![
        spawn_difficulty_retuner(Arc::clone(state)),
        spawn_peer_discovery(Arc::clone(state)),
    ];
    if state.config.light_client {
        info!("NODE - light client mode: auto-mining and pruning disabled");
    } else {
        handles.push(spawn_auto_miner(Arc::clone(state)));
        handles.push(spawn_prune_sweep(Arc::clone(state)));
    }
    handles
}

/// Shortest tick period; `interval` panics on zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = interval(period.max(MIN_PERIOD));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// While the pool has work, mine one block per tick off the async workers
/// and announce it.
pub fn spawn_auto_miner(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = ticker(state.config.auto_mine_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if state.mempool.lock().expect("mutex poisoned").is_empty() {
                continue;
            }
            let job = Arc::clone(&state);
            match tokio::task::spawn_blocking(move || job.mine_next_block()).await {
                Ok(Ok(block)) => match Message::new_block(&block) {
                    Ok(msg) => p2p::broadcast(&state.peers.snapshot(), &msg),
                    Err(e) => warn!("MINER - could not announce block #{}: {e}", block.index),
                },
                Ok(Err(MineError::Cancelled)) => debug!("MINER - round cancelled"),
                Ok(Err(MineError::Stale)) => debug!("MINER - round lost to a newer tip"),
                Err(e) => error!("MINER - mining task panicked: {e}"),
            }
        }
    })
}

pub fn spawn_difficulty_retuner(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = ticker(state.config.difficulty_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let before = state.difficulty();
            let after = state.adjust_difficulty();
            if before != after {
                info!("DIFFICULTY - adjusted {before} -> {after}");
            }
        }
    })
}

/// Archive the oldest blocks once the chain outgrows `MAX_CHAIN_LEN`.
pub fn spawn_prune_sweep(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = ticker(state.config.prune_interval);
        loop {
            ticker.tick().await;
            if state.chain_len() <= MAX_CHAIN_LEN {
                continue;
            }
            match state.prune(AUTO_PRUNE_RETAIN, AUTO_PRUNE_LABEL) {
                Ok(n) => info!("PRUNE - archived {n} blocks"),
                Err(e) => error!("PRUNE - sweep failed: {e}"),
            }
        }
    })
}

pub fn spawn_peer_discovery(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = ticker(state.config.discovery_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            p2p::discover_peers(&state);
        }
    })
}
