use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::blockchain::{Block, CandidateBlock};
use crate::transaction::Transaction;

/* ---------- Chain API Models ---------- */

#[derive(Serialize)]
pub struct ChainResponse<'a> {
    pub length: usize,
    pub difficulty: u32,
    pub cumulative_difficulty: u64,
    pub chain: &'a [Block],
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub length: usize,
    pub cumulative_difficulty: u64,
}

#[derive(Serialize)]
pub struct MineResponse {
    pub mined_index: u64,
    pub hash: String,
    pub nonce: u64,
    pub difficulty: u32,
    pub transactions: usize,
}

#[derive(Serialize)]
pub struct DifficultyResponse {
    pub difficulty: u32,
}

#[derive(Deserialize)]
pub struct SetDifficultyRequest {
    pub difficulty: u32,
}

#[derive(Deserialize)]
pub struct SubBlockRequest {
    pub parent_index: usize,
    #[serde(default)]
    pub text_data: String,
    #[serde(default)]
    pub audio_data: String,
    #[serde(default)]
    pub video_data: String,
    pub category: String,
}

#[derive(Deserialize)]
pub struct PruneRequest {
    pub retain_count: usize,
    #[serde(default = "default_prune_label")]
    pub label: String,
}

fn default_prune_label() -> String {
    "archive_manual".to_string()
}

#[derive(Serialize)]
pub struct PruneResponse {
    pub archived: usize,
    pub length: usize,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub height: usize,
    pub tip: Option<String>,
    pub difficulty: u32,
    pub cumulative_difficulty: u64,
    pub target_block_time_secs: u64,
    pub last_interval_secs: Option<i64>,
    pub avg_interval_secs: Option<f64>,
    pub mempool_size: usize,
    pub peers: usize,
    pub shards: usize,
    pub light_client: bool,
    pub uptime_secs: u64,
}

/* ---------- TX API Models ---------- */

#[derive(Serialize)]
pub struct NewTxResponse {
    pub hash: String,
    pub shard: usize,
}

#[derive(Serialize)]
pub struct MempoolResponse<'a> {
    pub size: usize,
    pub transactions: &'a [Transaction],
}

/* ---------- Faucet API Models (dev) ---------- */

#[derive(Deserialize)]
pub struct FaucetRequest {
    pub address: String,
    pub amount: f64,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: f64,
}

/* ---------- Contract API Models ---------- */

#[derive(Deserialize)]
pub struct ExecuteContractRequest {
    pub name: String,
    pub method: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

#[derive(Serialize)]
pub struct ExecuteContractResponse {
    pub name: String,
    pub method: String,
    pub result: Value,
}

#[derive(Deserialize)]
pub struct DeployContractRequest {
    pub name: String,
    /// Hex-encoded bytecode.
    pub code: String,
}

#[derive(Serialize)]
pub struct DeployContractResponse {
    pub name: String,
    pub size: usize,
}

/* ---------- Peer API Models ---------- */

#[derive(Deserialize)]
pub struct PeerRequest {
    pub address: String,
}

#[derive(Serialize)]
pub struct PeersResponse {
    pub self_address: String,
    pub peers: Vec<String>,
}

/* ---------- Consensus API Models ---------- */

#[derive(Serialize)]
pub struct ProposeResponse {
    pub candidate_index: usize,
    pub hash: String,
}

#[derive(Deserialize)]
pub struct VoteRequest {
    pub candidate_index: usize,
    pub validator: String,
    pub approve: bool,
}

#[derive(Serialize)]
pub struct VoteResponse {
    pub accepted: bool,
}

#[derive(Serialize)]
pub struct CandidatesResponse {
    pub total_stake: f64,
    pub candidates: Vec<CandidateBlock>,
}
