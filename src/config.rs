use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use log::warn;

use crate::blockchain::{BASE_REWARD, DEFAULT_DIFFICULTY};

/// Node settings, read once at startup from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub http_host: String,
    pub http_port: u16,
    pub p2p_listen: String,
    pub peers: Vec<String>,
    pub light_client: bool,
    pub miner_address: String,
    pub block_reward: f64,
    pub initial_difficulty: u32,
    pub db_path: Option<PathBuf>,
    pub archive_dir: PathBuf,
    pub shard_count: usize,
    pub stakeholders: Vec<(String, f64)>,
    pub auto_mine_interval: Duration,
    pub prune_interval: Duration,
    pub difficulty_interval: Duration,
    pub discovery_interval: Duration,
    pub target_block_time: Duration,
    pub difficulty_window: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            http_host: "127.0.0.1".to_string(),
            http_port: 8080,
            p2p_listen: "localhost:8000".to_string(),
            peers: vec!["localhost:8001".to_string()],
            light_client: false,
            miner_address: "Miner1".to_string(),
            block_reward: BASE_REWARD,
            initial_difficulty: DEFAULT_DIFFICULTY,
            db_path: None,
            archive_dir: PathBuf::from("."),
            shard_count: 3,
            stakeholders: vec![
                ("Miner1".to_string(), 50.0),
                ("Validator1".to_string(), 30.0),
                ("Validator2".to_string(), 20.0),
            ],
            auto_mine_interval: Duration::from_secs(10),
            prune_interval: Duration::from_secs(10),
            difficulty_interval: Duration::from_secs(30),
            discovery_interval: Duration::from_secs(30),
            target_block_time: Duration::from_secs(10),
            difficulty_window: 2,
        }
    }
}

impl NodeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let secs = |key: &str, default: Duration| parse_period(&lookup, key, default);
        Self {
            http_host: lookup("HOST").unwrap_or(d.http_host),
            http_port: parse_or(&lookup, "PORT", d.http_port),
            p2p_listen: lookup("P2P_LISTEN").unwrap_or(d.p2p_listen),
            peers: lookup("P2P_PEERS").map(|v| parse_list(&v)).unwrap_or(d.peers),
            light_client: parse_or(&lookup, "LIGHT_CLIENT", d.light_client),
            miner_address: lookup("MINER_ADDRESS").unwrap_or(d.miner_address),
            block_reward: parse_or(&lookup, "BLOCK_REWARD", d.block_reward),
            initial_difficulty: parse_or(&lookup, "INITIAL_DIFFICULTY", d.initial_difficulty),
            db_path: lookup("DB_PATH").filter(|v| !v.is_empty()).map(PathBuf::from),
            archive_dir: lookup("ARCHIVE_DIR").map(PathBuf::from).unwrap_or(d.archive_dir),
            shard_count: parse_or(&lookup, "SHARD_COUNT", d.shard_count),
            stakeholders: lookup("STAKEHOLDERS")
                .map(|v| parse_stakes(&v))
                .unwrap_or(d.stakeholders),
            auto_mine_interval: secs("AUTO_MINE_INTERVAL_SECS", d.auto_mine_interval),
            prune_interval: secs("PRUNE_INTERVAL_SECS", d.prune_interval),
            difficulty_interval: secs("DIFFICULTY_INTERVAL_SECS", d.difficulty_interval),
            discovery_interval: secs("DISCOVERY_INTERVAL_SECS", d.discovery_interval),
            target_block_time: secs("TARGET_BLOCK_TIME_SECS", d.target_block_time),
            difficulty_window: parse_or(&lookup, "DIFFICULTY_WINDOW", d.difficulty_window),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("CONFIG - ignoring malformed {key}={raw:?}");
            default
        }),
    }
}

/// Whole seconds, strictly positive. Zero would stall every timer built on it.
fn parse_period<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    match parse_or(lookup, key, default.as_secs()) {
        0 => {
            warn!("CONFIG - ignoring malformed {key}=0, periods must be positive");
            default
        }
        secs => Duration::from_secs(secs),
    }
}

/// Comma separated, blanks dropped.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// `name=stake` pairs, comma separated. Malformed pairs are skipped.
pub fn parse_stakes(raw: &str) -> Vec<(String, f64)> {
    parse_list(raw)
        .into_iter()
        .filter_map(|pair| {
            let (name, stake) = pair.split_once('=')?;
            match stake.trim().parse::<f64>() {
                Ok(stake) => Some((name.trim().to_string(), stake)),
                Err(_) => {
                    warn!("CONFIG - ignoring malformed stake {pair:?}");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> NodeConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        NodeConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = config(&[]);
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.peers, vec!["localhost:8001"]);
        assert_eq!(cfg.initial_difficulty, DEFAULT_DIFFICULTY);
        assert!(cfg.db_path.is_none());
        assert_eq!(cfg.stakeholders.len(), 3);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config(&[
            ("PORT", "9090"),
            ("P2P_PEERS", "a:1, b:2,,"),
            ("LIGHT_CLIENT", "true"),
            ("STAKEHOLDERS", "A=50,B=30,broken,C=x"),
            ("DB_PATH", "/tmp/chain"),
            ("AUTO_MINE_INTERVAL_SECS", "3"),
        ]);
        assert_eq!(cfg.http_port, 9090);
        assert_eq!(cfg.peers, vec!["a:1", "b:2"]);
        assert!(cfg.light_client);
        assert_eq!(
            cfg.stakeholders,
            vec![("A".to_string(), 50.0), ("B".to_string(), 30.0)]
        );
        assert_eq!(cfg.db_path, Some(PathBuf::from("/tmp/chain")));
        assert_eq!(cfg.auto_mine_interval, Duration::from_secs(3));
    }

    #[test]
    fn malformed_values_fall_back() {
        let cfg = config(&[("PORT", "nope"), ("SHARD_COUNT", "-1")]);
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.shard_count, 3);
    }

    #[test]
    fn zero_periods_fall_back() {
        let d = NodeConfig::default();
        let cfg = config(&[
            ("AUTO_MINE_INTERVAL_SECS", "0"),
            ("PRUNE_INTERVAL_SECS", "0"),
            ("DIFFICULTY_INTERVAL_SECS", " 0 "),
            ("DISCOVERY_INTERVAL_SECS", "0"),
            ("TARGET_BLOCK_TIME_SECS", "0"),
        ]);
        assert_eq!(cfg.auto_mine_interval, d.auto_mine_interval);
        assert_eq!(cfg.prune_interval, d.prune_interval);
        assert_eq!(cfg.difficulty_interval, d.difficulty_interval);
        assert_eq!(cfg.discovery_interval, d.discovery_interval);
        assert_eq!(cfg.target_block_time, d.target_block_time);
    }
}
