//! Newline-delimited JSON sync protocol between nodes.

use std::time::Duration;

use thiserror::Error;

pub mod message;
pub mod node;
pub mod peers;

pub use message::Message;
pub use node::{P2pNode, broadcast, connect_to_peers, discover_peers};
pub use peers::PeerList;

#[derive(Debug, Error)]
pub enum P2pError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no activity for {0:?}")]
    Timeout(Duration),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
