use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::blockchain::Block;

use super::P2pError;

pub const GET_CHAIN: &str = "GET_CHAIN";
pub const GET_CHAIN_RESPONSE: &str = "GET_CHAIN_RESPONSE";
pub const CHAIN_UPDATE: &str = "CHAIN_UPDATE";
pub const NEW_BLOCK: &str = "NEW_BLOCK";
pub const HEARTBEAT: &str = "HEARTBEAT";
pub const HEARTBEAT_ACK: &str = "HEARTBEAT_ACK";
pub const GET_PEERS: &str = "GET_PEERS";
pub const PEER_LIST: &str = "PEER_LIST";

/// One line on the wire: `{"command": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub command: String,
    #[serde(default)]
    pub data: Value,
}

impl Message {
    pub fn new(command: &str, data: Value) -> Self {
        Self {
            command: command.to_string(),
            data,
        }
    }

    pub fn bare(command: &str) -> Self {
        Self::new(command, Value::Null)
    }

    pub fn chain(command: &str, chain: &[Block]) -> Result<Self, P2pError> {
        Ok(Self::new(command, serde_json::to_value(chain)?))
    }

    pub fn new_block(block: &Block) -> Result<Self, P2pError> {
        Ok(Self::new(NEW_BLOCK, serde_json::to_value(block)?))
    }

    pub fn peer_list(peers: &[String]) -> Self {
        Self::new(PEER_LIST, Value::from(peers.to_vec()))
    }

    /// Parse a single line; surrounding whitespace is ignored.
    pub fn decode(line: &str) -> Result<Self, P2pError> {
        Ok(serde_json::from_str(line.trim())?)
    }

    /// Serialized form with the trailing newline delimiter.
    pub fn encode(&self) -> Result<Vec<u8>, P2pError> {
        let mut bytes = serde_json::to_vec(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    pub fn blocks(&self) -> Result<Vec<Block>, P2pError> {
        Ok(Vec::<Block>::deserialize(&self.data)?)
    }

    pub fn block(&self) -> Result<Block, P2pError> {
        Ok(Block::deserialize(&self.data)?)
    }

    pub fn peers(&self) -> Result<Vec<String>, P2pError> {
        Ok(Vec::<String>::deserialize(&self.data)?)
    }
}
