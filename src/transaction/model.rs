use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Sender used for the synthetic miner reward.
pub const COINBASE_SENDER: &str = "COINBASE";

/// An account-to-account transfer, optionally carrying a contract call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: f64,
    pub timestamp: i64, // Unix timestamp (UTC)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
    /// Hex-encoded compact ECDSA signature over `signing_payload()`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
}

impl Transaction {
    /// Build an unsigned transfer stamped with the current time.
    pub fn new(sender: &str, recipient: &str, amount: f64, nonce: Option<u64>) -> Self {
        Self {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            amount,
            timestamp: Utc::now().timestamp(),
            contract_name: None,
            method: None,
            params: None,
            signature: None,
            nonce,
        }
    }

    /// Reward transaction crediting `miner` with `reward`.
    pub fn coinbase(miner: &str, reward: f64) -> Self {
        Self::new(COINBASE_SENDER, miner, reward, Some(0))
    }

    pub fn is_coinbase(&self) -> bool {
        self.sender == COINBASE_SENDER
    }

    /// Canonical string that gets hashed and signed. Includes the nonce.
    pub fn signing_payload(&self) -> String {
        format!(
            "{}:{}:{:.6}:{}:{}",
            self.sender,
            self.recipient,
            self.amount,
            self.timestamp,
            self.nonce.unwrap_or(0)
        )
    }

    /// SHA-256 of the signing payload.
    pub fn sighash(&self) -> [u8; 32] {
        let digest = Sha256::digest(self.signing_payload().as_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest[..]);
        out
    }

    /// Identifier over sender/recipient/amount/timestamp only.
    ///
    /// The nonce is not part of the preimage, so two transfers with the same
    /// parties, amount and second collide.
    pub fn hash(&self) -> String {
        let preimage = format!(
            "{}{}{:.6}{}",
            self.sender, self.recipient, self.amount, self.timestamp
        );
        hex::encode(Sha256::digest(preimage.as_bytes()))
    }
}
