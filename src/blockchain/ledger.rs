use std::collections::HashMap;

use log::debug;
use thiserror::Error;

use super::Block;
use crate::transaction::Transaction;

#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("insufficient funds: {account} has {balance}, needs {amount}")]
    InsufficientFunds {
        account: String,
        balance: f64,
        amount: f64,
    },
}

/// Running balance per account. Holds no history.
#[derive(Debug, Default, Clone)]
pub struct Ledger {
    balances: HashMap<String, f64>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, account: &str) -> f64 {
        self.balances.get(account).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    /// Sum of every balance.
    pub fn total(&self) -> f64 {
        self.balances.values().sum()
    }

    /// Move `tx.amount` from sender to recipient. Leaves the ledger untouched
    /// when the sender cannot cover it.
    pub fn apply_transaction(&mut self, tx: &Transaction) -> Result<(), LedgerError> {
        let balance = self.balance(&tx.sender);
        if balance < tx.amount {
            return Err(LedgerError::InsufficientFunds {
                account: tx.sender.clone(),
                balance,
                amount: tx.amount,
            });
        }
        *self.balances.entry(tx.sender.clone()).or_insert(0.0) -= tx.amount;
        *self.balances.entry(tx.recipient.clone()).or_insert(0.0) += tx.amount;
        Ok(())
    }

    /// Unconditional credit for a block reward; nothing is debited.
    pub fn credit_coinbase(&mut self, recipient: &str, reward: f64) {
        *self.balances.entry(recipient.to_string()).or_insert(0.0) += reward;
    }

    /// Apply every transaction of `block`: coinbase entries are credited,
    /// the rest transferred. Transfers the ledger cannot cover are skipped.
    /// Returns how many transfers were skipped.
    pub fn apply_block(&mut self, block: &Block) -> usize {
        let mut skipped = 0;
        for tx in &block.transactions {
            if tx.is_coinbase() {
                self.credit_coinbase(&tx.recipient, tx.amount);
            } else if let Err(e) = self.apply_transaction(tx) {
                debug!("LEDGER - block #{} tx {} skipped: {e}", block.index, tx.hash());
                skipped += 1;
            }
        }
        skipped
    }

    /// Balances projected from scratch over `blocks`.
    pub fn replay(blocks: &[Block]) -> Self {
        let mut ledger = Self::new();
        for b in blocks {
            ledger.apply_block(b);
        }
        ledger
    }
}
