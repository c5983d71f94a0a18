use std::collections::HashSet;

use super::model::Transaction;

/// Pending transactions waiting to be packaged into a block.
#[derive(Debug, Default, Clone)]
pub struct TransactionPool {
    transactions: Vec<Transaction>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_transactions(transactions: Vec<Transaction>) -> Self {
        Self { transactions }
    }

    pub fn add(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    pub fn clear(&mut self) {
        self.transactions.clear();
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn snapshot(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }

    /// Drop every pooled transaction that also appears in `included`.
    /// Returns how many were removed.
    pub fn remove_included(&mut self, included: &[Transaction]) -> usize {
        let hashes: HashSet<String> = included.iter().map(Transaction::hash).collect();
        let before = self.transactions.len();
        self.transactions.retain(|t| !hashes.contains(&t.hash()));
        before - self.transactions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_included_keeps_the_rest() {
        let a = Transaction::new("a", "b", 1.0, None);
        let b = Transaction::new("b", "c", 2.0, None);
        let c = Transaction::new("c", "a", 3.0, None);
        let mut pool = TransactionPool::from_transactions(vec![a.clone(), b.clone(), c.clone()]);

        let removed = pool.remove_included(&[Transaction::coinbase("m", 1.0), a, c]);
        assert_eq!(removed, 2);
        assert_eq!(pool.transactions(), &[b]);
    }

    #[test]
    fn clear_empties() {
        let mut pool = TransactionPool::new();
        pool.add(Transaction::new("a", "b", 1.0, None));
        assert_eq!(pool.len(), 1);
        pool.clear();
        assert!(pool.is_empty());
    }
}
