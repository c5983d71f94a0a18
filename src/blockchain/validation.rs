use super::Block;

/// Fork-choice weight: sum of every block's difficulty.
pub fn cumulative_difficulty(chain: &[Block]) -> u64 {
    chain.iter().map(|b| u64::from(b.difficulty)).sum()
}

/// Full-chain check: genesis has an empty `prev_hash`, every block's hash is
/// self-consistent and links to its predecessor.
pub fn is_valid_chain(chain: &[Block]) -> bool {
    match chain.first() {
        Some(genesis) if genesis.prev_hash.is_empty() => is_valid_window(chain),
        _ => false,
    }
}

/// Like [`is_valid_chain`] but the first block may point at a predecessor
/// outside the slice, as happens after pruning.
pub fn is_valid_window(chain: &[Block]) -> bool {
    let Some(first) = chain.first() else {
        return false;
    };
    if !first.has_valid_hash() {
        return false;
    }
    chain
        .windows(2)
        .all(|pair| pair[1].prev_hash == pair[0].hash && pair[1].has_valid_hash())
}

/// More total work wins; ties keep `local`.
pub fn should_replace(local: &[Block], candidate: &[Block]) -> bool {
    is_valid_chain(candidate) && cumulative_difficulty(candidate) > cumulative_difficulty(local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Payloads;
    use crate::transaction::TransactionPool;

    fn build(len: usize, difficulty: u32) -> Vec<Block> {
        let mut chain: Vec<Block> = Vec::new();
        for i in 0..len {
            let prev = chain.last().map(|b| b.hash.clone()).unwrap_or_default();
            chain.push(Block::create(
                i as u64,
                &prev,
                "one-to-one",
                &["ReceiverA".to_string()],
                &Payloads::default(),
                &TransactionPool::new(),
                difficulty,
                "Miner1",
                12.5,
            ));
        }
        chain
    }

    #[test]
    fn empty_chain_is_invalid() {
        assert!(!is_valid_chain(&[]));
        assert!(!is_valid_window(&[]));
    }

    #[test]
    fn built_chain_is_valid() {
        let chain = build(4, 1);
        assert!(is_valid_chain(&chain));
        assert_eq!(cumulative_difficulty(&chain), 4);
    }

    #[test]
    fn genesis_with_prev_hash_is_rejected() {
        let chain = build(3, 1);
        assert!(!is_valid_chain(&chain[1..]));
        assert!(is_valid_window(&chain[1..]));
    }

    #[test]
    fn broken_link_or_tampered_hash_is_rejected() {
        let mut chain = build(3, 1);
        chain[2].prev_hash = "deadbeef".into();
        chain[2].hash = chain[2].compute_hash();
        assert!(!is_valid_chain(&chain));

        let mut chain = build(3, 1);
        chain[1].text_data = "tampered".into();
        assert!(!is_valid_chain(&chain));

        let mut chain = build(2, 1);
        chain[0].text_data = "tampered".into();
        assert!(!is_valid_chain(&chain));
    }

    #[test]
    fn ties_favour_the_incumbent() {
        let local = build(3, 1);
        let other = build(3, 1);
        assert!(!should_replace(&local, &other));
        let heavier = build(4, 1);
        assert!(should_replace(&local, &heavier));
        assert!(!should_replace(&heavier, &local));
    }
}
