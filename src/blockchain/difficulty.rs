use std::time::Duration;

use log::info;

use super::Block;

/// Retune difficulty from the time spent across the last `window` blocks.
///
/// With fewer than `window` blocks the tip's difficulty is returned as is.
/// Otherwise the span between `chain[n - window]` and the tip is compared to
/// `target_per_block * window`: under half of that adds one, over double
/// subtracts one (never below 1). Returns `None` for an empty chain.
pub fn adjust_difficulty(chain: &[Block], target_per_block: Duration, window: usize) -> Option<u32> {
    let tip = chain.last()?;
    let current = tip.difficulty;
    let n = chain.len();
    if window == 0 || n < window {
        return Some(current);
    }

    let start = &chain[n - window];
    let actual = tip.timestamp - start.timestamp;
    let expected = i64::try_from(target_per_block.as_secs())
        .unwrap_or(i64::MAX)
        .saturating_mul(window as i64);

    // Compare against expected/2 and expected*2 without truncating.
    if actual.saturating_mul(2) < expected {
        info!("DIFFICULTY - raising: {actual}s elapsed < {expected}s/2");
        return Some(current + 1);
    }
    if actual > expected.saturating_mul(2) && current > 1 {
        info!("DIFFICULTY - lowering: {actual}s elapsed > {expected}s*2");
        return Some(current - 1);
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Payloads;
    use crate::transaction::TransactionPool;

    /// Chain whose blocks are `spacing` seconds apart.
    fn timed_chain(len: usize, spacing: i64, difficulty: u32) -> Vec<Block> {
        (0..len)
            .map(|i| {
                let mut b = Block::assemble(
                    i as u64,
                    "",
                    "one-to-one",
                    &[],
                    &Payloads::default(),
                    &TransactionPool::new(),
                    difficulty,
                    "Miner1",
                    12.5,
                );
                b.timestamp = 1_700_000_000 + spacing * i as i64;
                b
            })
            .collect()
    }

    const TARGET: Duration = Duration::from_secs(10);

    #[test]
    fn empty_chain_has_no_difficulty() {
        assert_eq!(adjust_difficulty(&[], TARGET, 10), None);
    }

    #[test]
    fn short_chain_keeps_tip_difficulty() {
        let chain = timed_chain(5, 1, 4);
        assert_eq!(adjust_difficulty(&chain, TARGET, 10), Some(4));
    }

    #[test]
    fn fast_blocks_raise_by_one() {
        // 9 intervals * 5s = 45s < 100s / 2
        let chain = timed_chain(10, 5, 3);
        assert_eq!(adjust_difficulty(&chain, TARGET, 10), Some(4));
    }

    #[test]
    fn slow_blocks_lower_by_one() {
        // 9 * 30s = 270s > 200s
        let chain = timed_chain(10, 30, 3);
        assert_eq!(adjust_difficulty(&chain, TARGET, 10), Some(2));
    }

    #[test]
    fn slow_blocks_never_drop_below_one() {
        let chain = timed_chain(10, 30, 1);
        assert_eq!(adjust_difficulty(&chain, TARGET, 10), Some(1));
    }

    #[test]
    fn on_target_is_unchanged() {
        // 9 * 10s = 90s, inside [50s, 200s]
        let chain = timed_chain(10, 10, 3);
        assert_eq!(adjust_difficulty(&chain, TARGET, 10), Some(3));
    }
}
