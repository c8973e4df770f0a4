//! Protocol constants. Amounts are whole ducats; there are no sub-units.

/// Reward minted by the coinbase of every non-genesis block.
pub const COINBASE_REWARD: u64 = 100;

/// Highest meaningful difficulty: a 64-hex-digit hash can demand at most
/// 64 leading zeros.
pub const MAX_DIFFICULTY: u32 = 64;

/// Maximum number of mempool transactions included in a mined block
/// (on top of the coinbase).
pub const BLOCK_TX_CAP: usize = 2;

/// Quiet window before the miner acts on a restart request, so bursts of
/// tip/mempool changes collapse into one restart.
pub const MINE_DEBOUNCE_MS: u64 = 250;

/// How far into the future a block timestamp may lie before the block is
/// rejected.
pub const MAX_FUTURE_DRIFT_MS: u64 = 60_000;

/// Parent hash carried by the genesis block.
pub const GENESIS_PREV_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

pub const DEFAULT_HTTP_PORT: u16 = 3001;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_prev_hash_is_64_zeros() {
        assert_eq!(GENESIS_PREV_HASH.len(), 64);
        assert!(GENESIS_PREV_HASH.chars().all(|c| c == '0'));
    }

    #[test]
    fn difficulty_cap_matches_hex_width() {
        assert_eq!(MAX_DIFFICULTY, 64);
    }
}
