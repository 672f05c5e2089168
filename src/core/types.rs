//! Core data model: hashes, block times, slices, and blocks.
//!
//! `time` is specified as a single 256-bit value whose high 64 bits are a
//! wall-clock millisecond timestamp and whose low 192 bits are the PoW
//! nonce. `BlockTime` wraps a `primitive_types::U256` so the two halves
//! never need to be juggled as raw integers at the call sites.

use primitive_types::U256;

/// A 256-bit block/slice hash.
pub type Hash = [u8; 32];

/// Sentinel hash denoting "no predecessor" — also the genesis block's own
/// hash, by protocol definition (see `hash_block`).
pub const ZERO_HASH: Hash = [0u8; 32];

const NONCE_BITS: u32 = 192;

/// `time`'s high 64 bits (milliseconds since epoch) and low 192 bits
/// (the PoW nonce), packed into one `U256`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTime(pub U256);

impl BlockTime {
    pub fn new(millis: u64, nonce192: U256) -> Self {
        let masked_nonce = nonce192 & ((U256::one() << NONCE_BITS) - U256::one());
        BlockTime((U256::from(millis) << NONCE_BITS) | masked_nonce)
    }

    /// Wall-clock timestamp in milliseconds since epoch.
    pub fn millis(&self) -> u64 {
        (self.0 >> NONCE_BITS).low_u64()
    }

    /// The PoW nonce occupying the low 192 bits.
    pub fn nonce192(&self) -> U256 {
        self.0 & ((U256::one() << NONCE_BITS) - U256::one())
    }

    pub fn zero() -> Self {
        BlockTime(U256::zero())
    }

    pub fn numeric(&self) -> U256 {
        self.0
    }
}

/// A user-submitted payload fragment. Slices are bit-strings, not
/// necessarily byte-aligned, so the declared bit length travels with the
/// backing bytes rather than being inferred from `bits.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slice {
    pub bits: Vec<u8>,
    pub bit_len: usize,
}

impl Slice {
    pub fn new(bits: Vec<u8>, bit_len: usize) -> Self {
        Slice { bits, bit_len }
    }

    /// Bytes actually carrying `bit_len` bits (the minimum byte-aligned
    /// prefix of `bits`).
    pub fn byte_len(&self) -> usize {
        (self.bit_len + 7) / 8
    }
}

/// An ordered list of slices, serialized into at most `BODY_SIZE` bytes.
pub type Body = Vec<Slice>;

/// A candidate or admitted block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub prev: Hash,
    pub time: BlockTime,
    pub body: Body,
}

impl Block {
    /// The unique genesis block: `prev = ZERO_HASH`, `time = 0`, `body = []`.
    pub fn genesis() -> Self {
        Block {
            prev: ZERO_HASH,
            time: BlockTime::zero(),
            body: Vec::new(),
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.prev == ZERO_HASH && self.time.numeric().is_zero() && self.body.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_time_round_trips_millis_and_nonce() {
        let nonce = U256::from(0xDEAD_BEEFu64);
        let t = BlockTime::new(1_700_000_000_000, nonce);
        assert_eq!(t.millis(), 1_700_000_000_000);
        assert_eq!(t.nonce192(), nonce);
    }

    #[test]
    fn block_time_masks_nonce_to_192_bits() {
        let oversized_nonce = U256::MAX;
        let t = BlockTime::new(1, oversized_nonce);
        assert_eq!(t.nonce192(), oversized_nonce & ((U256::one() << NONCE_BITS) - U256::one()));
        assert_eq!(t.millis(), 1);
    }

    #[test]
    fn genesis_block_is_recognized() {
        assert!(Block::genesis().is_genesis());
    }

    #[test]
    fn slice_byte_len_rounds_up() {
        let s = Slice::new(vec![0xFF, 0x00], 9);
        assert_eq!(s.byte_len(), 2);
    }
}
