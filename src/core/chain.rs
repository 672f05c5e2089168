//! The chain store: block tree, per-block metadata, pending/orphan index,
//! and heaviest-tip tracking.
//!
//! One struct of hash-keyed maps, per the design notes — no per-block
//! objects with back-references, no pointer cycles. Parents are always
//! referenced by hash.

use std::collections::{HashMap, HashSet, VecDeque};

use im::HashSet as PersistentHashSet;
use primitive_types::U256;

use crate::core::algebra::{compute_target, difficulty, next_target, retarget_scale};
use crate::core::params::{BLOCKS_PER_PERIOD, DELAY_TOLERANCE, INITIAL_DIFFICULTY, TIME_PER_PERIOD};
use crate::core::types::{Block, Hash, ZERO_HASH};
use crate::crypto::hash_block;

/// `mined_slices[h]` is the union of all slice-contents on the path from
/// genesis to `h`, keyed by each slice's serialized bytes so membership
/// checks don't need the slice's declared bit length.
pub type MinedSlices = PersistentHashSet<Vec<u8>>;

fn slice_key(slice: &crate::core::types::Slice) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + slice.byte_len());
    key.extend_from_slice(&(slice.bit_len as u64).to_be_bytes());
    key.extend_from_slice(&slice.bits[..slice.byte_len()]);
    key
}

/// Block tree + per-block metadata, all maps keyed by block hash.
pub struct ChainStore {
    block: HashMap<Hash, Block>,
    children: HashMap<Hash, Vec<Hash>>,
    pending: HashMap<Hash, Vec<Block>>,
    work: HashMap<Hash, U256>,
    height: HashMap<Hash, u64>,
    target: HashMap<Hash, U256>,
    mined_slices: HashMap<Hash, MinedSlices>,
    seen: HashSet<Hash>,
    tip: (U256, Hash),
}

impl ChainStore {
    /// Seeds every map with an entry at `ZERO_HASH`: `work=0, height=0,
    /// target=INITIAL_TARGET, mined_slices=∅`.
    pub fn new() -> Self {
        let initial_target = compute_target(U256::from(INITIAL_DIFFICULTY));
        let mut store = ChainStore {
            block: HashMap::new(),
            children: HashMap::new(),
            pending: HashMap::new(),
            work: HashMap::new(),
            height: HashMap::new(),
            target: HashMap::new(),
            mined_slices: HashMap::new(),
            seen: HashSet::new(),
            tip: (U256::zero(), ZERO_HASH),
        };
        store.block.insert(ZERO_HASH, Block::genesis());
        store.children.insert(ZERO_HASH, Vec::new());
        store.work.insert(ZERO_HASH, U256::zero());
        store.height.insert(ZERO_HASH, 0);
        store.target.insert(ZERO_HASH, initial_target);
        store.mined_slices.insert(ZERO_HASH, MinedSlices::new());
        store.seen.insert(ZERO_HASH);
        store
    }

    pub fn get_block(&self, h: &Hash) -> Option<&Block> {
        self.block.get(h)
    }

    pub fn get_target(&self, h: &Hash) -> Option<U256> {
        self.target.get(h).copied()
    }

    pub fn get_work(&self, h: &Hash) -> Option<U256> {
        self.work.get(h).copied()
    }

    pub fn get_height(&self, h: &Hash) -> Option<u64> {
        self.height.get(h).copied()
    }

    pub fn get_mined_slices(&self, h: &Hash) -> Option<&MinedSlices> {
        self.mined_slices.get(h)
    }

    pub fn tip(&self) -> (U256, Hash) {
        self.tip
    }

    pub fn tip_hash(&self) -> Hash {
        self.tip.1
    }

    pub fn pending_keys(&self) -> impl Iterator<Item = &Hash> {
        self.pending.keys()
    }

    pub fn is_seen(&self, h: &Hash) -> bool {
        self.seen.contains(h)
    }

    pub fn is_admitted(&self, h: &Hash) -> bool {
        self.block.contains_key(h)
    }

    /// The requester's literal predicate: `pending.keys()` filtered to
    /// `seen[p] == false`. `add_block` always sets `seen` on a freshly
    /// parked orphan, so this is expected to return empty in practice —
    /// preserved verbatim, not silently corrected.
    pub fn requester_candidates_literal(&self) -> Vec<Hash> {
        self.pending
            .keys()
            .filter(|p| !self.seen.contains(*p))
            .copied()
            .collect()
    }

    /// The corrected requester: actual missing-parent hashes, i.e. keys of
    /// `pending` that are not themselves in `block`.
    pub fn requester_candidates_corrected(&self) -> Vec<Hash> {
        self.pending
            .keys()
            .filter(|p| !self.block.contains_key(*p))
            .copied()
            .collect()
    }

    /// Walk from the tip through `prev` until `ZERO_HASH`, then reverse so
    /// the result reads genesis-first.
    pub fn get_longest_chain(&self) -> Vec<Hash> {
        let mut chain = Vec::new();
        let mut cur = self.tip.1;
        loop {
            chain.push(cur);
            if cur == ZERO_HASH {
                break;
            }
            cur = self
                .block
                .get(&cur)
                .expect("admitted block must have its own entry")
                .prev;
        }
        chain.reverse();
        chain
    }

    fn walk_back(&self, mut h: Hash, steps: u64) -> Hash {
        for _ in 0..steps {
            let prev = self
                .block
                .get(&h)
                .expect("ancestor of an admitted block is itself admitted")
                .prev;
            if h == ZERO_HASH {
                break;
            }
            h = prev;
        }
        h
    }

    /// `handle_block(block, now)`: drains a worklist seeded with `block`,
    /// cascading admission through `pending` depth-first. Returns whether
    /// the tip was updated at any point during the cascade.
    ///
    /// Never panics on adversarial input — malformed or future-dated
    /// blocks are rejected by the time gate or validity check and leave
    /// state untouched beyond `seen`/`pending` bookkeeping.
    pub fn handle_block(&mut self, block: Block, now: u64) -> bool {
        let mut tip_was_updated = false;
        let mut worklist: VecDeque<Block> = VecDeque::new();
        worklist.push_back(block);

        while let Some(b) = worklist.pop_front() {
            let b_time = b.time.millis();
            if b_time >= now + DELAY_TOLERANCE {
                tracing::warn!("dropping future-dated block (time={}, now={})", b_time, now);
                continue;
            }
            if let Some(h) = self.add_block(b, &mut tip_was_updated) {
                if let Some(waiters) = self.pending.remove(&h) {
                    // Preserve `pending[parent]`'s list order while still
                    // draining depth-first: push front in reverse so the
                    // first waiter ends up at the very front.
                    for w in waiters.into_iter().rev() {
                        worklist.push_front(w);
                    }
                }
            }
        }

        tip_was_updated
    }

    /// The admission step of `handle_block`. Returns `Some(hash)` when the
    /// block's parent was present (whether or not the block itself was
    /// valid) so the caller can drain its `pending` waiters; `None` when
    /// it was already admitted or was queued as an orphan.
    fn add_block(&mut self, b: Block, tip_was_updated: &mut bool) -> Option<Hash> {
        let h = hash_block(&b);

        if self.block.contains_key(&h) {
            return None;
        }

        if !self.block.contains_key(&b.prev) {
            if !self.seen.contains(&h) {
                tracing::debug!("parking orphan block {} awaiting parent {}", hex::encode(h), hex::encode(b.prev));
                self.pending.entry(b.prev).or_default().push(b);
                self.seen.insert(h);
            }
            // Else: already queued, drop.
            return None;
        }

        let prev_hash = b.prev;
        let prev_block_time = self.block.get(&prev_hash).unwrap().time.millis();
        let prev_target = *self.target.get(&prev_hash).unwrap();
        let prev_work = *self.work.get(&prev_hash).unwrap();
        let prev_height = *self.height.get(&prev_hash).unwrap();

        let mut mined = self.mined_slices.get(&prev_hash).unwrap().clone();
        for slice in &b.body {
            mined.insert(slice_key(slice));
        }

        self.block.insert(h, b.clone());
        self.work.insert(h, U256::zero());
        self.height.insert(h, 0);
        self.target.insert(h, U256::zero());
        self.children.entry(h).or_default();
        self.mined_slices.insert(h, mined);

        let b_time = b.time.millis();
        let numeric_hash = U256::from_big_endian(&h);
        let valid = numeric_hash >= prev_target && b_time > prev_block_time;

        if valid {
            let diff = difficulty(numeric_hash);
            let work = prev_work.saturating_add(diff);
            let height = prev_height + 1;

            let target = if height > 0 && height % BLOCKS_PER_PERIOD == 0 {
                let checkpoint = self.walk_back(prev_hash, BLOCKS_PER_PERIOD - 1);
                let checkpoint_time = self.block.get(&checkpoint).unwrap().time.millis();
                let observed = b_time.saturating_sub(checkpoint_time);
                let scale = retarget_scale(TIME_PER_PERIOD, observed);
                next_target(prev_target, scale)
            } else {
                prev_target
            };

            self.work.insert(h, work);
            self.height.insert(h, height);
            self.target.insert(h, target);

            if work > self.tip.0 {
                tracing::info!("🔗 new tip {} (height {}, work {})", hex::encode(h), height, work);
                self.tip = (work, h);
                *tip_was_updated = true;
            }
        } else {
            tracing::warn!("dropping invalid block {} (insufficient work or non-advancing time)", hex::encode(h));
        }

        self.children.entry(prev_hash).or_default().push(h);
        self.seen.insert(h);

        Some(h)
    }
}

impl Default for ChainStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BlockTime;

    fn child_of(prev: Hash, millis: u64, nonce: u64) -> Block {
        Block {
            prev,
            time: BlockTime::new(millis, U256::from(nonce)),
            body: vec![],
        }
    }

    /// Mines (by brute nonce search) a block whose hash satisfies the
    /// given target, so tests don't need the real miner.
    fn mine_above(prev: Hash, target: U256, millis: u64) -> Block {
        for nonce in 0u64..1_000_000 {
            let b = child_of(prev, millis, nonce);
            let h = hash_block(&b);
            if U256::from_big_endian(&h) >= target {
                return b;
            }
        }
        panic!("failed to find a block above target in the search budget");
    }

    #[test]
    fn genesis_only_chain_matches_scenario_one() {
        let store = ChainStore::new();
        assert_eq!(store.get_longest_chain(), vec![ZERO_HASH]);
        assert_eq!(store.tip(), (U256::zero(), ZERO_HASH));
    }

    #[test]
    fn linear_extension_updates_height_and_chain() {
        let mut store = ChainStore::new();
        let target = store.get_target(&ZERO_HASH).unwrap();

        let b1 = mine_above(ZERO_HASH, target, 1_000);
        let h1 = hash_block(&b1);
        assert!(store.handle_block(b1, 10_000_000));

        let b2 = mine_above(h1, store.get_target(&h1).unwrap(), 2_000);
        let h2 = hash_block(&b2);
        assert!(store.handle_block(b2, 10_000_000));

        let b3 = mine_above(h2, store.get_target(&h2).unwrap(), 3_000);
        let h3 = hash_block(&b3);
        assert!(store.handle_block(b3, 10_000_000));

        assert_eq!(store.get_height(&h3), Some(3));
        assert_eq!(store.get_longest_chain(), vec![ZERO_HASH, h1, h2, h3]);
    }

    #[test]
    fn first_block_on_genesis_has_height_one() {
        let mut store = ChainStore::new();
        let target = store.get_target(&ZERO_HASH).unwrap();
        let b1 = mine_above(ZERO_HASH, target, 1_000);
        let h1 = hash_block(&b1);
        store.handle_block(b1, 10_000_000);
        assert_eq!(store.get_height(&h1), Some(1));
    }

    #[test]
    fn out_of_order_arrival_converges_to_same_state() {
        let mut store = ChainStore::new();
        let target = store.get_target(&ZERO_HASH).unwrap();

        let b1 = mine_above(ZERO_HASH, target, 1_000);
        let h1 = hash_block(&b1);
        let b2 = mine_above(h1, target, 2_000);
        let h2 = hash_block(&b2);
        let b3 = mine_above(h2, target, 3_000);
        let h3 = hash_block(&b3);

        store.handle_block(b3, 10_000_000);
        store.handle_block(b2, 10_000_000);
        store.handle_block(b1, 10_000_000);

        assert_eq!(store.get_height(&h3), Some(3));
        assert_eq!(store.get_longest_chain(), vec![ZERO_HASH, h1, h2, h3]);
    }

    #[test]
    fn heavier_fork_wins_the_tip() {
        let mut store = ChainStore::new();
        let target = store.get_target(&ZERO_HASH).unwrap();

        let b1 = mine_above(ZERO_HASH, target, 1_000);
        let h1 = hash_block(&b1);
        store.handle_block(b1, 10_000_000);

        let b1_prime = mine_above(ZERO_HASH, target, 1_500);
        let h1_prime = hash_block(&b1_prime);
        store.handle_block(b1_prime, 10_000_000);

        let b2_prime = mine_above(h1_prime, store.get_target(&h1_prime).unwrap(), 2_500);
        let h2_prime = hash_block(&b2_prime);
        store.handle_block(b2_prime, 10_000_000);

        if store.get_work(&h2_prime).unwrap() > store.get_work(&h1).unwrap() {
            assert_eq!(store.tip_hash(), h2_prime);
        } else {
            assert_eq!(store.tip_hash(), h1);
        }
    }

    #[test]
    fn future_dated_block_is_dropped_untouched() {
        let mut store = ChainStore::new();
        let target = store.get_target(&ZERO_HASH).unwrap();
        let b = mine_above(ZERO_HASH, target, 10_000_000 + DELAY_TOLERANCE);
        let updated = store.handle_block(b.clone(), 10_000_000);
        assert!(!updated);
        assert!(!store.is_admitted(&hash_block(&b)));
    }

    #[test]
    fn reingesting_an_admitted_block_is_a_no_op() {
        let mut store = ChainStore::new();
        let target = store.get_target(&ZERO_HASH).unwrap();
        let b1 = mine_above(ZERO_HASH, target, 1_000);
        store.handle_block(b1.clone(), 10_000_000);
        let tip_before = store.tip();
        let updated = store.handle_block(b1, 10_000_000);
        assert!(!updated);
        assert_eq!(store.tip(), tip_before);
    }
}
