//! PoW search over a candidate block derived from the tip and mempool.
//!
//! Runs as a `tokio::task::spawn_blocking` loop so the CPU-bound hash
//! search never blocks the async executor.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use primitive_types::U256;
use rand::rngs::OsRng;
use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};
use tokio::sync::Notify;

use crate::core::params::MAX_ATTEMPTS_PER_SLICE;
use crate::core::types::{Block, BlockTime, Body, Hash};
use crate::crypto::{hash_block, keccak256};
use crate::NodeState;

fn be32(value: U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as u64
}

pub struct MineAttempt {
    pub block: Block,
    pub rand: u64,
}

/// One attempt batch: draws a fresh `ChaCha20Rng` seeded from `OsRng` —
/// never a fixed or weak seed, which would let peers predict or replay
/// nonces — and tries up to `MAX_ATTEMPTS_PER_SLICE` nonces against the
/// tip's target.
pub fn attempt_batch(secret_key: U256, prev: Hash, prev_target: U256, body: Body) -> Option<MineAttempt> {
    let mut rng = ChaCha20Rng::from_rng(OsRng).expect("OsRng must be able to seed the CSPRNG");

    for _ in 0..MAX_ATTEMPTS_PER_SLICE {
        let rand_bits = rng.next_u64();
        let nonce = (secret_key << 64) | U256::from(rand_bits);
        let nonce_hash = keccak256(&be32(nonce));
        let low192 = U256::from_big_endian(&nonce_hash) & ((U256::one() << 192) - U256::one());

        let candidate = Block {
            prev,
            time: BlockTime::new(now_ms(), low192),
            body: body.clone(),
        };

        let numeric_hash = U256::from_big_endian(&hash_block(&candidate));
        if numeric_hash > prev_target {
            return Some(MineAttempt { block: candidate, rand: rand_bits });
        }
    }

    None
}

/// Self-rescheduling mining loop: each attempt batch yields back to the
/// scheduler between batches, and picks up the latest tip/body on every
/// iteration so a concurrent tip change is reflected immediately.
pub async fn mining_loop(state: Arc<NodeState>, secret_key: U256, shutdown: Arc<Notify>) {
    loop {
        let shutdown_signalled = shutdown.notified();
        tokio::pin!(shutdown_signalled);

        let (prev, prev_target, body) = {
            let chain = state.chain.read().await;
            let tip = chain.tip_hash();
            let target = chain.get_target(&tip).expect("tip always has a target");
            let body = state.body.lock().await.clone();
            (tip, target, body)
        };

        let attempt = tokio::select! {
            result = tokio::task::spawn_blocking(move || attempt_batch(secret_key, prev, prev_target, body)) => {
                result.expect("mining task panicked")
            }
            _ = &mut shutdown_signalled => return,
        };

        match attempt {
            Some(MineAttempt { block, rand }) => {
                let block_hash = hash_block(&block);
                let tip_updated = state.chain.write().await.handle_block(block, now_ms());
                if tip_updated {
                    state
                        .storage
                        .save_mined(&block_hash, rand)
                        .unwrap_or_else(|e| tracing::error!("failed to persist mined block: {}", e));
                    state.mined_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    tracing::info!("⛏️  mined block {}", hex::encode(block_hash));
                    if state.mining_enabled {
                        let mined = {
                            let chain = state.chain.read().await;
                            let tip = chain.tip_hash();
                            chain.get_mined_slices(&tip).cloned()
                        };
                        if let Some(mined) = mined {
                            let mut mempool = state.mempool.lock().await;
                            let new_body = crate::mempool::build_body(&mut mempool, &mined);
                            *state.body.lock().await = new_body;
                        }
                    }
                } else {
                    tracing::debug!("mined block did not advance the tip (lost a race), discarding");
                }
            }
            None => {
                tokio::task::yield_now().await;
            }
        }
    }
}
