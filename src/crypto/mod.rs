//! Hashing primitives for Ubilog.
//!
//! `hash_block`/`hash_pow_slice` are the only two places the core touches
//! Keccak-256; the hash itself is an out-of-scope external collaborator,
//! wrapped here in one function so the rest of the crate never imports
//! `sha3` directly.

pub mod hash;

pub use hash::{hash_block, hash_pow_slice, keccak256};
