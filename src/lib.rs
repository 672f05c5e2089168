//! `ubilog`: a small peer-to-peer proof-of-work chain core.
//!
//! The binary wires together a [`core::chain::ChainStore`], a
//! [`mempool::Mempool`], a miner, a UDP gossip layer, and flat-file
//! persistence around one shared [`NodeState`].

pub mod codec;
pub mod config;
pub mod core;
pub mod crypto;
pub mod display;
pub mod mempool;
pub mod miner;
pub mod network;
pub mod scheduler;
pub mod storage;

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::{Mutex, RwLock};

use crate::core::chain::ChainStore;
use crate::core::types::Body;
use crate::mempool::Mempool;
use crate::network::PeerTable;
use crate::storage::Storage;

/// Everything the node's tasks (miner, gossip, requester, receiver,
/// saver, display) share. Per the single-threaded cooperative scheduling
/// model, the locks here exist so the same state can be driven from a
/// multi-threaded Tokio runtime without corrupting it — at most one task
/// actually contends on any given lock at a time in normal operation.
pub struct NodeState {
    pub chain: RwLock<ChainStore>,
    pub mempool: Mutex<Mempool>,
    /// The body currently being assembled against the tip; rebuilt
    /// whenever the tip advances and mining is enabled.
    pub body: Mutex<Body>,
    pub peers: RwLock<PeerTable>,
    pub storage: Storage,
    pub socket: UdpSocket,
    pub mining_enabled: bool,
    /// Use the literal (always-empty) requester predicate unless
    /// overridden — see [`core::chain::ChainStore::requester_candidates_literal`].
    pub corrected_requester: bool,
    pub mined_count: AtomicU64,
}

impl NodeState {
    pub fn new(socket: UdpSocket, storage: Storage, mining_enabled: bool, corrected_requester: bool) -> Arc<Self> {
        Arc::new(NodeState {
            chain: RwLock::new(ChainStore::new()),
            mempool: Mutex::new(Mempool::new()),
            body: Mutex::new(Vec::new()),
            peers: RwLock::new(PeerTable::new()),
            storage,
            socket,
            mining_enabled,
            corrected_requester,
            mined_count: AtomicU64::new(0),
        })
    }
}
