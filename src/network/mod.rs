//! UDP peer table, gossip/requester tasks, and the inbound message
//! dispatcher.
//!
//! Same `Arc<NodeState>` + `RwLock`/`Mutex` + `tokio::select!` shape used
//! throughout the rest of this node, applied to one UDP socket: there is
//! no per-peer connection or handshake, just datagrams in and out.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::codec::{decode_message, encode_message, Message, PeerAddress};
use crate::core::types::Hash;
use crate::crypto::hash_block;
use crate::NodeState;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as u64
}

#[derive(Debug, Clone)]
pub struct PeerEntry {
    pub address: SocketAddr,
    pub seen_at: u64,
}

fn peer_key(addr: &SocketAddr) -> Vec<u8> {
    match addr {
        SocketAddr::V4(a) => {
            let mut k = vec![4u8];
            k.extend_from_slice(&a.ip().octets());
            k.extend_from_slice(&a.port().to_be_bytes());
            k
        }
        SocketAddr::V6(a) => {
            let mut k = vec![6u8];
            k.extend_from_slice(&a.ip().octets());
            k.extend_from_slice(&a.port().to_be_bytes());
            k
        }
    }
}

/// `peers: map from serialized-address -> {address, seen_at}`. No
/// eviction — entries live for the node's lifetime once first gossiped.
#[derive(Default)]
pub struct PeerTable {
    entries: HashMap<Vec<u8>, PeerEntry>,
}

impl PeerTable {
    pub fn new() -> Self {
        PeerTable { entries: HashMap::new() }
    }

    pub fn upsert(&mut self, addr: SocketAddr, seen_at: u64) {
        self.entries.insert(peer_key(&addr), PeerEntry { address: addr, seen_at });
    }

    pub fn addresses(&self) -> impl Iterator<Item = &SocketAddr> {
        self.entries.values().map(|e| &e.address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn to_peer_address(addr: &SocketAddr) -> PeerAddress {
    match addr {
        SocketAddr::V4(a) => PeerAddress { ip_family: 4, ip_bytes: a.ip().octets().to_vec(), port: a.port() },
        SocketAddr::V6(a) => PeerAddress { ip_family: 6, ip_bytes: a.ip().octets().to_vec(), port: a.port() },
    }
}

fn from_peer_address(addr: &PeerAddress) -> Option<SocketAddr> {
    use std::net::{Ipv4Addr, Ipv6Addr};
    match addr.ip_family {
        4 => {
            let o: [u8; 4] = addr.ip_bytes.clone().try_into().ok()?;
            Some(SocketAddr::from((Ipv4Addr::from(o), addr.port)))
        }
        6 => {
            let o: [u8; 16] = addr.ip_bytes.clone().try_into().ok()?;
            Some(SocketAddr::from((Ipv6Addr::from(o), addr.port)))
        }
        _ => None,
    }
}

async fn send_to(state: &Arc<NodeState>, addr: &SocketAddr, msg: &Message) {
    let bytes = encode_message(msg);
    if let Err(e) = state.socket.send_to(&bytes, addr).await {
        tracing::debug!("send to {} failed: {}", addr, e);
    }
}

/// Broadcasts `PutBlock(tip_block)` to every known peer, once a second.
pub async fn gossip_task(state: Arc<NodeState>) {
    let mut interval = tokio::time::interval(std::time::Duration::from_millis(
        crate::core::params::GOSSIP_PERIOD_MS,
    ));
    loop {
        interval.tick().await;
        let tip_block = {
            let chain = state.chain.read().await;
            let h = chain.tip_hash();
            chain.get_block(&h).expect("tip always has a block entry").clone()
        };
        let msg = Message::PutBlock(tip_block);
        let addrs: Vec<SocketAddr> = state.peers.read().await.addresses().copied().collect();
        for addr in addrs {
            send_to(&state, &addr, &msg).await;
        }
    }
}

/// For each candidate missing-parent hash, broadcasts `AskBlock(p)` to
/// all peers, 32 times a second. Uses the literal (always-empty) bug
/// predicate by default; `--corrected-requester` switches to the
/// corrected one. See `core::chain::ChainStore` for both.
pub async fn requester_task(state: Arc<NodeState>) {
    let mut interval = tokio::time::interval(std::time::Duration::from_millis(
        crate::core::params::REQUEST_PERIOD_MS,
    ));
    loop {
        interval.tick().await;
        let candidates: Vec<Hash> = {
            let chain = state.chain.read().await;
            if state.corrected_requester {
                chain.requester_candidates_corrected()
            } else {
                chain.requester_candidates_literal()
            }
        };
        if candidates.is_empty() {
            continue;
        }
        let addrs: Vec<SocketAddr> = state.peers.read().await.addresses().copied().collect();
        for p in candidates {
            let msg = Message::AskBlock(p);
            for addr in &addrs {
                send_to(&state, addr, &msg).await;
            }
        }
    }
}

/// Continuously receives datagrams and dispatches them. This models the
/// "15.625 ms receiver cadence" as a blocking receive loop instead of a
/// fixed-interval poll — waking on every datagram dominates any fixed
/// poll rate.
pub async fn receiver_task(state: Arc<NodeState>) {
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let (n, from) = match state.socket.recv_from(&mut buf).await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("UDP recv failed: {}", e);
                continue;
            }
        };
        match decode_message(&buf[..n]) {
            Ok(msg) => dispatch(&state, from, msg).await,
            Err(e) => tracing::debug!("dropping malformed datagram from {}: {}", from, e),
        }
    }
}

async fn dispatch(state: &Arc<NodeState>, from: SocketAddr, msg: Message) {
    match msg {
        Message::PutPeers(addrs) => {
            let now = now_ms();
            let mut peers = state.peers.write().await;
            for a in &addrs {
                if let Some(sock_addr) = from_peer_address(a) {
                    peers.upsert(sock_addr, now);
                }
            }
        }
        Message::PutBlock(block) => {
            let block_hash = hash_block(&block);
            let tip_updated = state.chain.write().await.handle_block(block, now_ms());
            tracing::debug!("📡 received block {} (tip updated: {})", hex::encode(block_hash), tip_updated);
            if tip_updated && state.mining_enabled {
                rebuild_body(state).await;
            }
        }
        Message::AskBlock(hash) => {
            let block = state.chain.read().await.get_block(&hash).cloned();
            if let Some(block) = block {
                send_to(state, &from, &Message::PutBlock(block)).await;
            }
        }
        Message::PutSlice(slice) => {
            let hash = crate::crypto::hash_pow_slice(&slice);
            let numeric = primitive_types::U256::from_big_endian(&hash);
            let score = crate::core::algebra::difficulty(numeric);
            state.mempool.lock().await.insert(score, slice);
        }
    }
}

pub async fn rebuild_body(state: &Arc<NodeState>) {
    let mined = {
        let chain = state.chain.read().await;
        let tip = chain.tip_hash();
        chain.get_mined_slices(&tip).cloned()
    };
    if let Some(mined) = mined {
        let mut mempool = state.mempool.lock().await;
        let body = crate::mempool::build_body(&mut mempool, &mined);
        *state.body.lock().await = body;
    }
}

/// One-shot helper used at startup and by the gossip handshake: turns
/// our current peer table into a `PutPeers` announcement.
pub async fn announce_self(state: &Arc<NodeState>, to: SocketAddr) {
    let addrs: Vec<PeerAddress> = state.peers.read().await.addresses().map(to_peer_address).collect();
    send_to(state, &to, &Message::PutPeers(addrs)).await;
}

pub fn mined_count(state: &Arc<NodeState>) -> u64 {
    state.mined_count.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn peer_table_upsert_then_list_round_trips_address() {
        let mut table = PeerTable::new();
        let addr = SocketAddr::from((Ipv4Addr::new(127, 0, 0, 1), 42000));
        table.upsert(addr, 1000);
        assert_eq!(table.len(), 1);
        assert_eq!(table.addresses().next(), Some(&addr));
    }

    #[test]
    fn peer_address_conversion_round_trips_v4_and_v6() {
        let v4 = SocketAddr::from((Ipv4Addr::new(10, 0, 0, 1), 7));
        assert_eq!(from_peer_address(&to_peer_address(&v4)), Some(v4));

        let v6 = SocketAddr::from((std::net::Ipv6Addr::LOCALHOST, 9));
        assert_eq!(from_peer_address(&to_peer_address(&v6)), Some(v6));
    }

    #[test]
    fn re_upserting_the_same_address_updates_seen_at_without_duplicating() {
        let mut table = PeerTable::new();
        let addr = SocketAddr::from((Ipv4Addr::new(1, 2, 3, 4), 1));
        table.upsert(addr, 1);
        table.upsert(addr, 2);
        assert_eq!(table.len(), 1);
    }
}
