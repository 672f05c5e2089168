//! Wires the periodic tasks (gossip, requester, receiver, saver,
//! display, miner) together around one `NodeState`, one `tokio::spawn`
//! per maintenance task.

use std::sync::Arc;

use primitive_types::U256;
use tokio::sync::Notify;

use crate::core::params::{DISPLAY_PERIOD_MS, DISPLAY_WARMUP_MS, SAVE_PERIOD_MS};
use crate::network::{gossip_task, receiver_task, requester_task};
use crate::NodeState;

/// Saves the canonical chain to disk every `SAVE_PERIOD_MS`. Logged and
/// retried on the next cycle rather than treated as fatal — a save
/// failure shouldn't take the node down.
async fn saver_task(state: Arc<NodeState>) {
    let mut interval = tokio::time::interval(std::time::Duration::from_millis(SAVE_PERIOD_MS));
    loop {
        interval.tick().await;
        let chain = state.chain.read().await;
        if let Err(e) = state.storage.save_chain(&chain) {
            tracing::error!("💾 chain save failed: {}", e);
        } else {
            tracing::debug!("💾 saved chain at height {}", chain.get_height(&chain.tip_hash()).unwrap_or(0));
        }
    }
}

/// Prints a one-line status snapshot once a second, after an initial
/// warm-up delay so the first line reflects post-load state.
async fn display_task(state: Arc<NodeState>) {
    tokio::time::sleep(std::time::Duration::from_millis(DISPLAY_WARMUP_MS)).await;
    let mut interval = tokio::time::interval(std::time::Duration::from_millis(DISPLAY_PERIOD_MS));
    loop {
        interval.tick().await;
        crate::display::print_status(&state).await;
    }
}

/// Starts every periodic task for the node and runs until the process is
/// asked to shut down. Mining is spawned only when `secret_key` mining is
/// enabled on `state`.
pub async fn run(state: Arc<NodeState>, secret_key: U256, display: bool, shutdown: Arc<Notify>) {
    tracing::info!("🌐 node started");

    let gossip = tokio::spawn(gossip_task(state.clone()));
    let requester = tokio::spawn(requester_task(state.clone()));
    let receiver = tokio::spawn(receiver_task(state.clone()));
    let saver = tokio::spawn(saver_task(state.clone()));

    let display_handle = if display {
        Some(tokio::spawn(display_task(state.clone())))
    } else {
        None
    };

    let miner_handle = if state.mining_enabled {
        Some(tokio::spawn(crate::miner::mining_loop(state.clone(), secret_key, shutdown.clone())))
    } else {
        None
    };

    shutdown.notified().await;
    tracing::info!("🛑 shutting down, flushing chain to disk");

    gossip.abort();
    requester.abort();
    receiver.abort();
    saver.abort();
    if let Some(h) = display_handle {
        h.abort();
    }
    if let Some(h) = miner_handle {
        let _ = h.await;
    }

    if let Err(e) = state.storage.save_chain(&*state.chain.read().await) {
        tracing::error!("final chain save failed: {}", e);
    }
    tracing::info!("👋 shutdown complete");
}
