//! Terminal status line, printed once a second when `--display` is set.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use colored::Colorize;

use crate::NodeState;

pub async fn print_status(state: &Arc<NodeState>) {
    let chain = state.chain.read().await;
    let tip = chain.tip_hash();
    let (work, _) = chain.tip();
    let height = chain.get_height(&tip).unwrap_or(0);
    drop(chain);

    let peers = state.peers.read().await.len();
    let mempool_len = state.mempool.lock().await.len();
    let mined = state.mined_count.load(Ordering::Relaxed);

    println!(
        "{} height={} work={} tip={} peers={} mempool={} mined={}",
        "ubilog".bold().cyan(),
        height,
        work,
        &hex::encode(tip)[..16],
        peers,
        mempool_len,
        mined,
    );
}
