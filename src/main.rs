use std::net::ToSocketAddrs;
use std::sync::Arc;

use clap::Parser;
use primitive_types::U256;
use tokio::net::UdpSocket;
use tokio::sync::Notify;

use ubilog::config::{Cli, Config};
use ubilog::core::params::DEFAULT_PORT;
use ubilog::network;
use ubilog::scheduler;
use ubilog::storage::Storage;
use ubilog::NodeState;

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as u64
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("ubilog=info".parse().unwrap()),
        )
        .init();

    let config: Config = Cli::parse().into();

    let rt = tokio::runtime::Runtime::new().expect("failed to start the Tokio runtime");
    rt.block_on(run_node(config));
}

async fn run_node(config: Config) {
    let storage = Storage::open(&config.data_dir).unwrap_or_else(|e| {
        tracing::error!("failed to open data directory {:?}: {}", config.data_dir, e);
        std::process::exit(1);
    });

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let socket = UdpSocket::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind UDP socket on {}: {}", bind_addr, e));
    tracing::info!("🌐 listening on {}", bind_addr);

    let state = NodeState::new(socket, storage, config.mine, config.corrected_requester);

    tracing::info!("💾 loading chain from disk...");
    match state.storage.load() {
        Ok(blocks) => {
            let mut chain = state.chain.write().await;
            let now = now_ms();
            for block in blocks {
                chain.handle_block(block, now);
            }
            tracing::info!("💾 loaded chain at height {}", chain.get_height(&chain.tip_hash()).unwrap_or(0));
        }
        // A filesystem error while loading is fatal at startup, unlike a
        // save failure later on: there's no partial-chain state worth
        // continuing from genesis with if we can't trust what's on disk.
        Err(e) => {
            tracing::error!("failed to load chain from {:?}: {}", config.data_dir, e);
            std::process::exit(1);
        }
    }

    if config.mine {
        network::rebuild_body(&state).await;
    }

    for (host, port) in &config.peers {
        let addr_str = format!("{}:{}", host, port.unwrap_or(DEFAULT_PORT));
        match addr_str.to_socket_addrs() {
            Ok(mut addrs) => {
                if let Some(addr) = addrs.next() {
                    tracing::info!("🔗 connecting to {}", addr);
                    state.peers.write().await.upsert(addr, now_ms());
                }
            }
            Err(e) => tracing::warn!("could not resolve peer {}: {}", addr_str, e),
        }
    }

    let shutdown = Arc::new(Notify::new());
    let shutdown_for_handler = shutdown.clone();
    ctrlc::set_handler(move || {
        tracing::info!("🛑 received interrupt, shutting down...");
        shutdown_for_handler.notify_waiters();
    })
    .expect("failed to install Ctrl-C handler");

    let secret_key = U256::from(config.secret_key);
    scheduler::run(state, secret_key, config.display, shutdown).await;
}
