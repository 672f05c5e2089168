//! CLI surface, `clap::Parser`-derived.

use std::path::PathBuf;

use clap::Parser;

use crate::core::params::DEFAULT_PORT;

const DEFAULT_DATA_DIR: &str = "ubilog_data";

#[derive(Parser, Debug)]
#[command(name = "ubilog", version, about = "A peer-to-peer proof-of-work chain core")]
pub struct Cli {
    /// UDP port to listen on.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Print a status line to the terminal once a second.
    #[arg(long, default_value_t = false)]
    pub display: bool,

    /// Mine new blocks against the tip.
    #[arg(long, default_value_t = false)]
    pub mine: bool,

    /// Secret key mixed into every mining nonce.
    #[arg(long, default_value_t = 0)]
    pub secret_key: u64,

    /// Peers to connect to at startup, as `host[:port]`.
    #[arg(long = "connect", value_name = "HOST[:PORT]")]
    pub peers: Vec<String>,

    /// Use the corrected requester predicate instead of the literal one.
    #[arg(long, default_value_t = false)]
    pub corrected_requester: bool,

    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,
}

/// Parsed, validated configuration derived from `Cli`.
pub struct Config {
    pub port: u16,
    pub display: bool,
    pub mine: bool,
    pub secret_key: u64,
    pub peers: Vec<(String, Option<u16>)>,
    pub corrected_requester: bool,
    pub data_dir: PathBuf,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        let peers = cli
            .peers
            .into_iter()
            .map(|p| match p.rsplit_once(':') {
                Some((host, port)) => match port.parse::<u16>() {
                    Ok(port) => (host.to_string(), Some(port)),
                    Err(_) => (p.clone(), None),
                },
                None => (p, None),
            })
            .collect();

        Config {
            port: cli.port,
            display: cli.display,
            mine: cli.mine,
            secret_key: cli.secret_key,
            peers,
            corrected_requester: cli.corrected_requester,
            data_dir: cli.data_dir,
        }
    }
}
