//! Ubilog protocol parameters.
//!
//! All consensus-critical constants are defined here; they must agree
//! across every peer on the network.

/// Maximum serialized size of a block body, in bytes.
pub const BODY_SIZE: usize = 1280;

/// Number of blocks between difficulty retargets.
pub const BLOCKS_PER_PERIOD: u64 = 20;

/// Target time between consecutive blocks, in milliseconds.
pub const TIME_PER_BLOCK: u64 = 3_000;

/// Target time for a whole retarget period, in milliseconds.
pub const TIME_PER_PERIOD: u64 = TIME_PER_BLOCK * BLOCKS_PER_PERIOD;

/// How far into the future (ms) a block's timestamp may be before it is
/// dropped outright rather than admitted or parked.
pub const DELAY_TOLERANCE: u64 = 60_000;

/// Genesis difficulty (expected hashes per block at network start).
pub const INITIAL_DIFFICULTY: u64 = 256;

/// Default UDP port for the gossip network.
pub const DEFAULT_PORT: u16 = 42000;

/// Upper bound on mining attempts drawn before a miner yields back to the
/// scheduler and re-enqueues itself.
pub const MAX_ATTEMPTS_PER_SLICE: u32 = 1024;

/// Scheduler cadences: how often gossip, the requester, the saver, and
/// the display line each run.
pub const GOSSIP_PERIOD_MS: u64 = 1_000;
pub const REQUEST_PERIOD_MS: u64 = 31;
pub const SAVE_PERIOD_MS: u64 = 30_000;
pub const DISPLAY_PERIOD_MS: u64 = 1_000;
pub const DISPLAY_WARMUP_MS: u64 = 900;
