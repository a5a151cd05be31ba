//! Protocol constants. All monetary values in rills (1 RILL = 10^8 rills).

pub const COIN: u64 = 100_000_000;

/// Maximum mining supply. No premine, no dev fund — every rill in existence
/// is paid out through block subsidies.
pub const MAX_SUPPLY: u64 = 21_000_000 * COIN;

/// Upper bound on a single output's value (T3): no output may carry more
/// than the entire mining supply.
pub const MAX_MONEY: u64 = MAX_SUPPLY;

pub const INITIAL_REWARD: u64 = 50 * COIN;
pub const HALVING_INTERVAL: u64 = 210_000;
pub const BLOCK_TIME_SECS: u64 = 60;
pub const BLOCKS_PER_YEAR: u64 = 525_960;
pub const MAGIC_BYTES: [u8; 4] = [0x52, 0x49, 0x4C, 0x4C]; // "RILL"
pub const ADDRESS_PREFIX: &str = "rill1";

/// Number of past block timestamps/targets considered by the retargeting
/// policy (not consensus-critical; see [`crate::difficulty`]).
pub const DIFFICULTY_WINDOW: u64 = 60;

pub const DEFAULT_P2P_PORT: u16 = 18333;
pub const DEFAULT_RPC_PORT: u16 = 18332;
pub const MAX_BLOCK_SIZE: usize = 1_048_576;
pub const MAX_TX_SIZE: usize = 100_000;
pub const MAX_INPUTS: usize = 1000;
pub const MAX_OUTPUTS: usize = 1000;
pub const COINBASE_MATURITY: u64 = 100;
pub const MAX_COINBASE_DATA: usize = 100;
pub const MAX_FUTURE_BLOCK_TIME: u64 = 2 * BLOCK_TIME_SECS;
pub const MAX_LOCATOR_SIZE: usize = 64;
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// A representative fee (in rills) comfortably above the pool's default
/// fee-rate floor for an ordinary-sized transaction. Admission itself gates
/// on fee *rate* ([`MIN_RELAY_FEE_RATE`]), not this absolute figure.
pub const MIN_TX_FEE: u64 = 1000;

/// Minimum fee rate (rills per byte, fixed-point with [`FEE_RATE_PRECISION`])
/// a transaction must pay to be admitted to the pool, and below which a
/// replacement transaction is rejected under the pool's replace-by-fee
/// policy. A [`Mempool`](crate::mempool::Mempool) may be configured with a
/// higher floor via `with_min_fee_rate`.
pub const MIN_RELAY_FEE_RATE: u64 = 1;

/// Fixed-point precision used when representing fee rates as integers.
pub const FEE_RATE_PRECISION: u64 = 1000;

/// Output values below this many rills are rejected as dust.
pub const DUST_THRESHOLD: u64 = 546;

/// Height at which the BIP34-style coinbase height commitment becomes
/// mandatory. Fixed at genesis: every block enforces it from the start.
pub const BIP34_ACTIVATION_HEIGHT: u64 = 0;

/// Bytes identifying this implementation in the coinbase script, appended
/// after the height commitment and extra-nonce. Purely informational —
/// consensus does not inspect it.
pub const IMPLEMENTATION_TAG: &[u8] = b"/rill:0.1/";

/// Default number of seconds a pool entry may live before it is pruned.
pub const DEFAULT_MEMPOOL_MAX_AGE_SECS: u64 = 14 * 24 * 60 * 60;

/// Maximum number of in-mempool ancestors (inclusive of the transaction
/// itself) a pool entry may have before it is rejected.
pub const MAX_ANCESTORS: usize = 25;

/// Maximum number of in-mempool descendants a pool entry may have before
/// further descendants are rejected.
pub const MAX_DESCENDANTS: usize = 25;

/// A replacement transaction must pay at least this many additional rills
/// per byte over the transactions it evicts, on top of their absolute fee.
pub const MIN_REPLACEMENT_FEE_RATE_INCREMENT: u64 = MIN_RELAY_FEE_RATE;
