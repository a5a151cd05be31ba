//! Difficulty adjustment algorithm.
//!
//! Adjusts the proof-of-work difficulty every block using a rolling window
//! of the most recent [`DIFFICULTY_WINDOW`](crate::constants::DIFFICULTY_WINDOW)
//! block intervals.
//!
//! The algorithm compares actual elapsed time against expected time and adjusts
//! the difficulty target proportionally. Per-window adjustments are clamped to
//! [`MAX_ADJUSTMENT_FACTOR`] (4×) to prevent wild swings from timestamp
//! manipulation or sudden hashrate changes.
//!
//! # Difficulty target semantics
//!
//! [`BlockHeader::bits`](crate::types::BlockHeader::bits) is a 32-bit compact
//! encoding of a 256-bit target: the top byte is an exponent, the low 3
//! bytes are the coefficient, `target = coefficient * 256^(exponent - 3)`
//! ([`bits_to_target`]/[`target_to_bits`]). Proof-of-work is valid when the
//! header hash, read as a big-endian 256-bit integer, is `<= target`
//! ([`check_pow`]). [`block_work`] gives each block's contribution to
//! accumulated chain work, `floor(2^256 / (target + 1))`, used for
//! fork-choice.
//!
//! The retarget math runs in 256-bit arithmetic directly over decoded
//! `bits` values: [`next_bits`] adjusts a single target from a window of
//! timestamps, and [`bits_for_height`] wraps it with the windowing policy
//! for a given chain height.
//!
//! # Window sizing
//!
//! At steady state the window contains `DIFFICULTY_WINDOW` intervals
//! (`DIFFICULTY_WINDOW + 1` timestamps). During the early chain (height <
//! `DIFFICULTY_WINDOW + 1`), all available blocks are used, giving a growing
//! window that smoothly transitions to the full size.

use primitive_types::U256;

use crate::constants::{BLOCK_TIME_SECS, DIFFICULTY_WINDOW};
use crate::types::Hash256;

/// Lowest (easiest) target this chain permits, matching the genesis `bits`.
pub const MAX_BITS: u32 = 0x1d00ffff;

/// Decode a compact `bits` field into a 256-bit target.
///
/// `target = coefficient * 256^(exponent - 3)`, where `exponent` is the top
/// byte of `bits` and `coefficient` is the low 3 bytes.
pub fn bits_to_target(bits: u32) -> U256 {
    let exponent = (bits >> 24) as i32;
    let coefficient = U256::from(bits & 0x00ff_ffff);
    let shift = 8 * (exponent - 3);
    if shift >= 0 {
        coefficient << (shift as usize)
    } else {
        coefficient >> ((-shift) as usize)
    }
}

/// Encode a 256-bit target into its minimal compact `bits` representation.
pub fn target_to_bits(target: U256) -> u32 {
    if target.is_zero() {
        return 0;
    }
    let mut bytes = [0u8; 32];
    target.to_big_endian(&mut bytes);
    let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap();
    let mut size = 32 - first_nonzero;

    let mut window = [0u8; 3];
    for (i, slot) in window.iter_mut().enumerate() {
        let idx = first_nonzero + i;
        *slot = if idx < 32 { bytes[idx] } else { 0 };
    }
    let mut coefficient = u32::from_be_bytes([0, window[0], window[1], window[2]]);

    // A coefficient with its high bit set would be read back as a larger
    // exponent; shift it down and grow the exponent to compensate.
    if coefficient & 0x0080_0000 != 0 {
        coefficient >>= 8;
        size += 1;
    }

    ((size as u32) << 24) | (coefficient & 0x00ff_ffff)
}

/// Check proof-of-work: the header hash, as a big-endian 256-bit integer,
/// must be `<= target(bits)`.
pub fn check_pow(hash: &Hash256, bits: u32) -> bool {
    let target = bits_to_target(bits);
    let value = U256::from_big_endian(hash.as_bytes());
    value <= target
}

/// This block's contribution to accumulated chain work: `floor(2^256 / (target + 1))`.
///
/// Computed as `(!target / (target + 1)) + 1` to avoid representing `2^256`
/// directly, which overflows a 256-bit integer.
pub fn block_work(bits: u32) -> U256 {
    let target = bits_to_target(bits);
    if target.is_zero() {
        return U256::zero();
    }
    (!target / (target + U256::one())) + U256::one()
}

/// Consensus-facing retarget: decode `current_bits`, apply the proportional
/// adjustment in 256-bit arithmetic, clamp to `[1, MAX_BITS's target]`, and
/// re-encode.
pub fn next_bits(timestamps: &[u64], current_bits: u32) -> u32 {
    if timestamps.len() < 2 {
        return current_bits;
    }

    let actual_time = timestamps[timestamps.len() - 1].saturating_sub(timestamps[0]);
    let intervals = (timestamps.len() - 1) as u64;
    let expected_time = intervals * BLOCK_TIME_SECS;
    if expected_time == 0 {
        return current_bits;
    }

    let min_time = expected_time / MAX_ADJUSTMENT_FACTOR;
    let max_time = expected_time.saturating_mul(MAX_ADJUSTMENT_FACTOR);
    let clamped = actual_time.max(min_time).min(max_time);

    let current_target = bits_to_target(current_bits);
    let new_target = current_target
        .saturating_mul(U256::from(clamped))
        / U256::from(expected_time);

    let max_target = bits_to_target(MAX_BITS);
    let clamped_target = new_target.max(U256::one()).min(max_target);
    target_to_bits(clamped_target)
}

/// Like [`next_bits`] but computes the window of timestamps for `height`
/// itself: all available blocks before the window fills, then a rolling
/// `DIFFICULTY_WINDOW + 1` timestamps.
pub fn bits_for_height(height: u64, parent_bits: u32, get_timestamp: impl Fn(u64) -> u64) -> u32 {
    if height <= 1 {
        return MAX_BITS;
    }
    let num_timestamps = height.min(DIFFICULTY_WINDOW + 1);
    let start = height - num_timestamps;
    let timestamps: Vec<u64> = (start..height).map(&get_timestamp).collect();
    next_bits(&timestamps, parent_bits)
}

/// Maximum difficulty adjustment factor per window.
///
/// The target cannot change by more than this factor in a single adjustment.
/// Prevents extreme swings from timestamp manipulation or hashrate spikes.
pub const MAX_ADJUSTMENT_FACTOR: u64 = 4;
