//! Reward schedule and halving logic.
//!
//! The mining reward follows a halving schedule: the base reward starts at
//! [`INITIAL_REWARD`](crate::constants::INITIAL_REWARD) (50 RILL) and halves
//! every [`HALVING_INTERVAL`](crate::constants::HALVING_INTERVAL) (210,000)
//! blocks.
//!
//! Epochs:
//! - Epoch 0 (heights 0–209,999): 50 RILL per block
//! - Epoch 1 (heights 210,000–419,999): 25 RILL per block
//! - …
//! - Epoch 32 (heights 6,720,000–6,929,999): 1 rill per block
//! - Epoch 33+: 0 (reward exhausted)
//!
//! The total mining supply across all epochs is slightly less than
//! [`MAX_SUPPLY`](crate::constants::MAX_SUPPLY) due to integer truncation
//! in the halving arithmetic.

use crate::constants::{HALVING_INTERVAL, INITIAL_REWARD};

/// Compute the base mining reward (in rills) for a given block height.
///
/// Follows the halving schedule: `INITIAL_REWARD >> (height / HALVING_INTERVAL)`.
/// Returns 0 once the truncated reward reaches zero (epoch ≥ 33 with current
/// constants) or the epoch exceeds 63 (shift-overflow guard).
///
/// Height 0 (the genesis block) pays this same schedule reward — there is
/// no premine, so `block_reward(0) == INITIAL_REWARD` exactly like every
/// other block in epoch 0.
pub fn block_reward(height: u64) -> u64 {
    epoch_reward(halving_epoch(height))
}

/// The mining reward (in rills) for a given halving epoch.
///
/// `epoch_reward(0) == INITIAL_REWARD`, `epoch_reward(1) == INITIAL_REWARD / 2`,
/// etc. Returns 0 for epoch ≥ 64 (shift guard) or when truncation yields zero.
pub fn epoch_reward(epoch: u64) -> u64 {
    if epoch >= 64 {
        return 0;
    }
    INITIAL_REWARD >> epoch
}

/// Which halving epoch a block height falls in.
///
/// Epoch 0 spans heights `[0, HALVING_INTERVAL)`,
/// epoch 1 spans `[HALVING_INTERVAL, 2 * HALVING_INTERVAL)`, etc.
pub fn halving_epoch(height: u64) -> u64 {
    height / HALVING_INTERVAL
}

/// The first block height of a given halving epoch.
///
/// VULN-06 fix: Uses saturating_mul to prevent overflow for large epoch values.
pub fn epoch_start_height(epoch: u64) -> u64 {
    epoch.saturating_mul(HALVING_INTERVAL)
}

/// The height at which the next halving occurs after `height`.
///
/// Returns `None` if the current reward is already zero (no future halvings).
pub fn next_halving_height(height: u64) -> Option<u64> {
    let epoch = halving_epoch(height);
    if epoch_reward(epoch) == 0 {
        return None;
    }
    Some(epoch_start_height(epoch + 1))
}

/// Number of blocks remaining until the next halving from `height`.
///
/// Returns `None` if the current reward is already zero.
pub fn blocks_until_halving(height: u64) -> Option<u64> {
    next_halving_height(height).map(|next| next - height)
}

/// Cumulative mining rewards from height 0 through `height` (inclusive).
///
/// Uses the epoch structure for O(epochs) computation rather than iterating
/// every block.
pub fn cumulative_reward(height: u64) -> u64 {
    let final_epoch = halving_epoch(height);
    let mut total: u64 = 0;

    for epoch in 0..=final_epoch {
        let reward = epoch_reward(epoch);
        if reward == 0 {
            break;
        }
        let start = epoch_start_height(epoch);
        let end = if epoch == final_epoch {
            height
        } else {
            epoch_start_height(epoch + 1) - 1
        };
        let blocks = end - start + 1;
        // VULN-06 fix: Use saturating_add to prevent overflow in pathological cases.
        // For current constants this is safe, but defensive programming is important.
        total = total.saturating_add(reward.saturating_mul(blocks));
    }

    total
}

/// Total mining supply across all halving epochs.
///
/// Sum of `epoch_reward(e) * HALVING_INTERVAL` for all epochs with non-zero
/// reward. Due to integer truncation, this is slightly less than
/// `2 * INITIAL_REWARD * HALVING_INTERVAL` (= `MAX_SUPPLY`).
///
/// VULN-06 fix: Uses saturating arithmetic.
pub fn total_mining_supply() -> u64 {
    let mut total: u64 = 0;
    for epoch in 0..64u64 {
        let reward = epoch_reward(epoch);
        if reward == 0 {
            break;
        }
        total = total.saturating_add(reward.saturating_mul(HALVING_INTERVAL));
    }
    total
}

/// The last halving epoch with a non-zero mining reward.
///
/// Epochs after this one have zero reward.
pub fn last_reward_epoch() -> u64 {
    for epoch in (0..64u64).rev() {
        if epoch_reward(epoch) > 0 {
            return epoch;
        }
    }
    0
}

/// The last block height that receives a non-zero mining reward.
///
/// All heights after this receive zero reward.
pub fn last_reward_height() -> u64 {
    epoch_start_height(last_reward_epoch() + 1) - 1
}
