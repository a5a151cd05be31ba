//! Consensus engine implementing the [`BlockProducer`] trait.
//!
//! Wires together rill-core's validation, difficulty, and reward modules
//! with chain state to provide a complete block production and validation
//! pipeline, using SHA-256 double-hash proof-of-work.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use rill_core::block_validation::{self, encode_height_commitment, BlockContext};
use rill_core::constants::{IMPLEMENTATION_TAG, MAX_COINBASE_DATA};
use rill_core::error::BlockError;
use rill_core::traits::{BlockProducer, ChainState};
use rill_core::types::{Block, BlockHeader, Hash160, Hash256, OutPoint, Transaction, TxInput, TxOutput};
use rill_core::{difficulty, merkle, reward};

/// The production consensus engine.
///
/// Implements [`BlockProducer`] by combining chain state queries, difficulty
/// adjustment, and proof-of-work validation.
///
/// Requires a non-empty chain (genesis block must already be connected).
pub struct ConsensusEngine {
    chain_state: Arc<dyn ChainState>,
    clock: Box<dyn Fn() -> u64 + Send + Sync>,
    /// Force [`Self::expected_bits`] to return a fixed value for every
    /// height instead of computing the real retarget, bypassing the
    /// consensus difficulty floor so tests can mine instantly.
    bits_override: Option<u32>,
}

impl fmt::Debug for ConsensusEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsensusEngine").finish_non_exhaustive()
    }
}

impl ConsensusEngine {
    /// Create a new ConsensusEngine with the system clock.
    pub fn new(chain_state: Arc<dyn ChainState>) -> Self {
        Self {
            chain_state,
            clock: Box::new(|| {
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs()
            }),
            bits_override: None,
        }
    }

    /// Create a new ConsensusEngine with a custom clock for testing.
    pub fn with_clock(chain_state: Arc<dyn ChainState>, clock: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        Self {
            chain_state,
            clock: Box::new(clock),
            bits_override: None,
        }
    }

    /// Force every [`BlockProducer::expected_bits`] query to return `bits`,
    /// bypassing the real retarget computation and the chain's difficulty
    /// floor. Intended for tests that need cheap, instant mining.
    ///
    /// Available when the crate is compiled under test (`#[cfg(test)]`) or
    /// when the `testing` feature is enabled, so downstream test suites can
    /// use this builder without enabling it in production builds.
    #[cfg(any(test, feature = "testing"))]
    pub fn with_bits_override(mut self, bits: u32) -> Self {
        self.bits_override = Some(bits);
        self
    }

    /// Create a block template that includes pending mempool transactions.
    ///
    /// This is the primary block-building entry point. It constructs a
    /// coinbase transaction, then validates pending mempool transactions
    /// (filtering out any that spend immature coinbase outputs or missing
    /// UTXOs) and computes the merkle root over all included transactions.
    ///
    /// Transactions that fail UTXO lookup or coinbase maturity checks are
    /// silently skipped rather than causing the template to fail. This is
    /// safe because the miner should not be penalized for stale mempool
    /// entries.
    ///
    /// # Attack vectors
    ///
    /// - An adversary could flood the mempool with transactions spending
    ///   immature coinbase outputs. We filter these out here so that blocks
    ///   produced from templates never contain invalid transactions.
    /// - The caller is responsible for size budgeting; the block validator's
    ///   `validate_block_structure` enforces MAX_BLOCK_SIZE as a safety net.
    /// - Double-spend across included transactions is prevented by tracking
    ///   spent outpoints within the template.
    pub fn create_block_template_with_txs(
        &self,
        coinbase_pubkey_hash: &Hash160,
        timestamp: u64,
        pending_txs: &[Transaction],
    ) -> Result<Block, BlockError> {
        let (tip_height, tip_hash) = self
            .chain_state
            .chain_tip()
            .map_err(|_| BlockError::InvalidPrevHash)?;

        let height = tip_height + 1;
        let reward = reward::block_reward(height);
        let bits = self.expected_bits(height)?;

        // Ensure timestamp is strictly after the parent's to pass validation.
        let parent_header = self
            .chain_state
            .get_block_header(&tip_hash)
            .map_err(|_| BlockError::InvalidPrevHash)?
            .ok_or(BlockError::InvalidPrevHash)?;
        let timestamp = timestamp.max(parent_header.timestamp as u64 + 1);

        // Coinbase signature_script: BIP34 height commitment, then an
        // 8-byte extra-nonce (starts at zero; rolled by the miner on nonce
        // space exhaustion), then an implementation tag.
        let mut signature_script = encode_height_commitment(height);
        signature_script.extend_from_slice(&0u64.to_le_bytes());
        signature_script.extend_from_slice(IMPLEMENTATION_TAG);
        signature_script.truncate(MAX_COINBASE_DATA);

        // Select valid mempool transactions, filtering out those that:
        // 1. Spend UTXOs that do not exist (stale mempool entries)
        // 2. Spend immature coinbase outputs
        // 3. Would cause a double-spend within this block
        //
        // Size budgeting is the caller's responsibility: the node layer uses
        // `Mempool::select_transactions(max_block_bytes)` to pre-select
        // transactions that fit within MAX_BLOCK_SIZE. The block validator's
        // `validate_block_structure` check enforces the limit as a safety net.
        let mut included_txs: Vec<Transaction> = Vec::new();
        let mut spent_outpoints = HashSet::new();
        let mut total_fees: u64 = 0;

        for tx in pending_txs {
            // Attack vector: adversary submits coinbase-like transaction to mempool.
            // Skip any transaction that claims to be a coinbase.
            if tx.is_coinbase() {
                continue;
            }

            let mut tx_valid = true;
            let mut tx_input_value: u64 = 0;
            let mut tx_spent = Vec::new();

            for input in &tx.inputs {
                if spent_outpoints.contains(&input.previous_output) {
                    tx_valid = false;
                    break;
                }

                let utxo = match self.chain_state.get_utxo(&input.previous_output) {
                    Ok(Some(u)) => u,
                    _ => {
                        tx_valid = false;
                        break;
                    }
                };

                if !utxo.is_mature(height) {
                    tx_valid = false;
                    break;
                }

                tx_input_value = match tx_input_value.checked_add(utxo.output.value as u64) {
                    Some(v) => v,
                    None => {
                        tx_valid = false;
                        break;
                    }
                };

                tx_spent.push(input.previous_output.clone());
            }

            if !tx_valid {
                continue;
            }

            let tx_output_value = match tx.total_output_value() {
                Some(v) if v <= tx_input_value => v,
                _ => continue,
            };

            let fee = tx_input_value - tx_output_value;

            for op in tx_spent {
                spent_outpoints.insert(op);
            }

            total_fees = total_fees.saturating_add(fee);
            included_txs.push(tx.clone());
        }

        let coinbase_value = reward.checked_add(total_fees).ok_or(BlockError::InvalidReward {
            got: u64::MAX,
            expected: reward,
        })?;

        let coinbase = Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutPoint::null(),
                signature_script,
                sequence: 0xFFFF_FFFF,
            }],
            outputs: vec![TxOutput {
                value: coinbase_value as i64,
                locking_script: rill_core::script::p2pkh_locking_script(coinbase_pubkey_hash),
            }],
            lock_time: height as u32,
        };

        let mut all_txs = Vec::with_capacity(1 + included_txs.len());
        all_txs.push(coinbase);
        all_txs.extend(included_txs);

        let txids: Vec<Hash256> = all_txs.iter().map(|tx| tx.txid()).collect();
        let merkle_root = merkle::merkle_root(&txids);

        Ok(Block {
            header: BlockHeader {
                version: 1,
                prev_hash: tip_hash,
                merkle_root,
                timestamp: timestamp as u32,
                bits,
                nonce: 0,
            },
            transactions: all_txs,
        })
    }

    /// Look up a block timestamp by height from the chain state.
    ///
    /// Returns 0 if the block is not found (safety fallback for difficulty calc).
    fn timestamp_at(&self, height: u64) -> u64 {
        self.chain_state
            .get_block_hash(height)
            .ok()
            .flatten()
            .and_then(|hash| self.chain_state.get_block_header(&hash).ok().flatten())
            .map(|h| h.timestamp as u64)
            .unwrap_or(0)
    }
}

impl BlockProducer for ConsensusEngine {
    fn block_reward(&self, height: u64) -> u64 {
        reward::block_reward(height)
    }

    fn validate_pow(&self, header: &BlockHeader) -> Result<(), BlockError> {
        if difficulty::check_pow(&header.hash(), header.bits) {
            Ok(())
        } else {
            Err(BlockError::InvalidPoW)
        }
    }

    fn expected_bits(&self, height: u64) -> Result<u32, BlockError> {
        if let Some(bits) = self.bits_override {
            return Ok(bits);
        }

        if height <= 1 {
            return Ok(difficulty::MAX_BITS);
        }

        let parent_height = height - 1;
        let parent_hash = self
            .chain_state
            .get_block_hash(parent_height)
            .map_err(|_| BlockError::InvalidPrevHash)?
            .ok_or(BlockError::InvalidPrevHash)?;
        let parent_header = self
            .chain_state
            .get_block_header(&parent_hash)
            .map_err(|_| BlockError::InvalidPrevHash)?
            .ok_or(BlockError::InvalidPrevHash)?;

        Ok(difficulty::bits_for_height(height, parent_header.bits, |h| {
            self.timestamp_at(h)
        }))
    }

    fn create_block_template(&self, coinbase_pubkey_hash: &Hash160, timestamp: u64) -> Result<Block, BlockError> {
        // Delegate to the extended method with no pending transactions.
        // The node layer calls `create_block_template_with_txs` directly
        // when mempool transactions are available.
        self.create_block_template_with_txs(coinbase_pubkey_hash, timestamp, &[])
    }

    fn validate_block(&self, block: &Block) -> Result<(), BlockError> {
        let (tip_height, tip_hash) = self
            .chain_state
            .chain_tip()
            .map_err(|_| BlockError::InvalidPrevHash)?;

        let height = tip_height + 1;

        let parent_header = self
            .chain_state
            .get_block_header(&tip_hash)
            .map_err(|_| BlockError::InvalidPrevHash)?
            .ok_or(BlockError::InvalidPrevHash)?;

        let expected_bits = self.expected_bits(height)?;
        let block_reward = reward::block_reward(height);
        let current_time = (self.clock)();

        let context = BlockContext {
            height,
            prev_hash: tip_hash,
            prev_timestamp: parent_header.timestamp as u64,
            expected_bits,
            current_time,
            block_reward,
        };

        let cs = &self.chain_state;
        block_validation::validate_block(block, &context, |outpoint| cs.get_utxo(outpoint).ok().flatten())?;

        Ok(())
    }
}

/// Attempt to mine a block by incrementing the nonce until PoW is satisfied.
///
/// Modifies `block.header.nonce` in place. Returns `true` if a valid nonce
/// was found within `[0, max_nonce]`, `false` otherwise.
pub fn mine_block(block: &mut Block, max_nonce: u32) -> bool {
    for nonce in 0..=max_nonce {
        block.header.nonce = nonce;
        if block_validation::check_pow(block) {
            return true;
        }
        if nonce == u32::MAX {
            break;
        }
    }
    false
}

/// Mine a block, rolling the coinbase extra-nonce (and recomputing the
/// merkle root) each time the header nonce space `[0, max_nonce]` is
/// exhausted without finding a valid hash.
///
/// Returns `true` if a valid `(nonce, extra_nonce)` pair was found within
/// `max_extra_nonce` rolls, `false` otherwise. `block`'s coinbase must have
/// been built by [`ConsensusEngine::create_block_template_with_txs`] (its
/// `signature_script` must contain the 8-byte extra-nonce field immediately
/// after the height commitment).
pub fn mine_block_with_extra_nonce(block: &mut Block, max_nonce: u32, max_extra_nonce: u64) -> bool {
    let mut extra_nonce: u64 = 0;
    loop {
        if mine_block(block, max_nonce) {
            return true;
        }
        if extra_nonce == max_extra_nonce {
            return false;
        }
        extra_nonce += 1;
        roll_extra_nonce(block, extra_nonce);
    }
}

/// Overwrite the coinbase's extra-nonce field and recompute the merkle root.
fn roll_extra_nonce(block: &mut Block, extra_nonce: u64) {
    let script = &mut block.transactions[0].inputs[0].signature_script;
    let push_len = script.first().copied().unwrap_or(0) as usize;
    let offset = 1 + push_len;
    if script.len() >= offset + 8 {
        script[offset..offset + 8].copy_from_slice(&extra_nonce.to_le_bytes());
    }
    let txids: Vec<Hash256> = block.transactions.iter().map(|tx| tx.txid()).collect();
    block.header.merkle_root = merkle::merkle_root(&txids);
}
