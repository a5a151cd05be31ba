//! Block validation for the Rill protocol.
//!
//! Two levels of validation:
//!
//! - **Structural** ([`validate_block_structure`]): context-free checks on
//!   block format, merkle root, coinbase position, and transaction structure.
//! - **Contextual** ([`validate_block`]): full validation including header
//!   linkage, proof-of-work, timestamp, coinbase height commitment and
//!   reward, and contextual transaction validation with double-spend
//!   detection.
//!
//! The genesis block (height 0) is **not** validated through this module.
//! Use [`genesis::is_genesis`](crate::genesis::is_genesis) instead.

use std::collections::HashSet;

use crate::constants::{BIP34_ACTIVATION_HEIGHT, MAX_BLOCK_SIZE, MAX_FUTURE_BLOCK_TIME};
use crate::difficulty;
use crate::error::{BlockError, TransactionError};
use crate::merkle;
use crate::types::{Block, Hash256, OutPoint, UtxoEntry};
use crate::validation;

/// Context required for full block validation.
///
/// The caller provides these values from the chain state. They describe
/// the expected parent linkage, difficulty, timing, and reward for the
/// block being validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockContext {
    /// Height of the block being validated.
    pub height: u64,
    /// Expected previous block hash (the parent's header hash).
    pub prev_hash: Hash256,
    /// Parent block's timestamp (for monotonicity check).
    pub prev_timestamp: u64,
    /// Expected compact difficulty encoding for this height (see [`crate::difficulty`]).
    pub expected_bits: u32,
    /// Current wall-clock time in Unix seconds (for future timestamp check).
    pub current_time: u64,
    /// Expected base block reward for this height (from the halving schedule).
    pub block_reward: u64,
}

/// Summary of a successfully validated block.
///
/// Returned by [`validate_block`] after all checks pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBlock {
    /// Sum of all non-coinbase transaction fees in rills.
    pub total_fees: u64,
    /// Total value of all coinbase outputs in rills.
    pub coinbase_value: u64,
}

/// Check if a block header hash satisfies the proof-of-work target encoded
/// in its own `bits` field.
pub fn check_pow(block: &Block) -> bool {
    difficulty::check_pow(&block.header.hash(), block.header.bits)
}

/// Minimal-length little-endian encoding of `height`, used as a BIP34-style
/// coinbase height commitment: a one-byte push-length followed by the
/// height's minimal byte representation (a lone zero byte for height 0).
///
/// Public so block producers can prefix their coinbase `signature_script`
/// with exactly the bytes this module's decoder expects.
pub fn encode_height_commitment(height: u64) -> Vec<u8> {
    let mut bytes = height.to_le_bytes().to_vec();
    while bytes.len() > 1 && *bytes.last().unwrap() == 0 {
        bytes.pop();
    }
    let mut out = Vec::with_capacity(1 + bytes.len());
    out.push(bytes.len() as u8);
    out.extend_from_slice(&bytes);
    out
}

/// Parse a BIP34-style height commitment from the front of a coinbase
/// `signature_script`. Returns `None` if the prefix is malformed.
fn decode_height_commitment(script: &[u8]) -> Option<u64> {
    let len = *script.first()? as usize;
    let bytes = script.get(1..1 + len)?;
    if bytes.is_empty() || bytes.len() > 8 {
        return None;
    }
    if bytes.len() > 1 && *bytes.last().unwrap() == 0 {
        return None; // non-minimal encoding
    }
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    Some(u64::from_le_bytes(buf))
}

/// Validate block structure (context-free).
///
/// Checks:
/// - Block version is the one the node understands
/// - At least one transaction (the coinbase)
/// - First transaction is coinbase, no others are
/// - No duplicate transaction IDs
/// - Merkle root in header matches computed root
/// - Block's canonical encoding is within [`MAX_BLOCK_SIZE`]
/// - Proof-of-work satisfies the header's own claimed `bits`
/// - All transactions pass structural validation
pub fn validate_block_structure(block: &Block) -> Result<(), BlockError> {
    if block.header.version != 1 {
        return Err(BlockError::InvalidBlockVersion(block.header.version));
    }

    if block.transactions.is_empty() {
        return Err(BlockError::NoCoinbase);
    }

    if !block.transactions[0].is_coinbase() {
        return Err(BlockError::FirstTxNotCoinbase);
    }

    for (i, tx) in block.transactions.iter().enumerate().skip(1) {
        if tx.is_coinbase() {
            return Err(BlockError::MultipleCoinbase);
        }
        validation::validate_transaction_structure(tx)
            .map_err(|e| BlockError::TransactionError { index: i, source: e })?;
    }

    validation::validate_transaction_structure(&block.transactions[0])
        .map_err(|e| BlockError::TransactionError { index: 0, source: e })?;

    // --- No duplicate txids ---

    let mut txids = HashSet::with_capacity(block.transactions.len());
    let mut txid_vec = Vec::with_capacity(block.transactions.len());

    for tx in &block.transactions {
        let txid = tx.txid();
        if !txids.insert(txid) {
            return Err(BlockError::DuplicateTxid(txid.to_string()));
        }
        txid_vec.push(txid);
    }

    // --- Merkle root ---

    let computed_root = merkle::merkle_root(&txid_vec);
    if block.header.merkle_root != computed_root {
        return Err(BlockError::InvalidMerkleRoot);
    }

    // --- Block size ---

    let encoded = block.encode();
    if encoded.len() > MAX_BLOCK_SIZE {
        return Err(BlockError::OversizedBlock {
            size: encoded.len(),
            max: MAX_BLOCK_SIZE,
        });
    }

    // --- PoW (satisfies the header's own claimed bits) ---

    if !check_pow(block) {
        return Err(BlockError::InvalidPoW);
    }

    Ok(())
}

/// Validate a block against the chain state (contextual).
///
/// Performs structural validation, then:
/// - Verifies `prev_hash` matches the expected parent
/// - Verifies `bits` matches the expected difficulty
/// - Verifies timestamp is after the parent and not too far in the future
/// - Verifies the coinbase's BIP34-style height commitment, once active
/// - Validates all non-coinbase transactions contextually (signatures, UTXOs, maturity)
/// - Detects double-spending across transactions within the block
/// - Verifies coinbase reward does not exceed `block_reward + total_fees`
///
/// Returns a [`ValidatedBlock`] with computed fees and coinbase value on success.
///
/// The `get_utxo` function looks up UTXOs from the state **before** this block.
/// Intra-block spending (spending an output created in the same block) is not
/// permitted.
pub fn validate_block<F>(
    block: &Block,
    context: &BlockContext,
    get_utxo: F,
) -> Result<ValidatedBlock, BlockError>
where
    F: Fn(&OutPoint) -> Option<UtxoEntry>,
{
    // --- Structural checks ---

    validate_block_structure(block)?;

    // --- Header linkage ---

    if block.header.prev_hash != context.prev_hash {
        return Err(BlockError::InvalidPrevHash);
    }

    // --- Difficulty ---

    if block.header.bits != context.expected_bits {
        return Err(BlockError::InvalidDifficulty {
            got: block.header.bits,
            expected: context.expected_bits,
        });
    }

    // --- Timestamp ---

    if (block.header.timestamp as u64) <= context.prev_timestamp {
        return Err(BlockError::TimestampNotAfterParent);
    }

    let max_time = context.current_time.saturating_add(MAX_FUTURE_BLOCK_TIME);
    if block.header.timestamp as u64 > max_time {
        return Err(BlockError::TimestampTooFar(
            block.header.timestamp as i64 - context.current_time as i64,
        ));
    }

    // --- Coinbase height commitment ---

    if context.height >= BIP34_ACTIVATION_HEIGHT {
        let script = &block.transactions[0].inputs[0].signature_script;
        let got = decode_height_commitment(script).ok_or(BlockError::MissingHeightCommitment)?;
        if got != context.height {
            return Err(BlockError::HeightCommitmentMismatch {
                got,
                expected: context.height,
            });
        }
    }

    // --- Non-coinbase transactions: contextual validation + double-spend detection ---

    let mut block_spent = HashSet::new();
    let mut total_fees: u64 = 0;

    for (i, tx) in block.transactions.iter().enumerate().skip(1) {
        for input in &tx.inputs {
            if !block_spent.insert(input.previous_output.clone()) {
                return Err(BlockError::DoubleSpend(input.previous_output.to_string()));
            }
        }

        let validated = validation::validate_transaction(tx, &get_utxo, context.height)
            .map_err(|e| BlockError::TransactionError { index: i, source: e })?;

        total_fees = total_fees.checked_add(validated.fee).ok_or(BlockError::TransactionError {
            index: i,
            source: TransactionError::ValueOverflow,
        })?;
    }

    // --- Coinbase reward ---

    let coinbase = &block.transactions[0];
    let coinbase_value =
        coinbase
            .total_output_value()
            .ok_or(BlockError::TransactionError { index: 0, source: TransactionError::ValueOverflow })?;

    let max_reward = context
        .block_reward
        .checked_add(total_fees)
        .ok_or(BlockError::TransactionError { index: 0, source: TransactionError::ValueOverflow })?;

    if coinbase_value > max_reward {
        return Err(BlockError::InvalidReward {
            got: coinbase_value,
            expected: max_reward,
        });
    }

    Ok(ValidatedBlock {
        total_fees,
        coinbase_value,
    })
}
