//! Transaction validation for the Rill protocol.
//!
//! Two levels of validation:
//!
//! - **Structural** ([`validate_transaction_structure`]): context-free checks on
//!   transaction format and internal consistency. No external state required.
//! - **Contextual** ([`validate_transaction`]): UTXO-aware checks including
//!   P2PKH signature verification, coinbase maturity, and value conservation.
//!
//! Coinbase transactions are only structurally validated here; their reward
//! amount and height commitment are checked during block validation
//! (see [`crate::block_validation`]).

use std::collections::HashSet;

use crate::constants::{MAX_COINBASE_DATA, MAX_INPUTS, MAX_MONEY, MAX_OUTPUTS, MAX_TX_SIZE};
use crate::crypto;
use crate::error::TransactionError;
use crate::types::{OutPoint, Transaction, UtxoEntry};

/// Summary of a successfully validated transaction.
///
/// Returned by [`validate_transaction`] after all checks pass. Contains
/// the computed fee and value totals for use in block template assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTransaction {
    /// Total value of all spent inputs in rills.
    pub total_input: u64,
    /// Total value of all created outputs in rills.
    pub total_output: u64,
    /// Transaction fee in rills (`total_input - total_output`).
    pub fee: u64,
}

/// Validate transaction structure (context-free).
///
/// Checks that apply to both coinbase and regular transactions:
/// - Non-empty inputs and outputs, within [`MAX_INPUTS`]/[`MAX_OUTPUTS`]
/// - No negative output values, and none above [`MAX_MONEY`]
/// - Total output value does not overflow
///
/// Dust is a local relay policy, not a consensus rule (§7): it is checked
/// at mempool admission, not here.
/// - Canonical-encoded size is within [`MAX_TX_SIZE`]
///
/// Additional coinbase-specific checks (via [`validate_coinbase_structure`]):
/// - Exactly one input with null outpoint
/// - Coinbase data within size bounds
///
/// Additional regular transaction checks (via [`validate_regular_structure`]):
/// - No null outpoints
/// - No duplicate input outpoints
pub fn validate_transaction_structure(tx: &Transaction) -> Result<(), TransactionError> {
    // --- Common checks ---

    if tx.inputs.is_empty() || tx.outputs.is_empty() {
        return Err(TransactionError::EmptyInputsOrOutputs);
    }

    if tx.inputs.len() > MAX_INPUTS {
        return Err(TransactionError::TooManyInputs {
            count: tx.inputs.len(),
            max: MAX_INPUTS,
        });
    }

    if tx.outputs.len() > MAX_OUTPUTS {
        return Err(TransactionError::TooManyOutputs {
            count: tx.outputs.len(),
            max: MAX_OUTPUTS,
        });
    }

    for (i, output) in tx.outputs.iter().enumerate() {
        if output.value < 0 {
            return Err(TransactionError::NegativeOutputValue(i));
        }
        if output.value as u64 > MAX_MONEY {
            return Err(TransactionError::OutputValueTooLarge {
                index: i,
                value: output.value as u64,
                max: MAX_MONEY,
            });
        }
    }

    if tx.total_output_value().is_none() {
        return Err(TransactionError::ValueOverflow);
    }

    let encoded = tx.encode();
    if encoded.len() > MAX_TX_SIZE {
        return Err(TransactionError::OversizedTransaction {
            size: encoded.len(),
            max: MAX_TX_SIZE,
        });
    }

    // --- Type-specific checks ---

    if tx.is_coinbase() {
        validate_coinbase_structure(tx)?;
    } else {
        validate_regular_structure(tx)?;
    }

    Ok(())
}

/// Validate coinbase-specific structure.
///
/// - Exactly one input with null outpoint
/// - Coinbase data (the lone input's `signature_script`) within
///   `2..=`[`MAX_COINBASE_DATA`] bytes — height commitments (BIP34-style)
///   are checked at the block level, where the height is known.
fn validate_coinbase_structure(tx: &Transaction) -> Result<(), TransactionError> {
    if tx.inputs.len() != 1 {
        return Err(TransactionError::InvalidCoinbase(
            "must have exactly one input".into(),
        ));
    }

    if !tx.inputs[0].previous_output.is_null() {
        return Err(TransactionError::InvalidCoinbase(
            "input must be null outpoint".into(),
        ));
    }

    let size = tx.inputs[0].signature_script.len();
    if !(2..=MAX_COINBASE_DATA).contains(&size) {
        return Err(TransactionError::InvalidCoinbaseScriptSize {
            size,
            max: MAX_COINBASE_DATA,
        });
    }

    Ok(())
}

/// Validate non-coinbase transaction structure.
///
/// - No null outpoints
/// - No duplicate input outpoints
///
/// Script well-formedness is left to [`crypto::verify_input`], which runs
/// during contextual validation once the spent output is known.
fn validate_regular_structure(tx: &Transaction) -> Result<(), TransactionError> {
    let mut seen = HashSet::with_capacity(tx.inputs.len());

    for (i, input) in tx.inputs.iter().enumerate() {
        if input.previous_output.is_null() {
            return Err(TransactionError::NullOutpointInRegularTx(i));
        }

        if !seen.insert(&input.previous_output) {
            return Err(TransactionError::DuplicateInput(
                input.previous_output.to_string(),
            ));
        }
    }

    Ok(())
}

/// Validate a transaction against the UTXO set (contextual).
///
/// Performs full validation including structural checks plus:
/// - All input outpoints reference existing, unspent UTXOs
/// - Coinbase UTXOs have sufficient maturity ([`UtxoEntry::is_mature`])
/// - Each input's P2PKH unlocking script verifies against the spent output
/// - Total input value covers total output value (fee >= 0)
///
/// Returns a [`ValidatedTransaction`] with the computed fee on success.
///
/// **Note:** Coinbase transactions cannot be contextually validated — they
/// have no real inputs. Pass regular transactions only; coinbase reward
/// amounts are checked during block validation.
///
/// The `get_utxo` function looks up a UTXO by outpoint, allowing the caller
/// to provide any source (RocksDB, in-memory map, etc.).
pub fn validate_transaction<F>(
    tx: &Transaction,
    get_utxo: F,
    current_height: u64,
) -> Result<ValidatedTransaction, TransactionError>
where
    F: Fn(&OutPoint) -> Option<UtxoEntry>,
{
    if tx.is_coinbase() {
        return Err(TransactionError::InvalidCoinbase(
            "coinbase cannot be contextually validated standalone".into(),
        ));
    }

    validate_transaction_structure(tx)?;

    let mut total_input: u64 = 0;

    for (i, input) in tx.inputs.iter().enumerate() {
        let utxo = get_utxo(&input.previous_output)
            .ok_or_else(|| TransactionError::UnknownUtxo(input.previous_output.to_string()))?;

        if !utxo.is_mature(current_height) {
            return Err(TransactionError::ImmatureCoinbase { index: i });
        }

        crypto::verify_input(tx, i, &utxo.output)
            .map_err(|_| TransactionError::InvalidSignature { index: i })?;

        total_input = total_input
            .checked_add(utxo.output.value as u64)
            .ok_or(TransactionError::ValueOverflow)?;
    }

    let total_output = tx
        .total_output_value()
        .ok_or(TransactionError::ValueOverflow)?;

    if total_input < total_output {
        return Err(TransactionError::InsufficientFunds {
            have: total_input,
            need: total_output,
        });
    }

    Ok(ValidatedTransaction {
        total_input,
        total_output,
        fee: total_input - total_output,
    })
}
