//! Shared test helpers for E2E and integration tests.

use rill_core::merkle;
use rill_core::script;
use rill_core::types::*;

/// Simple pubkey hash from a seed byte.
pub fn pkh(seed: u8) -> Hash160 {
    Hash160([seed; 20])
}

/// Create a coinbase transaction with a unique height marker.
///
/// Encodes `height` into the coinbase input's signature script so each
/// coinbase produces a distinct txid per block height, matching the
/// production consensus engine behaviour.
pub fn make_coinbase(value: u64, pubkey_hash: Hash160, height: u64) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxInput {
            previous_output: OutPoint::null(),
            signature_script: height.to_le_bytes().to_vec(),
            sequence: 0xFFFF_FFFF,
        }],
        outputs: vec![TxOutput {
            value: value as i64,
            locking_script: script::p2pkh_locking_script(&pubkey_hash),
        }],
        lock_time: 0,
    }
}

/// Create a simple spending transaction (unsigned).
pub fn make_tx(inputs: Vec<OutPoint>, outputs: Vec<(u64, Hash160)>) -> Transaction {
    Transaction {
        version: 1,
        inputs: inputs
            .into_iter()
            .map(|op| TxInput {
                previous_output: op,
                signature_script: vec![0; 65],
                sequence: 0xFFFF_FFFF,
            })
            .collect(),
        outputs: outputs
            .into_iter()
            .map(|(value, pubkey_hash)| TxOutput {
                value: value as i64,
                locking_script: script::p2pkh_locking_script(&pubkey_hash),
            })
            .collect(),
        lock_time: 0,
    }
}

/// Create a block with correct merkle root.
pub fn make_block(prev_hash: Hash256, timestamp: u32, txs: Vec<Transaction>) -> Block {
    let txids: Vec<Hash256> = txs.iter().map(|tx| tx.txid()).collect();
    let mr = merkle::merkle_root(&txids);
    Block {
        header: BlockHeader {
            version: 1,
            prev_hash,
            merkle_root: mr,
            timestamp,
            bits: 0x1d00ffff,
            nonce: 0,
        },
        transactions: txs,
    }
}
