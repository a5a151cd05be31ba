//! Genesis block construction.
//!
//! The genesis block is the first block in the chain (height 0). Its
//! coinbase pays the ordinary height-0 block subsidy — there is no
//! premine or dev fund; every rill in existence is paid out through the
//! regular [`crate::reward`] schedule starting at genesis.

use crate::merkle;
use crate::reward::block_reward;
use crate::script::p2pkh_locking_script;
use crate::types::{Block, BlockHeader, Hash160, Hash256, OutPoint, Transaction, TxInput, TxOutput};

/// Genesis block timestamp: January 1, 2026 00:00:00 UTC.
pub const GENESIS_TIMESTAMP: u32 = 1_767_225_600;

/// Message embedded in the genesis coinbase.
pub const GENESIS_MESSAGE: &[u8] = b"Wealth should flow like water. Rill genesis 2026.";

/// Lowest possible difficulty: `bits` encoding a target of
/// `0x00ffff * 2^(8*(0x1d-3))`, mirroring Bitcoin's genesis difficulty.
pub const GENESIS_BITS: u32 = 0x1d00ffff;

/// The network's well-known genesis coinbase recipient.
///
/// Every node pins the same hash here so that all nodes independently
/// derive the identical genesis block. The corresponding private key is
/// unknown to anyone; the genesis coinbase output is unspendable in
/// practice.
pub const GENESIS_COINBASE_PUBKEY_HASH: Hash160 = Hash160([0; 20]);

/// Build the network genesis block, paid to [`GENESIS_COINBASE_PUBKEY_HASH`].
pub fn network_genesis_block() -> Block {
    genesis_block(&GENESIS_COINBASE_PUBKEY_HASH)
}

/// Hash of the network genesis block header.
pub fn genesis_hash() -> Hash256 {
    network_genesis_block().header.hash()
}

/// Txid of the network genesis coinbase transaction.
pub fn genesis_coinbase_txid() -> Hash256 {
    network_genesis_block().transactions[0].txid()
}

/// Build the genesis block paying the height-0 subsidy to `coinbase_pubkey_hash`.
///
/// Every node that agrees on `coinbase_pubkey_hash` computes an identical
/// genesis block; networks pin this to a well-known address at startup
/// (see [`crate::constants`] / node configuration).
pub fn genesis_block(coinbase_pubkey_hash: &Hash160) -> Block {
    let coinbase = build_genesis_coinbase(coinbase_pubkey_hash);
    let merkle_root = merkle::merkle_root(&[coinbase.txid()]);

    Block {
        header: BlockHeader {
            version: 1,
            prev_hash: Hash256::ZERO,
            merkle_root,
            timestamp: GENESIS_TIMESTAMP,
            bits: GENESIS_BITS,
            nonce: 0,
        },
        transactions: vec![coinbase],
    }
}

fn build_genesis_coinbase(coinbase_pubkey_hash: &Hash160) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxInput {
            previous_output: OutPoint::null(),
            signature_script: GENESIS_MESSAGE.to_vec(),
            sequence: 0xFFFF_FFFF,
        }],
        outputs: vec![TxOutput {
            value: block_reward(0) as i64,
            locking_script: p2pkh_locking_script(coinbase_pubkey_hash),
        }],
        lock_time: 0,
    }
}

/// Check whether a block is a valid genesis block for `coinbase_pubkey_hash`.
pub fn is_genesis(block: &Block, coinbase_pubkey_hash: &Hash160) -> bool {
    *block == genesis_block(coinbase_pubkey_hash)
}
