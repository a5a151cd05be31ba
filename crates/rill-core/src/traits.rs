//! Trait interfaces for the Rill protocol.
//!
//! These traits define the contracts between crates:
//! - [`ChainState`] — read-only blockchain state (rill-node implements)
//! - [`BlockProducer`] — block creation and validation (rill-consensus implements)
//! - [`NetworkService`] — P2P networking (rill-network implements)

use crate::error::{BlockError, NetworkError, RillError, TransactionError};
use crate::types::{Block, BlockHeader, Hash160, Hash256, OutPoint, Transaction, UtxoEntry};

/// Read-only view of the blockchain state.
///
/// Provides access to the UTXO set, block headers, and chain tip needed
/// for validation. Implemented by the full node (rill-node) backed by
/// RocksDB.
pub trait ChainState: Send + Sync {
    /// Look up a UTXO by outpoint. Returns `None` if spent or unknown.
    fn get_utxo(&self, outpoint: &OutPoint) -> Result<Option<UtxoEntry>, RillError>;

    /// Check whether a UTXO exists and is unspent.
    ///
    /// Default implementation delegates to [`get_utxo`](Self::get_utxo).
    fn contains_utxo(&self, outpoint: &OutPoint) -> Result<bool, RillError> {
        Ok(self.get_utxo(outpoint)?.is_some())
    }

    /// Current chain tip as `(height, block_hash)`.
    fn chain_tip(&self) -> Result<(u64, Hash256), RillError>;

    /// Get a block header by its hash. Returns `None` if not found.
    fn get_block_header(&self, hash: &Hash256) -> Result<Option<BlockHeader>, RillError>;

    /// Get a full block by its hash. Returns `None` if not found.
    fn get_block(&self, hash: &Hash256) -> Result<Option<Block>, RillError>;

    /// Get the block hash at a given height. Returns `None` if height exceeds tip.
    fn get_block_hash(&self, height: u64) -> Result<Option<Hash256>, RillError>;

    /// Total circulating supply in rills (sum of all mined block subsidies).
    fn circulating_supply(&self) -> Result<u64, RillError>;

    /// Validate a transaction against the current UTXO set and consensus rules.
    fn validate_transaction(&self, tx: &Transaction) -> Result<(), TransactionError>;

    /// Iterate over all UTXOs. Used for balance queries and UTXO scanning.
    /// Default implementation returns empty vec (override for production).
    fn iter_utxos(&self) -> Result<Vec<(OutPoint, UtxoEntry)>, RillError> {
        Ok(Vec::new())
    }
}

/// Block creation, validation, and reward computation.
///
/// Used by the miner to create block templates and by the node
/// to validate incoming blocks. Implemented by the consensus engine (rill-consensus).
pub trait BlockProducer: Send + Sync {
    /// Create a block template with selected mempool transactions and coinbase.
    ///
    /// The coinbase output pays to `coinbase_pubkey_hash` with the appropriate reward.
    /// `timestamp` is the proposed block timestamp (Unix seconds).
    fn create_block_template(
        &self,
        coinbase_pubkey_hash: &Hash160,
        timestamp: u64,
    ) -> Result<Block, BlockError>;

    /// Validate a complete block: header PoW, merkle root, all transactions, and reward.
    fn validate_block(&self, block: &Block) -> Result<(), BlockError>;

    /// Compute the base mining reward for a given block height.
    ///
    /// Follows the halving schedule: `INITIAL_REWARD >> (height / HALVING_INTERVAL)`.
    fn block_reward(&self, height: u64) -> u64;

    /// Compute the expected compact-form difficulty `bits` for a given block height.
    fn expected_bits(&self, height: u64) -> Result<u32, BlockError>;

    /// Validate proof-of-work: block header hash must be numerically below the difficulty target.
    fn validate_pow(&self, header: &BlockHeader) -> Result<(), BlockError>;
}

/// P2P network operations.
///
/// Abstracts block and transaction propagation over libp2p.
/// Implementations handle the actual transport, peer management,
/// and Gossipsub protocol. Implemented by rill-network.
pub trait NetworkService: Send + Sync {
    /// Broadcast a validated block to all connected peers.
    fn broadcast_block(&self, block: &Block) -> Result<(), NetworkError>;

    /// Broadcast a validated transaction to all connected peers.
    fn broadcast_transaction(&self, tx: &Transaction) -> Result<(), NetworkError>;

    /// Number of currently connected peers.
    fn peer_count(&self) -> usize;

    /// Whether the node has at least one connected peer.
    ///
    /// Default implementation: `peer_count() > 0`.
    fn is_connected(&self) -> bool {
        self.peer_count() > 0
    }

    /// Request a specific block from peers by hash.
    fn request_block(&self, hash: &Hash256) -> Result<(), NetworkError>;

    /// Request block headers starting from the given locator hashes.
    ///
    /// Locator hashes are ordered newest-first, allowing peers to find
    /// the common ancestor and send headers from there.
    fn request_headers(&self, locator: &[Hash256]) -> Result<(), NetworkError>;
}
