//! Error types for the Rill protocol.
//!
//! Each subsystem gets its own enum; [`RillError`] aggregates them for
//! callers that cross subsystem boundaries (RPC handlers, the chain
//! manager). The four top-level kinds from the error model — malformed
//! input, policy rejection, consensus rejection, and fatal state
//! corruption — map onto these variants rather than existing as a
//! separate wrapper: [`TransactionError`]/[`BlockError`] structural
//! variants are malformed-input, contextual variants are consensus
//! rejection, [`MempoolError`] is policy rejection, and
//! [`ChainStateError`] is state corruption.
use thiserror::Error;

/// The four propagation buckets every subsystem error maps into, plus
/// `IoError` for storage/transport failures that never reach a `thiserror`
/// enum of their own.
///
/// `MalformedInput` is rejected before touching chain state (stateless,
/// depends only on the object itself). `PolicyRejection` is a local
/// choice (mempool limits, fee policy) another node may disagree with.
/// `ConsensusRejection` depends on chain state and every honest node must
/// agree on it. `StateCorruption` means an invariant the code assumes
/// elsewhere has already broken — callers should halt rather than retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedInput,
    PolicyRejection,
    ConsensusRejection,
    StateCorruption,
    IoError,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("unknown UTXO: {0}")] UnknownUtxo(String),
    #[error("insufficient funds: have {have}, need {need}")] InsufficientFunds { have: u64, need: u64 },
    #[error("invalid signature on input {index}")] InvalidSignature { index: usize },
    #[error("duplicate input: {0}")] DuplicateInput(String),
    #[error("oversized: {size} > {max}")] OversizedTransaction { size: usize, max: usize },
    #[error("empty inputs or outputs")] EmptyInputsOrOutputs,
    #[error("value overflow")] ValueOverflow,
    #[error("invalid coinbase: {0}")] InvalidCoinbase(String),
    #[error("serialization: {0}")] Serialization(String),
    #[error("immature coinbase UTXO at input {index}")] ImmatureCoinbase { index: usize },
    #[error("null outpoint in non-coinbase input {0}")] NullOutpointInRegularTx(usize),
    #[error("negative output value at index {0}")] NegativeOutputValue(usize),
    #[error("output value {value} at index {index} exceeds max money {max}")] OutputValueTooLarge { index: usize, value: u64, max: u64 },
    #[error("too many inputs: {count} > {max}")] TooManyInputs { count: usize, max: usize },
    #[error("too many outputs: {count} > {max}")] TooManyOutputs { count: usize, max: usize },
    #[error("script error on input {index}: {reason}")] ScriptError { index: usize, reason: String },
    #[error("coinbase script size {size} out of bounds (2..={max})")] InvalidCoinbaseScriptSize { size: usize, max: usize },
}

impl TransactionError {
    /// Which propagation bucket this variant belongs to.
    ///
    /// Structural checks (shape, bounds, overflow) are stateless and map to
    /// `MalformedInput`; checks that needed a UTXO lookup map to
    /// `ConsensusRejection` since every node must agree on chain state.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownUtxo(_)
            | Self::InsufficientFunds { .. }
            | Self::InvalidSignature { .. }
            | Self::ImmatureCoinbase { .. }
            | Self::ScriptError { .. } => ErrorKind::ConsensusRejection,
            _ => ErrorKind::MalformedInput,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("invalid proof of work")] InvalidPoW,
    #[error("invalid prev hash")] InvalidPrevHash,
    #[error("timestamp too far in the future: {0}")] TimestampTooFar(i64),
    #[error("timestamp not after median of past blocks")] TimestampNotAfterParent,
    #[error("invalid merkle root")] InvalidMerkleRoot,
    #[error("invalid reward: got {got}, expected {expected}")] InvalidReward { got: u64, expected: u64 },
    #[error("oversized: {size} > {max}")] OversizedBlock { size: usize, max: usize },
    #[error("no coinbase")] NoCoinbase,
    #[error("first transaction is not coinbase")] FirstTxNotCoinbase,
    #[error("multiple coinbase transactions")] MultipleCoinbase,
    #[error("duplicate txid: {0}")] DuplicateTxid(String),
    #[error("double spend across transactions: {0}")] DoubleSpend(String),
    #[error("invalid difficulty bits: got {got:#x}, expected {expected:#x}")] InvalidDifficulty { got: u32, expected: u32 },
    #[error("tx error in {index}: {source}")] TransactionError { index: usize, source: TransactionError },
    #[error("invalid block version: {0}")] InvalidBlockVersion(i32),
    #[error("coinbase missing BIP34 height commitment")] MissingHeightCommitment,
    #[error("coinbase height commitment mismatch: got {got}, expected {expected}")] HeightCommitmentMismatch { got: u64, expected: u64 },
    #[error("empty block")] EmptyBlock,
}

impl BlockError {
    /// Which propagation bucket this variant belongs to. A wrapped
    /// [`TransactionError`] defers to its own `kind()`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidBlockVersion(_)
            | Self::NoCoinbase
            | Self::FirstTxNotCoinbase
            | Self::MultipleCoinbase
            | Self::DuplicateTxid(_)
            | Self::InvalidMerkleRoot
            | Self::OversizedBlock { .. }
            | Self::EmptyBlock => ErrorKind::MalformedInput,
            Self::TransactionError { source, .. } => source.kind(),
            _ => ErrorKind::ConsensusRejection,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("peer disconnected: {0}")] PeerDisconnected(String),
    #[error("message too large: {size}")] MessageTooLarge { size: usize },
    #[error("timeout")] Timeout,
    #[error("locator too large: {size} > {max}")] LocatorTooLarge { size: usize, max: usize },
}

impl NetworkError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::IoError
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
    #[error("pubkey hash does not match expected")] PubkeyHashMismatch,
    #[error("input index out of bounds: {index} >= {len}")] InputIndexOutOfBounds { index: usize, len: usize },
    #[error("unknown sighash type: {0:#x}")] UnknownSighashType(u8),
    #[error("SIGHASH_SINGLE index {index} has no matching output (of {outputs})")] SighashSingleOutOfRange { index: usize, outputs: usize },
}

impl CryptoError {
    /// Malformed key/signature bytes and out-of-range indices are
    /// stateless; an actual verification failure depends on which UTXO the
    /// input claims to spend, so it's a consensus rejection.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::VerificationFailed | Self::PubkeyHashMismatch => ErrorKind::ConsensusRejection,
            _ => ErrorKind::MalformedInput,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid HRP")] InvalidHrp,
    #[error("invalid length")] InvalidLength,
    #[error("invalid checksum")] InvalidChecksum,
    #[error("invalid character: {0}")] InvalidCharacter(char),
    #[error("invalid version: {0}")] InvalidVersion(u8),
    #[error("invalid padding bits")] InvalidPadding,
    #[error("unknown network: {0}")] UnknownNetwork(String),
    #[error("missing separator")] MissingSeparator,
    #[error("mixed case")] MixedCase,
}

impl AddressError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::MalformedInput
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MempoolError {
    #[error("transaction already in pool: {0}")] AlreadyExists(String),
    #[error("conflicts with pool tx {existing_txid} on outpoint {outpoint}")] Conflict { new_txid: String, existing_txid: String, outpoint: String },
    #[error("pool full")] PoolFull,
    #[error("internal: {0}")] Internal(String),
    #[error("fee too low: {got} < minimum {min}")] FeeTooLow { got: u64, min: u64 },
    #[error("fee rate too low: {got} < minimum {min}")] FeeRateTooLow { got: u64, min: u64 },
    #[error("dust output at index {index}: {value} < {min}")] DustOutput { index: usize, value: u64, min: u64 },
    #[error("replacement fee rate {got} does not exceed {min} of any conflicting transaction")] ReplacementFeeRateTooLow { got: u64, min: u64 },
    #[error("replacement fee {got} does not exceed total conflicting fee {min}")] ReplacementFeeTooLow { got: u64, min: u64 },
    #[error("replacement pays insufficient additional fee: needs {needed} more, pays {paid}")] InsufficientReplacementFee { needed: u64, paid: u64 },
    #[error("too many ancestors: {count} > {max}")] TooManyAncestors { count: usize, max: usize },
    #[error("too many descendants: {count} > {max}")] TooManyDescendants { count: usize, max: usize },
    #[error("unknown transaction: {0}")] UnknownTransaction(String),
}

impl MempoolError {
    /// All rejections here are this node's own admission policy — a peer
    /// running different limits may accept the same transaction.
    /// `Internal` is the exception: it signals an encoding invariant broke.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Internal(_) => ErrorKind::StateCorruption,
            _ => ErrorKind::PolicyRejection,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainStateError {
    #[error("empty chain: no blocks connected")] EmptyChain,
    #[error("block not found: {0}")] BlockNotFound(String),
    #[error("undo data missing for block: {0}")] UndoDataMissing(String),
    #[error("missing utxo during connect: {0}")] MissingUtxo(String),
    #[error("height mismatch: expected {expected}, got {got}")] HeightMismatch { expected: u64, got: u64 },
    #[error("duplicate block: {0}")] DuplicateBlock(String),
    #[error("fork point not found for candidate tip {0}")] ForkPointNotFound(String),
    #[error("candidate chain does not improve on current tip")] InsufficientWork,
}

impl ChainStateError {
    /// `InsufficientWork` just means a candidate chain lost a comparison;
    /// everything else here means the store no longer matches what the
    /// chain manager assumes about it, which is unrecoverable in place.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientWork => ErrorKind::ConsensusRejection,
            _ => ErrorKind::StateCorruption,
        }
    }
}

#[derive(Error, Debug)]
pub enum RillError {
    #[error(transparent)] Transaction(#[from] TransactionError),
    #[error(transparent)] Block(#[from] BlockError),
    #[error(transparent)] Network(#[from] NetworkError),
    #[error(transparent)] Crypto(#[from] CryptoError),
    #[error(transparent)] Address(#[from] AddressError),
    #[error(transparent)] Mempool(#[from] MempoolError),
    #[error(transparent)] ChainState(#[from] ChainStateError),
    #[error("storage: {0}")] Storage(String),
    #[error("io: {0}")] Io(String),
}

impl RillError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transaction(e) => e.kind(),
            Self::Block(e) => e.kind(),
            Self::Network(e) => e.kind(),
            Self::Crypto(e) => e.kind(),
            Self::Address(e) => e.kind(),
            Self::Mempool(e) => e.kind(),
            Self::ChainState(e) => e.kind(),
            Self::Storage(_) | Self::Io(_) => ErrorKind::IoError,
        }
    }
}
