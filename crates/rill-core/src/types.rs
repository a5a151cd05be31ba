//! Core protocol types: transactions, blocks, UTXOs.
//!
//! All monetary values are in rills (1 RILL = 10^8 rills). Field widths
//! and serialization order follow the canonical wire layout exactly —
//! see [`crate::codec`] for the varint rules this module builds on.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::codec::{self, CodecResult};
use crate::error::TransactionError;

fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// A 32-byte double-SHA256 hash: transaction IDs, block hashes, merkle roots.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

/// Displays in reversed byte order, matching the ledger convention for
/// transaction and block-header hashes (little-endian internally, shown
/// big-endian). [`Hash160`] is not reversed — see its `Display` impl below.
impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter().rev() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 20-byte RIPEMD160(SHA256(pubkey)) hash — the P2PKH payload.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Hash160(pub [u8; 20]);

impl Hash160 {
    pub const ZERO: Self = Self([0u8; 20]);

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Hash160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 20]> for Hash160 {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash160 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Reference to a specific output of a previous transaction.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub struct OutPoint {
    pub txid: Hash256,
    pub index: u32,
}

impl OutPoint {
    /// The null outpoint, used for coinbase transaction inputs.
    pub fn null() -> Self {
        Self {
            txid: Hash256::ZERO,
            index: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.index == u32::MAX
    }

    fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.txid.as_bytes());
        buf.extend_from_slice(&self.index.to_le_bytes());
    }

    fn read(data: &[u8], offset: &mut usize) -> CodecResult<Self> {
        let txid = Hash256(codec::read_array::<32>(data, offset)?);
        let index = u32::from_le_bytes(codec::read_array::<4>(data, offset)?);
        Ok(Self { txid, index })
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// A transaction input, spending a previous output.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxInput {
    /// The outpoint being spent. Null outpoint for coinbase.
    pub previous_output: OutPoint,
    /// The script satisfying the previous output's locking script. For a
    /// coinbase input this holds arbitrary coinbase data instead.
    pub signature_script: Vec<u8>,
    pub sequence: u32,
}

impl TxInput {
    fn write(&self, buf: &mut Vec<u8>) {
        self.previous_output.write(buf);
        codec::write_bytes_with_len(buf, &self.signature_script);
        buf.extend_from_slice(&self.sequence.to_le_bytes());
    }

    fn read(data: &[u8], offset: &mut usize) -> CodecResult<Self> {
        let previous_output = OutPoint::read(data, offset)?;
        let signature_script = codec::read_bytes_with_len(data, offset)?;
        let sequence = u32::from_le_bytes(codec::read_array::<4>(data, offset)?);
        Ok(Self {
            previous_output,
            signature_script,
            sequence,
        })
    }
}

/// A transaction output, creating a new UTXO.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxOutput {
    /// Value in rills. Signed per the wire format; negative values are
    /// rejected during structural validation.
    pub value: i64,
    pub locking_script: Vec<u8>,
}

impl TxOutput {
    fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.value.to_le_bytes());
        codec::write_bytes_with_len(buf, &self.locking_script);
    }

    fn read(data: &[u8], offset: &mut usize) -> CodecResult<Self> {
        let value = i64::from_le_bytes(codec::read_array::<8>(data, offset)?);
        let locking_script = codec::read_bytes_with_len(data, offset)?;
        Ok(Self { value, locking_script })
    }
}

/// A transaction transferring value between addresses.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl Transaction {
    /// Canonical serialization: version, varint input count, inputs,
    /// varint output count, outputs, lock-time. No other fields.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.version.to_le_bytes());
        codec::write_varint(&mut buf, self.inputs.len() as u64);
        for input in &self.inputs {
            input.write(&mut buf);
        }
        codec::write_varint(&mut buf, self.outputs.len() as u64);
        for output in &self.outputs {
            output.write(&mut buf);
        }
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, TransactionError> {
        let mut offset = 0;
        Self::decode_at(data, &mut offset).map_err(|e| TransactionError::Serialization(e.0))
    }

    fn decode_at(data: &[u8], offset: &mut usize) -> CodecResult<Self> {
        let version = i32::from_le_bytes(codec::read_array::<4>(data, offset)?);
        let input_count = codec::read_varint(data, offset)?;
        let mut inputs = Vec::with_capacity(input_count as usize);
        for _ in 0..input_count {
            inputs.push(TxInput::read(data, offset)?);
        }
        let output_count = codec::read_varint(data, offset)?;
        let mut outputs = Vec::with_capacity(output_count as usize);
        for _ in 0..output_count {
            outputs.push(TxOutput::read(data, offset)?);
        }
        let lock_time = u32::from_le_bytes(codec::read_array::<4>(data, offset)?);
        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    /// Transaction ID: double-SHA256 of the canonical encoding.
    pub fn txid(&self) -> Hash256 {
        Hash256(double_sha256(&self.encode()))
    }

    /// Coinbase transaction: single input with the null outpoint.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    /// Sum of all output values. Returns `None` on overflow or a negative
    /// running total (negative individual values are caught upstream).
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs.iter().try_fold(0u64, |acc, out| {
            if out.value < 0 {
                return None;
            }
            acc.checked_add(out.value as u64)
        })
    }
}

/// Block header containing the proof-of-work puzzle.
///
/// Canonical serialization is exactly 80 bytes; the header hash is the
/// double-SHA256 of those bytes.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_hash: Hash256,
    pub merkle_root: Hash256,
    /// Seconds since the Unix epoch.
    pub timestamp: u32,
    /// Compact difficulty encoding: see [`crate::difficulty`].
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    pub const SIZE: usize = 4 + 32 + 32 + 4 + 4 + 4;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut data = [0u8; Self::SIZE];
        let mut offset = 0;
        macro_rules! put {
            ($bytes:expr) => {{
                let bytes: &[u8] = $bytes;
                data[offset..offset + bytes.len()].copy_from_slice(bytes);
                offset += bytes.len();
            }};
        }
        put!(&self.version.to_le_bytes());
        put!(self.prev_hash.as_bytes());
        put!(self.merkle_root.as_bytes());
        put!(&self.timestamp.to_le_bytes());
        put!(&self.bits.to_le_bytes());
        put!(&self.nonce.to_le_bytes());
        debug_assert_eq!(offset, Self::SIZE);
        data
    }

    pub fn decode(data: &[u8; Self::SIZE]) -> Self {
        let mut offset = 0;
        let version = i32::from_le_bytes(codec::read_array::<4>(data, &mut offset).unwrap());
        let prev_hash = Hash256(codec::read_array::<32>(data, &mut offset).unwrap());
        let merkle_root = Hash256(codec::read_array::<32>(data, &mut offset).unwrap());
        let timestamp = u32::from_le_bytes(codec::read_array::<4>(data, &mut offset).unwrap());
        let bits = u32::from_le_bytes(codec::read_array::<4>(data, &mut offset).unwrap());
        let nonce = u32::from_le_bytes(codec::read_array::<4>(data, &mut offset).unwrap());
        Self {
            version,
            prev_hash,
            merkle_root,
            timestamp,
            bits,
            nonce,
        }
    }

    /// Header hash: double-SHA256 of the 80-byte canonical encoding.
    pub fn hash(&self) -> Hash256 {
        Hash256(double_sha256(&self.encode()))
    }
}

/// A complete block: header plus transactions.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Block {
    pub header: BlockHeader,
    /// Ordered list of transactions. First transaction must be coinbase.
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }

    /// Canonical serialization: 80-byte header, varint tx count, concatenated
    /// canonical transaction encodings.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.header.encode());
        codec::write_varint(&mut buf, self.transactions.len() as u64);
        for tx in &self.transactions {
            buf.extend_from_slice(&tx.encode());
        }
        buf
    }
}

/// An entry in the unspent transaction output set.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct UtxoEntry {
    pub output: TxOutput,
    pub block_height: u64,
    pub is_coinbase: bool,
}

impl UtxoEntry {
    /// Coinbase outputs require [`COINBASE_MATURITY`](crate::constants::COINBASE_MATURITY)
    /// confirmations; everything else is always mature.
    pub fn is_mature(&self, current_height: u64) -> bool {
        if !self.is_coinbase {
            return true;
        }
        current_height.saturating_sub(self.block_height) >= crate::constants::COINBASE_MATURITY
    }
}
