//! Wallet composition: key management, UTXO tracking, transaction creation.
//!
//! The [`Wallet`] struct ties together key derivation, coin selection,
//! transaction building, and encrypted file persistence. It maintains an
//! in-memory set of owned UTXOs discovered by scanning the chain.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rill_core::address::{Address, Network};
use rill_core::constants::COIN;
use rill_core::script;
use rill_core::types::{Hash160, OutPoint, Transaction, UtxoEntry};

use crate::builder::TransactionBuilder;
use crate::encryption;
use crate::error::WalletError;
use crate::keys::{KeyChain, KeyChainData, Seed};

/// Magic bytes identifying a Rill wallet file.
pub const WALLET_MAGIC: &[u8; 4] = b"RIWL";

/// Current wallet file format version.
pub const WALLET_VERSION: u32 = 1;

/// Balance summary for a wallet's owned UTXOs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletBalance {
    /// Total value in rills.
    pub total: u64,
    /// Number of UTXOs.
    pub utxo_count: usize,
}

impl WalletBalance {
    /// Balance in RILL (display helper, not for consensus).
    pub fn total_rill(&self) -> f64 {
        self.total as f64 / COIN as f64
    }
}

/// Wallet file header serialized as JSON.
#[derive(serde::Serialize, serde::Deserialize)]
struct WalletFileHeader {
    magic: String,
    version: u32,
}

/// HD wallet.
///
/// Manages a deterministic keychain, tracks owned UTXOs, and provides
/// high-level operations for sending and receiving funds.
pub struct Wallet {
    keychain: KeyChain,
    /// Owned UTXOs: outpoint -> entry.
    utxos: HashMap<OutPoint, UtxoEntry>,
    /// Set of pubkey hashes owned by this wallet (for UTXO scanning).
    owned_pubkey_hashes: HashSet<Hash160>,
}

impl Wallet {
    /// Create a new wallet with a random seed.
    pub fn create(network: Network) -> Self {
        let seed = Seed::generate();
        Self::from_seed(seed, network)
    }

    /// Create a wallet from an existing seed (deterministic recovery).
    pub fn from_seed(seed: Seed, network: Network) -> Self {
        let keychain = KeyChain::new(seed, network);
        Self {
            keychain,
            utxos: HashMap::new(),
            owned_pubkey_hashes: HashSet::new(),
        }
    }

    /// Derive the next receive address and register its pubkey hash.
    pub fn next_address(&mut self) -> Address {
        let addr = self.keychain.next_address();
        self.owned_pubkey_hashes.insert(addr.pubkey_hash);
        addr
    }

    /// The network this wallet is configured for.
    pub fn network(&self) -> Network {
        self.keychain.network()
    }

    /// Number of derived addresses.
    pub fn address_count(&self) -> u32 {
        self.keychain.next_index()
    }

    /// Scan a UTXO set and update the wallet's owned UTXOs.
    ///
    /// Phase 1: takes an explicit list. Production: bloom filter / indexer.
    pub fn scan_utxos(&mut self, utxo_set: &[(OutPoint, UtxoEntry)]) {
        self.utxos.clear();
        for (outpoint, entry) in utxo_set {
            let Some(pkh) = script::match_p2pkh(&entry.output.locking_script) else {
                continue;
            };
            if self.owned_pubkey_hashes.contains(&pkh) {
                self.utxos.insert(outpoint.clone(), entry.clone());
            }
        }
    }

    /// Compute the current wallet balance.
    pub fn balance(&self) -> WalletBalance {
        let total = self
            .utxos
            .values()
            .map(|entry| entry.output.value.max(0) as u64)
            .fold(0u64, |acc, v| acc.saturating_add(v));

        WalletBalance {
            total,
            utxo_count: self.utxos.len(),
        }
    }

    /// Number of owned UTXOs.
    pub fn utxo_count(&self) -> usize {
        self.utxos.len()
    }

    /// Access the keychain (for signing operations).
    pub fn keychain(&self) -> &KeyChain {
        &self.keychain
    }

    /// Access the keychain mutably (for address derivation).
    pub fn keychain_mut(&mut self) -> &mut KeyChain {
        &mut self.keychain
    }

    /// Get all owned UTXOs as a vector.
    pub fn owned_utxos(&self) -> Vec<(OutPoint, UtxoEntry)> {
        self.utxos.iter().map(|(op, entry)| (op.clone(), entry.clone())).collect()
    }

    /// Build and sign a transaction sending to the given recipients.
    ///
    /// Returns the signed transaction ready for broadcast.
    pub fn send(
        &mut self,
        recipients: &[(Address, u64)],
        height: u64,
    ) -> Result<Transaction, WalletError> {
        if recipients.is_empty() {
            return Err(WalletError::BuildError("no recipients".into()));
        }

        let utxo_list: Vec<(OutPoint, UtxoEntry)> = self.utxos.clone().into_iter().collect();
        let change_addr = self.next_address();

        let mut builder = TransactionBuilder::new();
        for (addr, amount) in recipients {
            builder.add_recipient(addr.clone(), *amount);
        }

        let unsigned = builder.build(&utxo_list, &change_addr, height)?;
        TransactionBuilder::sign(unsigned, &self.keychain)
    }

    /// Save the wallet to an encrypted file.
    ///
    /// # File format
    /// ```text
    /// header_len (4 bytes LE) || header_json || encrypted_payload
    /// ```
    /// The header is unencrypted JSON containing magic bytes and version.
    /// The payload is AES-256-GCM encrypted keychain data.
    pub fn save_to_file(&self, path: &Path, password: &[u8]) -> Result<(), WalletError> {
        let header = WalletFileHeader {
            magic: String::from_utf8_lossy(WALLET_MAGIC).to_string(),
            version: WALLET_VERSION,
        };
        let header_json =
            serde_json::to_vec(&header).map_err(|e| WalletError::Serialization(e.to_string()))?;

        let kc_data = KeyChainData::from_keychain(&self.keychain);
        let payload_json =
            serde_json::to_vec(&kc_data).map_err(|e| WalletError::Serialization(e.to_string()))?;

        let encrypted = encryption::encrypt(&payload_json, password)?;

        let header_len = header_json.len() as u32;
        let mut file_data =
            Vec::with_capacity(4 + header_json.len() + encrypted.len());
        file_data.extend_from_slice(&header_len.to_le_bytes());
        file_data.extend_from_slice(&header_json);
        file_data.extend_from_slice(&encrypted);

        std::fs::write(path, &file_data).map_err(|e| WalletError::IoError(e.to_string()))
    }

    /// Load a wallet from an encrypted file.
    pub fn load_from_file(path: &Path, password: &[u8]) -> Result<Self, WalletError> {
        let file_data =
            std::fs::read(path).map_err(|e| WalletError::IoError(e.to_string()))?;

        if file_data.len() < 4 {
            return Err(WalletError::CorruptedFile("file too short".into()));
        }

        let header_len =
            u32::from_le_bytes(file_data[..4].try_into().unwrap()) as usize;
        if file_data.len() < 4 + header_len {
            return Err(WalletError::CorruptedFile("header truncated".into()));
        }

        let header_json = &file_data[4..4 + header_len];
        let header: WalletFileHeader = serde_json::from_slice(header_json)
            .map_err(|e| WalletError::CorruptedFile(format!("invalid header: {e}")))?;

        if header.magic != String::from_utf8_lossy(WALLET_MAGIC).as_ref() {
            return Err(WalletError::CorruptedFile("invalid magic bytes".into()));
        }
        if header.version != WALLET_VERSION {
            return Err(WalletError::CorruptedFile(format!(
                "unsupported version: {}",
                header.version
            )));
        }

        let encrypted = &file_data[4 + header_len..];
        let payload_json = encryption::decrypt(encrypted, password)?;

        let kc_data: KeyChainData = serde_json::from_slice(&payload_json)
            .map_err(|e| WalletError::CorruptedFile(format!("invalid payload: {e}")))?;

        let keychain = kc_data.to_keychain();

        // Rebuild owned pubkey hashes from restored keychain
        let mut owned = HashSet::new();
        for pkh in keychain.known_pubkey_hashes() {
            owned.insert(*pkh);
        }

        Ok(Self {
            keychain,
            utxos: HashMap::new(),
            owned_pubkey_hashes: owned,
        })
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("network", &self.keychain.network())
            .field("addresses", &self.keychain.next_index())
            .field("utxos", &self.utxos.len())
            .finish()
    }
}
