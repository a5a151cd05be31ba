//! Seed management and deterministic key derivation.
//!
//! Derives secp256k1 keypairs from a 32-byte master seed by hashing the
//! seed with the child index until a valid secret scalar falls out. This
//! is simpler than full BIP-32 while providing the same deterministic,
//! recoverable properties.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use rill_core::address::{Address, Network};
use rill_core::crypto::KeyPair;
use rill_core::types::Hash160;

use crate::error::WalletError;

/// Domain separator mixed into the child key derivation hash.
const KDF_CONTEXT: &[u8] = b"rill-wallet-key-derivation-v1";

/// A 32-byte master seed for deterministic key derivation.
///
/// Secret material is zeroized on drop to prevent leaking key material
/// in freed memory.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed {
    bytes: [u8; 32],
}

impl Seed {
    /// Generate a random seed from the OS cryptographic RNG.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Create a seed from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Get the raw seed bytes. Handle with care.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl Clone for Seed {
    fn clone(&self) -> Self {
        Self {
            bytes: self.bytes,
        }
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Deterministic key derivation chain from a master seed.
///
/// Derives child secp256k1 keypairs by hashing the seed with the child
/// index. Each child index produces a unique, deterministic keypair that
/// can be recovered from the seed alone.
pub struct KeyChain {
    seed: Seed,
    network: Network,
    next_index: u32,
    /// Cache of derived keypairs by index.
    keypairs: HashMap<u32, KeyPair>,
    /// Reverse lookup: pubkey_hash -> derivation index.
    pubkey_hash_to_index: HashMap<Hash160, u32>,
}

impl KeyChain {
    /// Create a new keychain from a seed and network.
    pub fn new(seed: Seed, network: Network) -> Self {
        Self {
            seed,
            network,
            next_index: 0,
            keypairs: HashMap::new(),
            pubkey_hash_to_index: HashMap::new(),
        }
    }

    /// Derive the keypair for a specific child index.
    pub fn derive_keypair(&mut self, index: u32) -> &KeyPair {
        if !self.keypairs.contains_key(&index) {
            let kp = derive_child_keypair(&self.seed, index);
            let pkh = kp.pubkey_hash();
            self.pubkey_hash_to_index.insert(pkh, index);
            self.keypairs.insert(index, kp);
        }
        &self.keypairs[&index]
    }

    /// Derive the next keypair, advancing the internal index.
    pub fn next_keypair(&mut self) -> &KeyPair {
        let index = self.next_index;
        self.next_index = self.next_index.saturating_add(1);
        self.derive_keypair(index)
    }

    /// Get the address for a specific derivation index.
    pub fn address_at(&mut self, index: u32) -> Address {
        let kp = self.derive_keypair(index);
        Address::new(self.network, kp.pubkey_hash())
    }

    /// Derive the next address, advancing the internal index.
    pub fn next_address(&mut self) -> Address {
        let index = self.next_index;
        self.next_index = self.next_index.saturating_add(1);
        self.derive_keypair(index);
        let kp = &self.keypairs[&index];
        Address::new(self.network, kp.pubkey_hash())
    }

    /// Look up the keypair that owns a given pubkey hash.
    pub fn keypair_for_pubkey_hash(&self, hash: &Hash160) -> Option<&KeyPair> {
        self.pubkey_hash_to_index
            .get(hash)
            .and_then(|idx| self.keypairs.get(idx))
    }

    /// Restore the keychain state by deriving all keys up to index `n`.
    ///
    /// Used when loading a wallet from file to rebuild the keypair cache
    /// and pubkey hash lookup table.
    pub fn restore_to_index(&mut self, n: u32) {
        for i in 0..n {
            self.derive_keypair(i);
        }
        self.next_index = n;
    }

    /// The network this keychain is configured for.
    pub fn network(&self) -> Network {
        self.network
    }

    /// The next derivation index that will be used.
    pub fn next_index(&self) -> u32 {
        self.next_index
    }

    /// Access the seed (for wallet file serialization).
    pub(crate) fn seed(&self) -> &Seed {
        &self.seed
    }

    /// Get all known pubkey hashes.
    pub fn known_pubkey_hashes(&self) -> impl Iterator<Item = &Hash160> {
        self.pubkey_hash_to_index.keys()
    }
}

impl fmt::Debug for KeyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyChain")
            .field("network", &self.network)
            .field("next_index", &self.next_index)
            .field("cached_keys", &self.keypairs.len())
            .finish()
    }
}

/// Serializable form of keychain state for wallet file persistence.
#[derive(Serialize, Deserialize, Clone)]
pub struct KeyChainData {
    /// Master seed bytes.
    pub seed: [u8; 32],
    /// Network identifier.
    pub network: Network,
    /// Next derivation index.
    pub next_index: u32,
}

impl KeyChainData {
    /// Create keychain data from a keychain.
    pub fn from_keychain(keychain: &KeyChain) -> Self {
        Self {
            seed: *keychain.seed().as_bytes(),
            network: keychain.network(),
            next_index: keychain.next_index(),
        }
    }

    /// Restore a keychain from serialized data.
    pub fn to_keychain(&self) -> KeyChain {
        let seed = Seed::from_bytes(self.seed);
        let mut keychain = KeyChain::new(seed, self.network);
        keychain.restore_to_index(self.next_index);
        keychain
    }
}

/// Derive a child keypair from a seed and index.
///
/// Not every 32-byte digest is a valid secp256k1 scalar, so the candidate
/// is hashed again with an incrementing counter until one is accepted.
fn derive_child_keypair(seed: &Seed, index: u32) -> KeyPair {
    let mut counter: u32 = 0;
    loop {
        let mut hasher = Sha256::new();
        hasher.update(KDF_CONTEXT);
        hasher.update(seed.as_bytes());
        hasher.update(index.to_le_bytes());
        hasher.update(counter.to_le_bytes());
        let candidate: [u8; 32] = hasher.finalize().into();

        match KeyPair::from_secret_bytes(&candidate) {
            Ok(kp) => return kp,
            Err(_) => {
                counter = counter.saturating_add(1);
                continue;
            }
        }
    }
}

/// Validate that a seed produces valid keypairs.
pub fn validate_seed(seed: &Seed) -> Result<(), WalletError> {
    let _kp = derive_child_keypair(seed, 0);
    Ok(())
}
