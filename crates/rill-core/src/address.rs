//! Address encoding for the Rill network.
//!
//! Addresses are Base58Check-encoded, mirroring Bitcoin's P2PKH address
//! format: a one-byte network version prefixed onto the 20-byte
//! [`Hash160`] pubkey hash, followed by a 4-byte checksum (the first four
//! bytes of `SHA256(SHA256(version || hash))`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::AddressError;
use crate::types::Hash160;

/// Network identifier determining the address version byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    fn version_byte(self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            Network::Testnet => 0x6f,
        }
    }

    fn from_version_byte(byte: u8) -> Result<Self, AddressError> {
        match byte {
            0x00 => Ok(Network::Mainnet),
            0x6f => Ok(Network::Testnet),
            other => Err(AddressError::InvalidVersion(other)),
        }
    }
}

/// A P2PKH address: a network tag plus the pubkey hash it pays to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Address {
    pub network: Network,
    pub pubkey_hash: Hash160,
}

impl Address {
    pub fn new(network: Network, pubkey_hash: Hash160) -> Self {
        Self { network, pubkey_hash }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut payload = Vec::with_capacity(21);
        payload.push(self.network.version_byte());
        payload.extend_from_slice(self.pubkey_hash.as_bytes());
        write!(f, "{}", bs58::encode(payload).with_check().into_string())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .with_check(None)
            .into_vec()
            .map_err(|_| AddressError::InvalidChecksum)?;

        if bytes.len() != 21 {
            return Err(AddressError::InvalidLength);
        }

        let network = Network::from_version_byte(bytes[0])?;
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&bytes[1..21]);
        Ok(Address { network, pubkey_hash: Hash160(hash) })
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_str(&s).map_err(serde::de::Error::custom)
    }
}
