//! # rill-wallet — HD wallet with largest-first coin selection.
//!
//! Provides deterministic key derivation from a master seed, largest-first
//! UTXO selection, transaction building and signing, and encrypted wallet
//! file persistence.
//!
//! # Modules
//!
//! - [`error`] — `WalletError` enum
//! - [`keys`] — Seed, KeyChain, key derivation
//! - [`coin_selection`] — UTXO selection
//! - [`encryption`] — AES-256-GCM wallet file encryption
//! - [`builder`] — Transaction builder with signing
//! - [`wallet`] — High-level wallet composition

pub mod builder;
pub mod coin_selection;
pub mod encryption;
pub mod error;
pub mod keys;
pub mod wallet;

// Re-exports for convenient access
pub use builder::{Recipient, TransactionBuilder, UnsignedTransaction};
pub use coin_selection::{CoinSelection, CoinSelector, WalletUtxo};
pub use encryption::{decrypt, encrypt};
pub use error::WalletError;
pub use keys::{KeyChain, KeyChainData, Seed};
pub use wallet::{Wallet, WalletBalance};
