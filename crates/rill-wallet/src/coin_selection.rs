//! Coin selection algorithm.
//!
//! Selects UTXOs to spend with a largest-first strategy: pick the biggest
//! mature outputs until the target plus fee is covered, minimizing the
//! number of inputs (and thus the fee) needed for a given send.

use rill_core::types::{OutPoint, UtxoEntry};

use crate::error::WalletError;

/// A UTXO annotated with the wallet-facing value used for selection.
#[derive(Debug, Clone)]
pub struct WalletUtxo {
    /// The outpoint identifying this UTXO.
    pub outpoint: OutPoint,
    /// The UTXO entry from the chain state.
    pub entry: UtxoEntry,
    /// Value in rills.
    pub value: u64,
}

/// Result of coin selection: which UTXOs to spend and the fee/change breakdown.
#[derive(Debug, Clone)]
pub struct CoinSelection {
    /// Selected UTXOs to spend.
    pub selected: Vec<WalletUtxo>,
    /// Total value of selected UTXOs, in rills.
    pub total_selected: u64,
    /// Change amount to return to the sender, in rills.
    pub change: u64,
    /// Transaction fee, in rills.
    pub fee: u64,
}

/// Largest-first coin selector.
pub struct CoinSelector;

impl CoinSelector {
    /// Select UTXOs to meet a target amount.
    ///
    /// # Arguments
    /// - `utxos` — available wallet UTXOs (outpoint + entry pairs)
    /// - `target` — the amount to send in rills (excluding fee)
    /// - `base_fee` — fixed portion of the fee in rills
    /// - `fee_per_input` — additional fee per input consumed
    /// - `height` — current block height, used to skip immature coinbase outputs
    pub fn select(
        utxos: &[(OutPoint, UtxoEntry)],
        target: u64,
        base_fee: u64,
        fee_per_input: u64,
        height: u64,
    ) -> Result<CoinSelection, WalletError> {
        if utxos.is_empty() {
            return Err(WalletError::NoUtxos);
        }

        if target == 0 {
            return Err(WalletError::InvalidAmount("target must be non-zero".into()));
        }

        let mut wallet_utxos: Vec<WalletUtxo> = utxos
            .iter()
            .filter(|(_, entry)| entry.is_mature(height))
            .map(|(outpoint, entry)| WalletUtxo {
                outpoint: outpoint.clone(),
                entry: entry.clone(),
                value: entry.output.value.max(0) as u64,
            })
            .collect();

        if wallet_utxos.is_empty() {
            return Err(WalletError::NoUtxos);
        }

        // Largest first: minimizes the input (and so fee) count for a given target.
        wallet_utxos.sort_by(|a, b| b.value.cmp(&a.value));

        let mut selected = Vec::new();
        let mut total_selected: u64 = 0;

        for utxo in wallet_utxos {
            total_selected = total_selected.saturating_add(utxo.value);
            selected.push(utxo);

            let fee = base_fee.saturating_add(fee_per_input.saturating_mul(selected.len() as u64));
            let needed = target.saturating_add(fee);

            if total_selected >= needed {
                let change = total_selected.saturating_sub(needed);
                return Ok(CoinSelection {
                    selected,
                    total_selected,
                    change,
                    fee,
                });
            }
        }

        let fee = base_fee.saturating_add(fee_per_input.saturating_mul(selected.len() as u64));
        Err(WalletError::InsufficientFunds {
            have: total_selected,
            need: target.saturating_add(fee),
        })
    }
}
