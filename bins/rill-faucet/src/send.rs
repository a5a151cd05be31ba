//! Transaction building and submission for the faucet.
//!
//! Adapted from `bins/rill-cli/src/main.rs` `wallet_send()`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ArrayParams;
use tokio::sync::Mutex;

use rill_core::types::{Hash256, OutPoint, TxOutput, UtxoEntry};
use rill_wallet::Wallet;

// ---------------------------------------------------------------------------
// RPC client helper
// ---------------------------------------------------------------------------

pub fn rpc_client(endpoint: &str) -> Result<jsonrpsee::http_client::HttpClient> {
    jsonrpsee::http_client::HttpClientBuilder::default()
        .build(endpoint)
        .context("Failed to build RPC client")
}

// ---------------------------------------------------------------------------
// send_rill
// ---------------------------------------------------------------------------

/// Dispense `amount_rills` to `recipient_str` from the faucet wallet.
///
/// Locks the wallet mutex for the full duration (RPC + signing) to prevent
/// double-spending the same UTXOs across concurrent requests.
///
/// Returns the transaction ID (hex string) on success.
pub async fn send_rill(
    wallet: Arc<Mutex<Wallet>>,
    wallet_path: &Path,
    password: &[u8],
    recipient_str: &str,
    amount_rills: u64,
    rpc_endpoint: &str,
) -> Result<String> {
    if amount_rills == 0 {
        bail!("Amount must be greater than zero");
    }

    let recipient = recipient_str
        .parse::<rill_core::address::Address>()
        .context("Invalid recipient address")?;

    let client = rpc_client(rpc_endpoint)?;

    // Lock wallet for the entire send operation to prevent UTXO reuse.
    let mut wallet = wallet.lock().await;

    // ------------------------------------------------------------------
    // Fetch UTXOs for every wallet address
    // ------------------------------------------------------------------
    let mut all_utxos: Vec<(OutPoint, UtxoEntry)> = Vec::new();
    let address_count = wallet.address_count();

    for i in 0..address_count {
        let addr_str = wallet.keychain_mut().address_at(i).to_string();

        let mut params = ArrayParams::new();
        params.insert(addr_str).unwrap();

        let utxo_jsons: Vec<serde_json::Value> = client
            .request("getutxosbyaddress", params)
            .await
            .context("RPC getutxosbyaddress failed")?;

        for utxo_json in utxo_jsons {
            if let Some((outpoint, entry)) = parse_utxo_json(&utxo_json) {
                all_utxos.push((outpoint, entry));
            }
        }
    }

    wallet.scan_utxos(&all_utxos);

    if wallet.utxo_count() == 0 {
        bail!("Faucet wallet has no UTXOs — please fund it first");
    }

    // ------------------------------------------------------------------
    // Fetch chain height
    // ------------------------------------------------------------------
    let info: serde_json::Value = client
        .request("getinfo", ArrayParams::new())
        .await
        .context("RPC getinfo failed")?;

    let height = info["blocks"].as_u64().unwrap_or(0);

    // ------------------------------------------------------------------
    // Build and sign
    // ------------------------------------------------------------------
    let tx = wallet
        .send(&[(recipient, amount_rills)], height)
        .map_err(|e| anyhow::anyhow!("Failed to build transaction: {e}"))?;

    // ------------------------------------------------------------------
    // Broadcast
    // ------------------------------------------------------------------
    let tx_bytes = bincode::encode_to_vec(&tx, bincode::config::standard())
        .context("Failed to serialize transaction")?;
    let tx_hex = hex::encode(&tx_bytes);

    let mut params = ArrayParams::new();
    params.insert(tx_hex).unwrap();
    let txid: String = client
        .request("sendrawtransaction", params)
        .await
        .context("RPC sendrawtransaction failed")?;

    // Persist updated wallet state (next_address counter may have advanced)
    wallet
        .save_to_file(wallet_path, password)
        .context("Failed to save wallet after send")?;

    Ok(txid)
}

/// Fetch the total UTXO balance (in rills) for a list of addresses.
pub async fn fetch_balance(client: &jsonrpsee::http_client::HttpClient, addresses: &[String]) -> u64 {
    let mut total: u64 = 0;
    for addr in addresses {
        let mut params = ArrayParams::new();
        params.insert(addr.clone()).unwrap();
        let utxos: Vec<serde_json::Value> = client
            .request("getutxosbyaddress", params)
            .await
            .unwrap_or_default();
        for utxo in utxos {
            total = total.saturating_add(utxo["value"].as_u64().unwrap_or(0));
        }
    }
    total
}

/// Fetch balance and UTXO count for a single address.
///
/// Returns `(total_rills, utxo_count)`.
pub async fn fetch_balance_for_address(
    client: &jsonrpsee::http_client::HttpClient,
    address: &str,
) -> Result<(u64, usize)> {
    let mut params = ArrayParams::new();
    params.insert(address.to_string()).unwrap();
    let utxos: Vec<serde_json::Value> = client
        .request("getutxosbyaddress", params)
        .await
        .context("RPC getutxosbyaddress failed")?;
    let mut total: u64 = 0;
    for utxo in &utxos {
        total = total.saturating_add(utxo["value"].as_u64().unwrap_or(0));
    }
    Ok((total, utxos.len()))
}

// ---------------------------------------------------------------------------
// send_from_mnemonic
// ---------------------------------------------------------------------------

/// Send `amount_rills` to `recipient_str` from an ephemeral wallet derived
/// from the given mnemonic phrase.
///
/// Unlike `send_rill`, this does not require a wallet file — the keychain is
/// constructed in-memory from the mnemonic and discarded after the send.
pub async fn send_from_mnemonic(
    mnemonic: &str,
    recipient_str: &str,
    amount_rills: u64,
    rpc_endpoint: &str,
) -> Result<(String, u64)> {
    use rill_wallet::mnemonic_to_seed;

    if amount_rills == 0 {
        bail!("Amount must be greater than zero");
    }

    let recipient = recipient_str
        .parse::<rill_core::address::Address>()
        .context("Invalid recipient address")?;

    let seed = mnemonic_to_seed(mnemonic)
        .map_err(|e| anyhow::anyhow!("Invalid mnemonic: {e}"))?;
    let mut wallet = Wallet::from_seed(seed, rill_core::address::Network::Testnet);

    let client = rpc_client(rpc_endpoint)?;

    // Scan addresses 0..N until we find a gap of 2 addresses with no UTXOs.
    let mut all_utxos: Vec<(OutPoint, UtxoEntry)> = Vec::new();
    let mut gap = 0u32;

    while gap < 2 {
        let addr_str = wallet.next_address().to_string();
        let mut params = ArrayParams::new();
        params.insert(addr_str).unwrap();

        let utxo_jsons: Vec<serde_json::Value> = client
            .request("getutxosbyaddress", params)
            .await
            .context("RPC getutxosbyaddress failed")?;

        if utxo_jsons.is_empty() {
            gap += 1;
        } else {
            gap = 0;
            for utxo_json in utxo_jsons {
                if let Some((outpoint, entry)) = parse_utxo_json(&utxo_json) {
                    all_utxos.push((outpoint, entry));
                }
            }
        }
    }

    if all_utxos.is_empty() {
        bail!("Wallet has no UTXOs");
    }

    wallet.scan_utxos(&all_utxos);

    // Fetch chain height.
    let info: serde_json::Value = client
        .request("getinfo", ArrayParams::new())
        .await
        .context("RPC getinfo failed")?;

    let height = info["blocks"].as_u64().unwrap_or(0);

    let tx = wallet
        .send(&[(recipient, amount_rills)], height)
        .map_err(|e| anyhow::anyhow!("Failed to build transaction: {e}"))?;

    let spent: i64 = all_utxos
        .iter()
        .filter(|(op, _)| tx.inputs.iter().any(|i| &i.previous_output == op))
        .map(|(_, e)| e.output.value)
        .sum();
    let sent_and_change: i64 = tx.outputs.iter().map(|o| o.value).sum();
    let fee = (spent - sent_and_change).max(0) as u64;

    // Broadcast.
    let tx_bytes = bincode::encode_to_vec(&tx, bincode::config::standard())
        .context("Failed to serialize transaction")?;
    let tx_hex = hex::encode(&tx_bytes);

    let mut params = ArrayParams::new();
    params.insert(tx_hex).unwrap();
    let txid: String = client
        .request("sendrawtransaction", params)
        .await
        .context("RPC sendrawtransaction failed")?;

    Ok((txid, fee))
}

/// Parse a UTXO JSON object from the RPC response into typed values.
fn parse_utxo_json(utxo_json: &serde_json::Value) -> Option<(OutPoint, UtxoEntry)> {
    let txid_hex = utxo_json["txid"].as_str().unwrap_or_default();
    let txid_bytes = hex::decode(txid_hex).unwrap_or_default();
    let index = utxo_json["index"].as_u64().unwrap_or(0) as u32;
    let value = utxo_json["value"].as_i64().unwrap_or(0);
    let block_height = utxo_json["block_height"].as_u64().unwrap_or(0);
    let is_coinbase = utxo_json["is_coinbase"].as_bool().unwrap_or(false);
    let script_hex = utxo_json["locking_script"].as_str().unwrap_or_default();
    let locking_script = hex::decode(script_hex).unwrap_or_default();

    if txid_bytes.len() == 32 {
        let outpoint = OutPoint {
            txid: Hash256(txid_bytes.try_into().unwrap()),
            index,
        };
        let entry = UtxoEntry {
            output: TxOutput {
                value,
                locking_script,
            },
            block_height,
            is_coinbase,
        };
        Some((outpoint, entry))
    } else {
        None
    }
}
