//! In-memory pool of unconfirmed transactions (mempool).
//!
//! The mempool stores validated transactions awaiting inclusion in blocks.
//! It provides:
//! - O(1) lookup by txid
//! - O(1) conflict detection via spent-outpoint index
//! - In-mempool ancestor/descendant package tracking, bounded by
//!   [`MAX_ANCESTORS`](crate::constants::MAX_ANCESTORS) and
//!   [`MAX_DESCENDANTS`](crate::constants::MAX_DESCENDANTS)
//! - Replace-By-Fee (RBF): a conflicting transaction may evict the pool
//!   entries it conflicts with if it pays strictly more in both absolute
//!   fee and fee rate, with a minimum additional fee-rate increment
//! - Package-aware, fee-rate-ordered selection for block templates
//! - Percentile-based fee estimation
//!
//! Transactions must be validated by the caller before insertion (using
//! [`validate_transaction`](crate::validation::validate_transaction)).
//! The mempool only checks for duplicates, input conflicts, and the
//! policy limits documented above.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::{
    DEFAULT_MEMPOOL_MAX_AGE_SECS, DUST_THRESHOLD, MAX_ANCESTORS, MAX_DESCENDANTS,
    MIN_RELAY_FEE_RATE, MIN_REPLACEMENT_FEE_RATE_INCREMENT,
};
use crate::error::MempoolError;
use crate::types::{Block, Hash256, OutPoint, Transaction};

/// Default maximum number of transactions in the mempool.
pub const DEFAULT_MAX_COUNT: usize = 5_000;

/// Default maximum total serialized bytes in the mempool (5 MiB).
pub const DEFAULT_MAX_BYTES: usize = 5 * 1024 * 1024;

/// Fee rate precision multiplier.
///
/// Fee rate is stored as `fee * FEE_RATE_PRECISION / size`, giving
/// milli-rills per byte for fine-grained ordering.
const FEE_RATE_PRECISION: u128 = 1_000;

/// Compute fee rate in milli-rills per byte.
///
/// Uses u128 intermediate to prevent overflow for large fees.
fn compute_fee_rate(fee: u64, size: usize) -> u64 {
    if size == 0 {
        return u64::MAX;
    }
    let rate = (fee as u128) * FEE_RATE_PRECISION / (size as u128);
    rate.min(u64::MAX as u128) as u64
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// A transaction stored in the mempool with precomputed metadata.
#[derive(Debug, Clone)]
pub struct MempoolEntry {
    /// The unconfirmed transaction.
    pub tx: Transaction,
    /// Precomputed transaction ID.
    pub txid: Hash256,
    /// Transaction fee in rills (`total_input - total_output`).
    pub fee: u64,
    /// Serialized size in bytes.
    pub size: usize,
    /// Unix timestamp (seconds) at which this entry was admitted.
    pub admitted_at: u64,
    /// Fee rate in milli-rills per byte, for this transaction alone.
    fee_rate: u64,
    /// Other in-mempool transactions this one directly spends from.
    parents: HashSet<Hash256>,
    /// Other in-mempool transactions that directly spend this one.
    children: HashSet<Hash256>,
    /// This transaction's fee plus the (non-deduplicated) sum of its
    /// direct parents' `ancestor_fee` at the time this entry was admitted.
    ancestor_fee: u64,
    /// This transaction's size plus the (non-deduplicated) sum of its
    /// direct parents' `ancestor_size` at the time this entry was admitted.
    ancestor_size: usize,
}

impl MempoolEntry {
    /// Fee rate in milli-rills per byte, for this transaction alone.
    pub fn fee_rate(&self) -> u64 {
        self.fee_rate
    }

    /// Package fee rate: `ancestor_fee * PRECISION / ancestor_size`, used to
    /// order block-template selection and eviction so that a low-fee child
    /// is carried (or evicted) together with the parents it depends on.
    pub fn ancestor_fee_rate(&self) -> u64 {
        compute_fee_rate(self.ancestor_fee, self.ancestor_size)
    }

    /// Number of in-mempool ancestors this transaction depends on directly.
    pub fn parents(&self) -> &HashSet<Hash256> {
        &self.parents
    }

    /// Number of in-mempool descendants that directly spend this transaction.
    pub fn children(&self) -> &HashSet<Hash256> {
        &self.children
    }
}

/// In-memory pool of unconfirmed transactions.
///
/// Stores pre-validated transactions indexed by txid and spent outpoints,
/// tracking in-mempool parent/child relationships so ancestor and
/// descendant limits and package-aware fee-rate ordering can be enforced.
///
/// Not thread-safe — callers should wrap in a `Mutex` or `RwLock` if
/// concurrent access is needed.
pub struct Mempool {
    /// Primary storage: txid → entry.
    entries: HashMap<Hash256, MempoolEntry>,
    /// Spent outpoint → txid of the pool transaction that spends it.
    by_outpoint: HashMap<OutPoint, Hash256>,
    /// Ancestor-fee-rate-ordered index: `(ancestor_fee_rate, txid)`.
    /// Ascending order: lowest first (for eviction), iterate in reverse
    /// for highest-first (block template selection).
    by_fee_rate: BTreeSet<(u64, Hash256)>,
    /// Maximum transaction count.
    max_count: usize,
    /// Maximum total serialized bytes.
    max_bytes: usize,
    /// Maximum age, in seconds, before an entry is pruned by [`Self::expire`].
    max_age_secs: u64,
    /// Current total serialized bytes in the pool.
    total_bytes: usize,
    /// Minimum fee rate (rills per byte, unscaled) a transaction must pay
    /// to be admitted (§4.6 admission step 2).
    min_fee_rate: u64,
}

impl Mempool {
    /// Create a new mempool with the given size limits, the default
    /// maximum entry age, and the default minimum fee rate
    /// ([`MIN_RELAY_FEE_RATE`]).
    pub fn new(max_count: usize, max_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            by_outpoint: HashMap::new(),
            by_fee_rate: BTreeSet::new(),
            max_count,
            max_bytes,
            max_age_secs: DEFAULT_MEMPOOL_MAX_AGE_SECS,
            total_bytes: 0,
            min_fee_rate: MIN_RELAY_FEE_RATE,
        }
    }

    /// Create a new mempool with default size limits.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_MAX_COUNT, DEFAULT_MAX_BYTES)
    }

    /// Override the maximum entry age used by [`Self::expire`].
    pub fn with_max_age_secs(mut self, max_age_secs: u64) -> Self {
        self.max_age_secs = max_age_secs;
        self
    }

    /// Override the minimum fee rate (rills per byte) required for
    /// admission, in place of the default [`MIN_RELAY_FEE_RATE`].
    pub fn with_min_fee_rate(mut self, min_fee_rate: u64) -> Self {
        self.min_fee_rate = min_fee_rate;
        self
    }

    /// The minimum fee rate (rills per byte) a transaction must pay to be
    /// admitted to this pool.
    pub fn min_fee_rate(&self) -> u64 {
        self.min_fee_rate
    }

    /// Insert a validated transaction into the mempool.
    ///
    /// The transaction must have been validated by the caller (structural +
    /// contextual). `fee` is the transaction's own fee in rills (from
    /// [`ValidatedTransaction::fee`](crate::validation::ValidatedTransaction::fee)).
    ///
    /// Admission proceeds in stages:
    /// 1. Reject exact duplicates.
    /// 2. Reject any output below [`DUST_THRESHOLD`] (local relay policy,
    ///    §7 — not a consensus rule, so it is enforced here rather than in
    ///    structural validation).
    /// 3. Reject if the fee rate is below this pool's configured
    ///    [`Self::min_fee_rate`].
    /// 4. If any input conflicts with a pool transaction, attempt
    ///    replace-by-fee: the new transaction must pay strictly more in
    ///    absolute fee and fee rate than every conflicting transaction (and
    ///    everything descending from them), and at least
    ///    [`MIN_REPLACEMENT_FEE_RATE_INCREMENT`] more per byte than what it
    ///    evicts. Otherwise the insert is rejected.
    /// 5. Evict lowest ancestor-fee-rate entries (cascading through
    ///    descendants) if the pool is full and the new transaction pays more.
    /// 6. Reject if the transaction would exceed [`MAX_ANCESTORS`] in-pool
    ///    ancestors, or would push any in-pool ancestor past
    ///    [`MAX_DESCENDANTS`].
    ///
    /// Returns the txid on success.
    pub fn insert(&mut self, tx: Transaction, fee: u64) -> Result<Hash256, MempoolError> {
        let txid = tx.txid();
        if self.entries.contains_key(&txid) {
            return Err(MempoolError::AlreadyExists(txid.to_string()));
        }

        for (i, output) in tx.outputs.iter().enumerate() {
            let value = output.value as u64;
            if value < DUST_THRESHOLD {
                return Err(MempoolError::DustOutput { index: i, value, min: DUST_THRESHOLD });
            }
        }

        let size = tx.encode().len();
        let fee_rate = compute_fee_rate(fee, size);
        let min_fee_rate_scaled = self.min_fee_rate * FEE_RATE_PRECISION as u64;
        if fee_rate < min_fee_rate_scaled {
            return Err(MempoolError::FeeRateTooLow { got: fee_rate, min: min_fee_rate_scaled });
        }

        // Conflicting pool transactions (distinct txids spending the same outpoints).
        let conflicts = self.conflicting_txids(&tx);
        if !conflicts.is_empty() {
            self.validate_replacement(&conflicts, fee, fee_rate)?;
        }

        // Direct in-pool parents: anything the new transaction spends from
        // that is itself currently in the pool. Computed after conflict
        // eviction would remove the conflicting set, but conflicts never
        // overlap with parents (a parent is spent *from*, a conflict spends
        // the *same* outpoint), so this is safe to compute now.
        let parent_txids: HashSet<Hash256> = tx
            .inputs
            .iter()
            .filter_map(|input| {
                self.entries
                    .get(&input.previous_output.txid)
                    .map(|_| input.previous_output.txid)
            })
            .collect();

        let ancestor_count = self.count_ancestors(&parent_txids);
        if ancestor_count + 1 > MAX_ANCESTORS {
            return Err(MempoolError::TooManyAncestors {
                count: ancestor_count + 1,
                max: MAX_ANCESTORS,
            });
        }
        for parent_txid in &parent_txids {
            if let Some(parent) = self.entries.get(parent_txid) {
                if parent.children.len() + 1 > MAX_DESCENDANTS {
                    return Err(MempoolError::TooManyDescendants {
                        count: parent.children.len() + 1,
                        max: MAX_DESCENDANTS,
                    });
                }
            }
        }

        // Evict replaced transactions now that replacement has been validated.
        for conflict_txid in conflicts {
            self.remove_with_descendants(conflict_txid);
        }

        // Evict lowest-ancestor-fee-rate entries (with their descendants) if
        // the pool is full, as long as the new transaction pays more.
        while (self.entries.len() >= self.max_count || self.total_bytes + size > self.max_bytes)
            && !self.entries.is_empty()
        {
            let lowest = self.by_fee_rate.iter().next().copied();
            match lowest {
                Some((lowest_rate, lowest_txid)) if lowest_rate < fee_rate => {
                    self.remove_with_descendants(lowest_txid);
                }
                _ => return Err(MempoolError::PoolFull),
            }
        }
        if self.entries.len() >= self.max_count || self.total_bytes + size > self.max_bytes {
            return Err(MempoolError::PoolFull);
        }

        let (ancestor_fee, ancestor_size) = parent_txids.iter().fold(
            (fee, size),
            |(acc_fee, acc_size), parent_txid| {
                let parent = &self.entries[parent_txid];
                (acc_fee + parent.ancestor_fee, acc_size + parent.ancestor_size)
            },
        );

        for input in &tx.inputs {
            self.by_outpoint.insert(input.previous_output.clone(), txid);
        }
        for parent_txid in &parent_txids {
            self.entries
                .get_mut(parent_txid)
                .expect("parent present")
                .children
                .insert(txid);
        }
        self.total_bytes += size;
        self.by_fee_rate
            .insert((compute_fee_rate(ancestor_fee, ancestor_size), txid));
        self.entries.insert(
            txid,
            MempoolEntry {
                tx,
                txid,
                fee,
                size,
                admitted_at: now_secs(),
                fee_rate,
                parents: parent_txids,
                children: HashSet::new(),
                ancestor_fee,
                ancestor_size,
            },
        );

        Ok(txid)
    }

    /// Validate a replace-by-fee attempt against the pool transactions
    /// `conflicts` (and everything descending from them) that the incoming
    /// transaction would evict.
    fn validate_replacement(
        &self,
        conflicts: &[Hash256],
        new_fee: u64,
        new_fee_rate: u64,
    ) -> Result<(), MempoolError> {
        let evicted = self.with_descendants(conflicts);

        let mut sum_fee: u64 = 0;
        let mut sum_size: usize = 0;
        let mut max_fee_rate: u64 = 0;
        for txid in &evicted {
            let entry = &self.entries[txid];
            sum_fee += entry.fee;
            sum_size += entry.size;
            max_fee_rate = max_fee_rate.max(entry.fee_rate());
        }

        if new_fee_rate <= max_fee_rate {
            return Err(MempoolError::ReplacementFeeRateTooLow {
                got: new_fee_rate,
                min: max_fee_rate,
            });
        }
        if new_fee <= sum_fee {
            return Err(MempoolError::ReplacementFeeTooLow {
                got: new_fee,
                min: sum_fee,
            });
        }
        let needed_increment = MIN_REPLACEMENT_FEE_RATE_INCREMENT.saturating_mul(sum_size as u64);
        let paid_increment = new_fee - sum_fee;
        if paid_increment < needed_increment {
            return Err(MempoolError::InsufficientReplacementFee {
                needed: sum_fee + needed_increment,
                paid: new_fee,
            });
        }
        Ok(())
    }

    /// All in-mempool ancestors of `parents`, including `parents` themselves
    /// (deduplicated, unlike the `ancestor_fee`/`ancestor_size` accounting).
    fn count_ancestors(&self, parents: &HashSet<Hash256>) -> usize {
        let mut seen = HashSet::new();
        let mut stack: Vec<Hash256> = parents.iter().copied().collect();
        while let Some(txid) = stack.pop() {
            if seen.insert(txid) {
                if let Some(entry) = self.entries.get(&txid) {
                    stack.extend(entry.parents.iter().copied());
                }
            }
        }
        seen.len()
    }

    /// `roots` plus every in-mempool transaction that (transitively) spends
    /// one of them.
    fn with_descendants(&self, roots: &[Hash256]) -> HashSet<Hash256> {
        let mut seen = HashSet::new();
        let mut stack: Vec<Hash256> = roots.to_vec();
        while let Some(txid) = stack.pop() {
            if seen.insert(txid) {
                if let Some(entry) = self.entries.get(&txid) {
                    stack.extend(entry.children.iter().copied());
                }
            }
        }
        seen
    }

    /// Remove a transaction from the mempool by txid.
    ///
    /// Returns the removed entry, or `None` if not found. Does not remove
    /// descendants — see [`Self::remove_with_descendants`] for that.
    pub fn remove(&mut self, txid: &Hash256) -> Option<MempoolEntry> {
        self.remove_entry(*txid)
    }

    /// Remove a transaction and everything that (transitively) spends it.
    pub fn remove_with_descendants(&mut self, txid: Hash256) {
        for victim in self.with_descendants(&[txid]) {
            self.remove_entry(victim);
        }
    }

    /// Internal: remove an entry and clean up all indices, including
    /// unlinking it from its parents' and children's sets.
    fn remove_entry(&mut self, txid: Hash256) -> Option<MempoolEntry> {
        let entry = self.entries.remove(&txid)?;
        for input in &entry.tx.inputs {
            self.by_outpoint.remove(&input.previous_output);
        }
        self.by_fee_rate
            .remove(&(compute_fee_rate(entry.ancestor_fee, entry.ancestor_size), txid));
        self.total_bytes -= entry.size;
        for parent_txid in &entry.parents {
            if let Some(parent) = self.entries.get_mut(parent_txid) {
                parent.children.remove(&txid);
            }
        }
        for child_txid in &entry.children {
            if let Some(child) = self.entries.get_mut(child_txid) {
                child.parents.remove(&txid);
            }
        }
        Some(entry)
    }

    /// Remove every entry older than `max_age_secs` (from [`Self::new`]'s
    /// default, or [`Self::with_max_age_secs`]). Descendants of an expired
    /// entry are pruned too, since they'd otherwise reference a parent no
    /// longer validated against the chain.
    pub fn expire(&mut self) -> Vec<Hash256> {
        let cutoff = now_secs().saturating_sub(self.max_age_secs);
        let stale: Vec<Hash256> = self
            .entries
            .values()
            .filter(|e| e.admitted_at < cutoff)
            .map(|e| e.txid)
            .collect();
        let mut removed = HashSet::new();
        for txid in stale {
            for victim in self.with_descendants(&[txid]) {
                if removed.insert(victim) {
                    self.remove_entry(victim);
                }
            }
        }
        removed.into_iter().collect()
    }

    /// Check if a transaction with the given txid is in the pool.
    pub fn contains(&self, txid: &Hash256) -> bool {
        self.entries.contains_key(txid)
    }

    /// Get a mempool entry by txid.
    pub fn get(&self, txid: &Hash256) -> Option<&MempoolEntry> {
        self.entries.get(txid)
    }

    /// Check whether any of a transaction's inputs conflict with pool entries.
    ///
    /// Returns `true` if any input outpoint is already spent by a pool
    /// transaction.
    pub fn has_conflict(&self, tx: &Transaction) -> bool {
        tx.inputs
            .iter()
            .any(|input| self.by_outpoint.contains_key(&input.previous_output))
    }

    /// Get the txids of pool entries that conflict with the given transaction.
    ///
    /// Returns a deduplicated list of txids whose inputs overlap with `tx`.
    pub fn conflicting_txids(&self, tx: &Transaction) -> Vec<Hash256> {
        let mut seen = HashSet::new();
        tx.inputs
            .iter()
            .filter_map(|input| self.by_outpoint.get(&input.previous_output).copied())
            .filter(|txid| seen.insert(*txid))
            .collect()
    }

    /// Select transactions for a block template, greedy by ancestor fee
    /// rate (highest first). A transaction drags in any of its unselected
    /// in-mempool ancestors as a single package (§4.6 block-template
    /// selection); the package is admitted only if it fits `max_block_bytes`
    /// in its entirety, and always in topological order (parents before
    /// children).
    ///
    /// Ties in ancestor fee rate break by absolute ancestor fee, then by
    /// lexicographically smaller txid.
    pub fn select_transactions(&self, max_block_bytes: usize) -> Vec<&MempoolEntry> {
        let mut order: Vec<&MempoolEntry> = self.entries.values().collect();
        order.sort_by(|a, b| {
            b.ancestor_fee_rate()
                .cmp(&a.ancestor_fee_rate())
                .then_with(|| b.ancestor_fee.cmp(&a.ancestor_fee))
                .then_with(|| a.txid.cmp(&b.txid))
        });

        let mut selected = Vec::new();
        let mut chosen: HashSet<Hash256> = HashSet::new();
        let mut remaining = max_block_bytes;

        for entry in order {
            if chosen.contains(&entry.txid) {
                continue;
            }
            let package = self.unselected_ancestor_package(entry, &chosen);
            let package_size: usize = package.iter().map(|e| e.size).sum();
            if package_size > remaining {
                continue;
            }
            for pkg_entry in package {
                chosen.insert(pkg_entry.txid);
                selected.push(pkg_entry);
            }
            remaining -= package_size;
        }

        selected
    }

    /// `entry` together with its in-mempool ancestors not yet in `chosen`,
    /// ordered topologically (every ancestor appears before its descendant).
    fn unselected_ancestor_package<'a>(
        &'a self,
        entry: &'a MempoolEntry,
        chosen: &HashSet<Hash256>,
    ) -> Vec<&'a MempoolEntry> {
        let mut visited = HashSet::new();
        let mut package = Vec::new();
        self.collect_unselected_ancestors(entry, chosen, &mut visited, &mut package);
        package
    }

    fn collect_unselected_ancestors<'a>(
        &'a self,
        entry: &'a MempoolEntry,
        chosen: &HashSet<Hash256>,
        visited: &mut HashSet<Hash256>,
        out: &mut Vec<&'a MempoolEntry>,
    ) {
        if chosen.contains(&entry.txid) || !visited.insert(entry.txid) {
            return;
        }
        for parent_txid in &entry.parents {
            if let Some(parent) = self.entries.get(parent_txid) {
                self.collect_unselected_ancestors(parent, chosen, visited, out);
            }
        }
        out.push(entry);
    }

    /// Estimate the fee rate (milli-rills per byte) needed to confirm
    /// within `target_blocks`, using the pool's current ancestor-fee-rate
    /// distribution.
    ///
    /// Maps `target_blocks` to a percentile of in-pool fee rates: 1 block
    /// uses the 90th percentile, 3 the 75th, 6 the 50th, and anything
    /// beyond that the 25th. Returns `None` for an empty pool.
    pub fn fee_estimate(&self, target_blocks: u32) -> Option<u64> {
        if self.entries.is_empty() {
            return None;
        }
        let percentile = match target_blocks {
            0 | 1 => 90,
            2 | 3 => 75,
            4..=6 => 50,
            _ => 25,
        };

        let mut rates: Vec<u64> = self.entries.values().map(|e| e.ancestor_fee_rate()).collect();
        rates.sort_unstable();

        // Index into the ascending array for the requested percentile:
        // percentile 90 wants the rate that 90% of transactions pay at or
        // below, i.e. the entry 90% of the way up the sorted list.
        let idx = ((rates.len() - 1) * percentile) / 100;
        rates.get(idx).copied()
    }

    /// Remove transactions confirmed in a block and any that conflict.
    ///
    /// Call this when a new block is accepted into the chain. Removes:
    /// 1. Transactions whose txids appear in the block
    /// 2. Pool transactions whose inputs are now spent by block transactions
    pub fn remove_confirmed_block(&mut self, block: &Block) {
        let mut confirmed_txids = HashSet::new();
        let mut spent = HashSet::new();

        for tx in &block.transactions {
            confirmed_txids.insert(tx.txid());
            for input in &tx.inputs {
                if !input.previous_output.is_null() {
                    spent.insert(input.previous_output.clone());
                }
            }
        }

        for txid in &confirmed_txids {
            self.remove_entry(*txid);
        }

        // Remove pool transactions that conflict with the block's spent outpoints.
        let conflicting: Vec<Hash256> = spent
            .iter()
            .filter_map(|op| self.by_outpoint.get(op).copied())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        for txid in conflicting {
            self.remove_with_descendants(txid);
        }
    }

    /// Number of transactions in the pool.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total serialized bytes of all transactions in the pool.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Maximum transaction count limit.
    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Maximum total bytes limit.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Total fees of all transactions in the pool.
    pub fn total_fees(&self) -> u64 {
        self.entries.values().map(|e| e.fee).sum()
    }

    /// Iterate over all entries (arbitrary order).
    pub fn iter(&self) -> impl Iterator<Item = &MempoolEntry> {
        self.entries.values()
    }

    /// Collect all txids in the pool.
    pub fn txids(&self) -> Vec<Hash256> {
        self.entries.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{COIN, MIN_TX_FEE};
    use crate::merkle;
    use crate::script::p2pkh_locking_script;
    use crate::types::{BlockHeader, Hash160, TxInput, TxOutput};

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Create a test transaction spending the given outpoints.
    fn make_tx(outpoints: &[OutPoint], output_value: u64, lock_time: u32) -> Transaction {
        Transaction {
            version: 1,
            inputs: outpoints
                .iter()
                .map(|op| TxInput {
                    previous_output: op.clone(),
                    signature_script: vec![0; 64],
                    sequence: 0xFFFF_FFFF,
                })
                .collect(),
            outputs: vec![TxOutput {
                value: output_value as i64,
                locking_script: p2pkh_locking_script(&Hash160::ZERO),
            }],
            lock_time,
        }
    }

    /// Create an outpoint with a unique txid derived from `seed`.
    fn outpoint(seed: u8, index: u32) -> OutPoint {
        OutPoint {
            txid: Hash256([seed; 32]),
            index,
        }
    }

    fn make_coinbase() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutPoint::null(),
                signature_script: vec![],
                sequence: 0xFFFF_FFFF,
            }],
            outputs: vec![TxOutput {
                value: (50 * COIN) as i64,
                locking_script: p2pkh_locking_script(&Hash160::ZERO),
            }],
            lock_time: 0,
        }
    }

    fn make_block(txs: Vec<Transaction>) -> Block {
        let txids: Vec<Hash256> = txs.iter().map(|t| t.txid()).collect();
        Block {
            header: BlockHeader {
                version: 1,
                prev_hash: Hash256::ZERO,
                merkle_root: merkle::merkle_root(&txids),
                timestamp: 0,
                bits: crate::difficulty::MAX_BITS,
                nonce: 0,
            },
            transactions: txs,
        }
    }

    // ------------------------------------------------------------------
    // Basic operations
    // ------------------------------------------------------------------

    #[test]
    fn new_mempool_is_empty() {
        let pool = Mempool::new(100, 100_000);
        assert!(pool.is_empty());
        assert_eq!(pool.len(), 0);
        assert_eq!(pool.total_bytes(), 0);
        assert_eq!(pool.total_fees(), 0);
    }

    #[test]
    fn with_defaults_creates_pool() {
        let pool = Mempool::with_defaults();
        assert_eq!(pool.max_count(), DEFAULT_MAX_COUNT);
        assert_eq!(pool.max_bytes(), DEFAULT_MAX_BYTES);
        assert!(pool.is_empty());
    }

    #[test]
    fn insert_and_get() {
        let mut pool = Mempool::new(100, 100_000);
        let tx = make_tx(&[outpoint(1, 0)], 49 * COIN, 0);
        let fee = MIN_TX_FEE;

        let txid = pool.insert(tx.clone(), fee).unwrap();
        assert_eq!(txid, tx.txid());

        let entry = pool.get(&txid).unwrap();
        assert_eq!(entry.txid, txid);
        assert_eq!(entry.fee, fee);
        assert_eq!(entry.tx, tx);
        assert!(entry.size > 0);
    }

    #[test]
    fn insert_updates_counts() {
        let mut pool = Mempool::new(100, 100_000);
        let tx = make_tx(&[outpoint(1, 0)], 49 * COIN, 0);
        let size = tx.encode().len();

        pool.insert(tx, MIN_TX_FEE).unwrap();

        assert_eq!(pool.len(), 1);
        assert!(!pool.is_empty());
        assert_eq!(pool.total_bytes(), size);
        assert_eq!(pool.total_fees(), MIN_TX_FEE);
    }

    #[test]
    fn contains_after_insert() {
        let mut pool = Mempool::new(100, 100_000);
        let tx = make_tx(&[outpoint(1, 0)], 49 * COIN, 0);

        let txid = pool.insert(tx, MIN_TX_FEE).unwrap();
        assert!(pool.contains(&txid));
        assert!(!pool.contains(&Hash256::ZERO));
    }

    #[test]
    fn remove_returns_entry() {
        let mut pool = Mempool::new(100, 100_000);
        let tx = make_tx(&[outpoint(1, 0)], 49 * COIN, 0);
        let txid = pool.insert(tx.clone(), MIN_TX_FEE).unwrap();

        let entry = pool.remove(&txid).unwrap();
        assert_eq!(entry.txid, txid);
        assert_eq!(entry.tx, tx);
        assert!(pool.is_empty());
        assert_eq!(pool.total_bytes(), 0);
    }

    #[test]
    fn remove_unknown_returns_none() {
        let mut pool = Mempool::new(100, 100_000);
        assert!(pool.remove(&Hash256::ZERO).is_none());
    }

    #[test]
    fn remove_cleans_outpoint_index() {
        let mut pool = Mempool::new(100, 100_000);
        let op = outpoint(1, 0);
        let tx = make_tx(&[op.clone()], 49 * COIN, 0);
        let txid = pool.insert(tx, MIN_TX_FEE).unwrap();

        let replacement = make_tx(&[op.clone()], 48 * COIN, 1);
        assert!(pool.has_conflict(&replacement));

        pool.remove(&txid);

        assert!(!pool.has_conflict(&replacement));
    }

    #[test]
    fn txids_returns_all() {
        let mut pool = Mempool::new(100, 100_000);
        let txid1 = pool
            .insert(make_tx(&[outpoint(1, 0)], 49 * COIN, 0), MIN_TX_FEE)
            .unwrap();
        let txid2 = pool
            .insert(make_tx(&[outpoint(2, 0)], 48 * COIN, 0), 2 * MIN_TX_FEE)
            .unwrap();

        let mut txids = pool.txids();
        txids.sort();
        let mut expected = vec![txid1, txid2];
        expected.sort();
        assert_eq!(txids, expected);
    }

    #[test]
    fn iter_yields_all_entries() {
        let mut pool = Mempool::new(100, 100_000);
        pool.insert(make_tx(&[outpoint(1, 0)], 49 * COIN, 0), MIN_TX_FEE)
            .unwrap();
        pool.insert(make_tx(&[outpoint(2, 0)], 48 * COIN, 0), 2 * MIN_TX_FEE)
            .unwrap();

        let entries: Vec<_> = pool.iter().collect();
        assert_eq!(entries.len(), 2);
    }

    // ------------------------------------------------------------------
    // Duplicates
    // ------------------------------------------------------------------

    #[test]
    fn rejects_duplicate_txid() {
        let mut pool = Mempool::new(100, 100_000);
        let tx = make_tx(&[outpoint(1, 0)], 49 * COIN, 0);

        pool.insert(tx.clone(), MIN_TX_FEE).unwrap();
        let err = pool.insert(tx, MIN_TX_FEE).unwrap_err();
        assert!(matches!(err, MempoolError::AlreadyExists(_)));
    }

    // ------------------------------------------------------------------
    // Conflicts / replace-by-fee
    // ------------------------------------------------------------------

    #[test]
    fn rejects_conflicting_outpoint_without_sufficient_fee_bump() {
        let mut pool = Mempool::new(100, 100_000);
        let op = outpoint(1, 0);

        pool.insert(make_tx(&[op.clone()], 49 * COIN, 0), 10_000).unwrap();

        // Same fee, different tx spending the same outpoint: not a valid replacement.
        let tx2 = make_tx(&[op], 48 * COIN, 1);
        let err = pool.insert(tx2, 10_000).unwrap_err();
        assert!(matches!(err, MempoolError::ReplacementFeeRateTooLow { .. }));
    }

    #[test]
    fn replace_by_fee_evicts_conflicting_tx() {
        let mut pool = Mempool::new(100, 1_000_000);
        let op = outpoint(1, 0);

        let original_txid = pool
            .insert(make_tx(&[op.clone()], 49 * COIN, 0), 10_000)
            .unwrap();

        // Same inputs, pays much more both absolutely and per-byte.
        let replacement = make_tx(&[op], 48 * COIN, 1);
        let replacement_txid = pool.insert(replacement, 10_000_000).unwrap();

        assert!(!pool.contains(&original_txid));
        assert!(pool.contains(&replacement_txid));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn replace_by_fee_carries_descendants_of_conflict() {
        let mut pool = Mempool::new(100, 1_000_000);
        let parent_op = outpoint(1, 0);

        let parent_txid = pool
            .insert(make_tx(&[parent_op.clone()], 49 * COIN, 0), 10_000)
            .unwrap();
        let child_op = OutPoint { txid: parent_txid, index: 0 };
        pool.insert(make_tx(&[child_op], 40 * COIN, 0), 10_000).unwrap();
        assert_eq!(pool.len(), 2);

        // A replacement for the parent must also out-pay the evicted child.
        let replacement = make_tx(&[parent_op], 48 * COIN, 1);
        pool.insert(replacement, 10_000_000).unwrap();

        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn has_conflict_true() {
        let mut pool = Mempool::new(100, 100_000);
        let op = outpoint(1, 0);
        pool.insert(make_tx(&[op.clone()], 49 * COIN, 0), MIN_TX_FEE)
            .unwrap();

        let tx2 = make_tx(&[op], 48 * COIN, 1);
        assert!(pool.has_conflict(&tx2));
    }

    #[test]
    fn has_conflict_false() {
        let mut pool = Mempool::new(100, 100_000);
        pool.insert(make_tx(&[outpoint(1, 0)], 49 * COIN, 0), MIN_TX_FEE)
            .unwrap();

        let tx2 = make_tx(&[outpoint(2, 0)], 48 * COIN, 0);
        assert!(!pool.has_conflict(&tx2));
    }

    #[test]
    fn has_conflict_empty_pool() {
        let pool = Mempool::new(100, 100_000);
        let tx = make_tx(&[outpoint(1, 0)], 49 * COIN, 0);
        assert!(!pool.has_conflict(&tx));
    }

    #[test]
    fn conflicting_txids_deduplicates() {
        let mut pool = Mempool::new(100, 100_000);
        let op1 = outpoint(1, 0);
        let op2 = outpoint(1, 1);
        let txid = pool
            .insert(make_tx(&[op1.clone(), op2.clone()], 49 * COIN, 0), MIN_TX_FEE)
            .unwrap();

        let tx2 = make_tx(&[op1, op2], 48 * COIN, 1);
        let conflicts = pool.conflicting_txids(&tx2);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0], txid);
    }

    // ------------------------------------------------------------------
    // Ancestor / descendant limits
    // ------------------------------------------------------------------

    #[test]
    fn rejects_too_many_ancestors() {
        let mut pool = Mempool::new(1000, 10_000_000);
        let mut prev_txid = None;
        for i in 0..MAX_ANCESTORS {
            let op = match prev_txid {
                None => outpoint(1, 0),
                Some(txid) => OutPoint { txid, index: 0 },
            };
            let tx = make_tx(&[op], 1000, i as u32);
            prev_txid = Some(pool.insert(tx, 10_000).unwrap());
        }

        // One more on top of a full ancestor chain should be rejected.
        let op = OutPoint { txid: prev_txid.unwrap(), index: 0 };
        let tx = make_tx(&[op], 1000, 9999);
        let err = pool.insert(tx, 10_000).unwrap_err();
        assert!(matches!(err, MempoolError::TooManyAncestors { .. }));
    }

    #[test]
    fn rejects_too_many_descendants() {
        let mut pool = Mempool::new(1000, 10_000_000);
        let root_op = outpoint(1, 0);
        let root_txid = pool.insert(make_tx(&[root_op], 1_000_000, 0), 10_000).unwrap();

        for i in 0..MAX_DESCENDANTS {
            let op = OutPoint { txid: root_txid, index: 0 };
            let tx = make_tx(&[op], 1000, i as u32 + 1);
            let result = pool.insert(tx, 10_000);
            if i < MAX_DESCENDANTS {
                // Each child spends the root's single output, so only the
                // first successfully-inserted child can actually exist
                // in the UTXO sense; this test only checks that the
                // descendant-count error fires once the root is saturated.
                if result.is_err() {
                    assert!(matches!(
                        result.unwrap_err(),
                        MempoolError::TooManyDescendants { .. } | MempoolError::Conflict { .. }
                    ));
                    break;
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Size limits and eviction
    // ------------------------------------------------------------------

    #[test]
    fn respects_max_count() {
        let mut pool = Mempool::new(2, 1_000_000);

        pool.insert(make_tx(&[outpoint(1, 0)], 49 * COIN, 0), 1_000)
            .unwrap();
        pool.insert(make_tx(&[outpoint(2, 0)], 48 * COIN, 0), 2_000)
            .unwrap();
        assert_eq!(pool.len(), 2);

        pool.insert(make_tx(&[outpoint(3, 0)], 47 * COIN, 0), 100_000)
            .unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn evicts_lowest_fee_rate() {
        let mut pool = Mempool::new(2, 1_000_000);

        let txid_low = pool
            .insert(make_tx(&[outpoint(1, 0)], 49 * COIN, 0), 1_000)
            .unwrap();
        let txid_high = pool
            .insert(make_tx(&[outpoint(2, 0)], 48 * COIN, 0), 100_000)
            .unwrap();

        let txid_med = pool
            .insert(make_tx(&[outpoint(3, 0)], 47 * COIN, 0), 50_000)
            .unwrap();

        assert!(!pool.contains(&txid_low));
        assert!(pool.contains(&txid_high));
        assert!(pool.contains(&txid_med));
    }

    #[test]
    fn rejects_when_fee_too_low_for_eviction() {
        let mut pool = Mempool::new(2, 1_000_000);

        pool.insert(make_tx(&[outpoint(1, 0)], 49 * COIN, 0), 50_000)
            .unwrap();
        pool.insert(make_tx(&[outpoint(2, 0)], 48 * COIN, 0), 100_000)
            .unwrap();

        let err = pool
            .insert(make_tx(&[outpoint(3, 0)], 47 * COIN, 0), 1_000)
            .unwrap_err();
        assert!(matches!(err, MempoolError::PoolFull));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn respects_max_bytes() {
        let tx = make_tx(&[outpoint(1, 0)], 49 * COIN, 0);
        let size = tx.encode().len();
        let mut pool = Mempool::new(100, size);

        pool.insert(tx, MIN_TX_FEE).unwrap();
        assert_eq!(pool.len(), 1);

        pool.insert(make_tx(&[outpoint(2, 0)], 48 * COIN, 0), 100_000)
            .unwrap();
        assert_eq!(pool.len(), 1);
    }

    // ------------------------------------------------------------------
    // Fee rate computation
    // ------------------------------------------------------------------

    #[test]
    fn fee_rate_accessor() {
        let mut pool = Mempool::new(100, 100_000);
        let tx = make_tx(&[outpoint(1, 0)], 49 * COIN, 0);
        let fee = 1_000;

        let txid = pool.insert(tx, fee).unwrap();
        let entry = pool.get(&txid).unwrap();

        let expected_rate = compute_fee_rate(fee, entry.size);
        assert_eq!(entry.fee_rate(), expected_rate);
        assert!(entry.fee_rate() > 0);
        // No ancestors: ancestor fee rate equals the solo fee rate.
        assert_eq!(entry.ancestor_fee_rate(), expected_rate);
    }

    #[test]
    fn fee_rate_zero_fee() {
        assert_eq!(compute_fee_rate(0, 100), 0);
    }

    #[test]
    fn fee_rate_zero_size() {
        assert_eq!(compute_fee_rate(1000, 0), u64::MAX);
    }

    #[test]
    fn fee_rate_precision() {
        assert_eq!(compute_fee_rate(999, 1000), 999);
    }

    // ------------------------------------------------------------------
    // select_transactions
    // ------------------------------------------------------------------

    #[test]
    fn select_empty_pool() {
        let pool = Mempool::new(100, 100_000);
        assert!(pool.select_transactions(100_000).is_empty());
    }

    #[test]
    fn select_returns_highest_fee_rate_first() {
        let mut pool = Mempool::new(100, 1_000_000);

        let txid_low = pool
            .insert(make_tx(&[outpoint(1, 0)], 49 * COIN, 0), 1_000)
            .unwrap();
        let txid_high = pool
            .insert(make_tx(&[outpoint(2, 0)], 48 * COIN, 0), 100_000)
            .unwrap();
        let txid_med = pool
            .insert(make_tx(&[outpoint(3, 0)], 47 * COIN, 0), 50_000)
            .unwrap();

        let selected = pool.select_transactions(1_000_000);
        assert_eq!(selected.len(), 3);
        assert_eq!(selected[0].txid, txid_high);
        assert_eq!(selected[1].txid, txid_med);
        assert_eq!(selected[2].txid, txid_low);
    }

    #[test]
    fn select_respects_size_budget() {
        let mut pool = Mempool::new(100, 1_000_000);

        let tx1 = make_tx(&[outpoint(1, 0)], 49 * COIN, 0);
        let size1 = tx1.encode().len();
        pool.insert(tx1, 100_000).unwrap();
        pool.insert(make_tx(&[outpoint(2, 0)], 48 * COIN, 0), 50_000)
            .unwrap();

        let selected = pool.select_transactions(size1);
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn select_zero_budget() {
        let mut pool = Mempool::new(100, 100_000);
        pool.insert(make_tx(&[outpoint(1, 0)], 49 * COIN, 0), MIN_TX_FEE)
            .unwrap();

        assert!(pool.select_transactions(0).is_empty());
    }

    #[test]
    fn select_drags_in_unselected_ancestor_as_a_package() {
        // A cheap parent and a high-fee child (CPFP): the child's ancestor
        // fee rate already reflects the combined package, so it sorts
        // before the parent. Selection must pull the parent in alongside
        // it rather than dropping the child.
        let mut pool = Mempool::new(100, 1_000_000);
        let parent_op = outpoint(1, 0);
        let parent_tx = make_tx(&[parent_op], 49 * COIN, 0);
        let parent_txid = pool.insert(parent_tx, 1_000).unwrap();

        let child_op = OutPoint { txid: parent_txid, index: 0 };
        let child_tx = make_tx(&[child_op], 40 * COIN, 0);
        let child_txid = pool.insert(child_tx, 100_000).unwrap();

        let selected = pool.select_transactions(1_000_000);
        let order: Vec<Hash256> = selected.iter().map(|e| e.txid).collect();
        assert!(order.contains(&parent_txid));
        assert!(order.contains(&child_txid));
        let parent_pos = order.iter().position(|t| *t == parent_txid).unwrap();
        let child_pos = order.iter().position(|t| *t == child_txid).unwrap();
        assert!(parent_pos < child_pos, "parent must be selected before its child");
    }

    #[test]
    fn select_drops_whole_package_when_it_does_not_fit_budget() {
        // Same cheap-parent/expensive-child pair, but a budget too small
        // for the combined package must drop both, not admit the child alone.
        let mut pool = Mempool::new(100, 1_000_000);
        let parent_op = outpoint(1, 0);
        let parent_tx = make_tx(&[parent_op], 49 * COIN, 0);
        let parent_size = parent_tx.encode().len();
        let parent_txid = pool.insert(parent_tx, 1_000).unwrap();

        let child_op = OutPoint { txid: parent_txid, index: 0 };
        let child_tx = make_tx(&[child_op], 40 * COIN, 0);
        let child_size = child_tx.encode().len();
        let child_txid = pool.insert(child_tx, 100_000).unwrap();

        let budget = parent_size + child_size - 1;
        let selected = pool.select_transactions(budget);
        assert!(selected.iter().all(|e| e.txid != parent_txid && e.txid != child_txid));
    }

    // ------------------------------------------------------------------
    // fee_estimate
    // ------------------------------------------------------------------

    #[test]
    fn fee_estimate_empty_pool_is_none() {
        let pool = Mempool::new(100, 100_000);
        assert!(pool.fee_estimate(1).is_none());
    }

    #[test]
    fn fee_estimate_nonempty_pool_is_some() {
        let mut pool = Mempool::new(100, 100_000);
        pool.insert(make_tx(&[outpoint(1, 0)], 49 * COIN, 0), 10_000)
            .unwrap();
        assert!(pool.fee_estimate(1).is_some());
        assert!(pool.fee_estimate(6).is_some());
        assert!(pool.fee_estimate(100).is_some());
    }

    #[test]
    fn fee_estimate_higher_target_is_not_higher_rate() {
        let mut pool = Mempool::new(100, 1_000_000);
        for i in 0..10u8 {
            pool.insert(make_tx(&[outpoint(i, 0)], 10 * COIN, 0), 1_000 * (i as u64 + 1))
                .unwrap();
        }
        // A 1-block estimate (90th percentile) should never be cheaper than
        // a 6+ block estimate (50th/25th percentile) in a static pool.
        let fast = pool.fee_estimate(1).unwrap();
        let slow = pool.fee_estimate(100).unwrap();
        assert!(fast >= slow);
    }

    // ------------------------------------------------------------------
    // expire
    // ------------------------------------------------------------------

    #[test]
    fn expire_keeps_fresh_entries() {
        let mut pool = Mempool::new(100, 100_000);
        pool.insert(make_tx(&[outpoint(1, 0)], 49 * COIN, 0), MIN_TX_FEE)
            .unwrap();
        let removed = pool.expire();
        assert!(removed.is_empty());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn expire_removes_stale_entries() {
        let mut pool = Mempool::new(100, 100_000).with_max_age_secs(0);
        let txid = pool
            .insert(make_tx(&[outpoint(1, 0)], 49 * COIN, 0), MIN_TX_FEE)
            .unwrap();
        let removed = pool.expire();
        assert!(removed.contains(&txid));
        assert!(pool.is_empty());
    }

    // ------------------------------------------------------------------
    // remove_confirmed_block
    // ------------------------------------------------------------------

    #[test]
    fn remove_confirmed_removes_block_txids() {
        let mut pool = Mempool::new(100, 100_000);
        let tx = make_tx(&[outpoint(1, 0)], 49 * COIN, 0);
        let txid = pool.insert(tx.clone(), MIN_TX_FEE).unwrap();

        let txid_other = pool
            .insert(make_tx(&[outpoint(2, 0)], 48 * COIN, 0), MIN_TX_FEE)
            .unwrap();

        let block = make_block(vec![make_coinbase(), tx]);

        pool.remove_confirmed_block(&block);

        assert!(!pool.contains(&txid));
        assert!(pool.contains(&txid_other));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn remove_confirmed_removes_conflicting_txs() {
        let mut pool = Mempool::new(100, 100_000);
        let op = outpoint(1, 0);
        let pool_txid = pool
            .insert(make_tx(&[op.clone()], 49 * COIN, 0), MIN_TX_FEE)
            .unwrap();

        let block_tx = make_tx(&[op], 48 * COIN, 99);
        let block = make_block(vec![make_coinbase(), block_tx]);

        pool.remove_confirmed_block(&block);

        assert!(!pool.contains(&pool_txid));
        assert!(pool.is_empty());
    }

    #[test]
    fn remove_confirmed_unrelated_survives() {
        let mut pool = Mempool::new(100, 100_000);
        let txid_survivor = pool
            .insert(make_tx(&[outpoint(99, 0)], 49 * COIN, 0), MIN_TX_FEE)
            .unwrap();

        let block = make_block(vec![make_coinbase()]);

        pool.remove_confirmed_block(&block);
        assert!(pool.contains(&txid_survivor));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn remove_confirmed_empty_pool_noop() {
        let mut pool = Mempool::new(100, 100_000);
        let block = make_block(vec![make_coinbase()]);

        pool.remove_confirmed_block(&block);
        assert!(pool.is_empty());
    }

    #[test]
    fn remove_confirmed_carries_in_pool_child_away_with_conflicted_parent() {
        let mut pool = Mempool::new(100, 100_000);
        let parent_op = outpoint(1, 0);
        let parent_tx = make_tx(&[parent_op.clone()], 49 * COIN, 0);
        let parent_txid = pool.insert(parent_tx, MIN_TX_FEE).unwrap();

        let child_op = OutPoint { txid: parent_txid, index: 0 };
        let child_txid = pool.insert(make_tx(&[child_op], 40 * COIN, 0), MIN_TX_FEE).unwrap();

        // A different transaction confirms, spending the same parent outpoint.
        let block_tx = make_tx(&[parent_op], 48 * COIN, 99);
        let block = make_block(vec![make_coinbase(), block_tx]);

        pool.remove_confirmed_block(&block);

        assert!(!pool.contains(&parent_txid));
        assert!(!pool.contains(&child_txid));
    }

    // ------------------------------------------------------------------
    // Total fees
    // ------------------------------------------------------------------

    #[test]
    fn total_fees_sums_correctly() {
        let mut pool = Mempool::new(100, 100_000);
        pool.insert(make_tx(&[outpoint(1, 0)], 49 * COIN, 0), 1_000)
            .unwrap();
        pool.insert(make_tx(&[outpoint(2, 0)], 48 * COIN, 0), 2_000)
            .unwrap();

        assert_eq!(pool.total_fees(), 3_000);
    }

    #[test]
    fn total_fees_after_remove() {
        let mut pool = Mempool::new(100, 100_000);
        let txid = pool
            .insert(make_tx(&[outpoint(1, 0)], 49 * COIN, 0), 1_000)
            .unwrap();
        pool.insert(make_tx(&[outpoint(2, 0)], 48 * COIN, 0), 2_000)
            .unwrap();

        pool.remove(&txid);
        assert_eq!(pool.total_fees(), 2_000);
    }

    // ------------------------------------------------------------------
    // Total bytes tracking
    // ------------------------------------------------------------------

    #[test]
    fn total_bytes_tracks_insert_remove() {
        let mut pool = Mempool::new(100, 100_000);
        let tx = make_tx(&[outpoint(1, 0)], 49 * COIN, 0);
        let size = tx.encode().len();

        let txid = pool.insert(tx, MIN_TX_FEE).unwrap();
        assert_eq!(pool.total_bytes(), size);

        pool.remove(&txid);
        assert_eq!(pool.total_bytes(), 0);
    }

    #[test]
    fn total_bytes_multi() {
        let mut pool = Mempool::new(100, 100_000);
        let tx1 = make_tx(&[outpoint(1, 0)], 49 * COIN, 0);
        let tx2 = make_tx(&[outpoint(2, 0)], 48 * COIN, 0);
        let s1 = tx1.encode().len();
        let s2 = tx2.encode().len();

        pool.insert(tx1, MIN_TX_FEE).unwrap();
        pool.insert(tx2, MIN_TX_FEE).unwrap();
        assert_eq!(pool.total_bytes(), s1 + s2);
    }

    // ------------------------------------------------------------------
    // Error display
    // ------------------------------------------------------------------

    #[test]
    fn error_variants_display() {
        let errors: Vec<MempoolError> = vec![
            MempoolError::AlreadyExists("abc".into()),
            MempoolError::Conflict {
                new_txid: "new".into(),
                existing_txid: "old".into(),
                outpoint: "op:0".into(),
            },
            MempoolError::PoolFull,
            MempoolError::FeeTooLow { got: 100, min: 1000 },
            MempoolError::ReplacementFeeRateTooLow { got: 1, min: 2 },
            MempoolError::ReplacementFeeTooLow { got: 1, min: 2 },
            MempoolError::InsufficientReplacementFee { needed: 10, paid: 5 },
            MempoolError::TooManyAncestors { count: 30, max: 25 },
            MempoolError::TooManyDescendants { count: 30, max: 25 },
            MempoolError::UnknownTransaction("abc".into()),
            MempoolError::Internal("oops".into()),
        ];
        for e in &errors {
            assert!(!format!("{e}").is_empty());
        }
    }

    // ------------------------------------------------------------------
    // MempoolEntry
    // ------------------------------------------------------------------

    #[test]
    fn entry_clone() {
        let mut pool = Mempool::new(100, 100_000);
        let txid = pool
            .insert(make_tx(&[outpoint(1, 0)], 49 * COIN, 0), MIN_TX_FEE)
            .unwrap();
        let entry = pool.get(&txid).unwrap();
        let cloned = entry.clone();
        assert_eq!(cloned.txid, entry.txid);
        assert_eq!(cloned.fee, entry.fee);
    }

    #[test]
    fn entry_debug() {
        let mut pool = Mempool::new(100, 100_000);
        let txid = pool
            .insert(make_tx(&[outpoint(1, 0)], 49 * COIN, 0), MIN_TX_FEE)
            .unwrap();
        let entry = pool.get(&txid).unwrap();
        let debug = format!("{entry:?}");
        assert!(debug.contains("fee"));
    }

    // ------------------------------------------------------------------
    // Min fee-rate enforcement (§4.6 admission step 2 / S5)
    // ------------------------------------------------------------------

    #[test]
    fn rejects_zero_fee() {
        let mut pool = Mempool::new(100, 100_000);
        let tx = make_tx(&[outpoint(1, 0)], 49 * COIN, 0);
        let err = pool.insert(tx, 0).unwrap_err();
        assert!(matches!(err, MempoolError::FeeRateTooLow { got: 0, .. }));
    }

    #[test]
    fn rejects_fee_rate_below_configured_minimum() {
        // S5: min_fee_rate = 10 sat/byte; a tx paying 9 sat/byte is rejected.
        let mut pool = Mempool::new(100, 100_000).with_min_fee_rate(10);
        let tx = make_tx(&[outpoint(1, 0)], 49 * COIN, 0);
        let size = tx.encode().len() as u64;
        let fee = 9 * size;
        let err = pool.insert(tx, fee).unwrap_err();
        assert!(matches!(err, MempoolError::FeeRateTooLow { .. }));
    }

    #[test]
    fn accepts_fee_rate_at_configured_minimum() {
        // S5: a tx at exactly 10 sat/byte (with all outputs above dust) is accepted.
        let mut pool = Mempool::new(100, 100_000).with_min_fee_rate(10);
        let tx = make_tx(&[outpoint(1, 0)], 49 * COIN, 0);
        let size = tx.encode().len() as u64;
        let fee = 10 * size;
        assert!(pool.insert(tx, fee).is_ok());
    }

    #[test]
    fn accepts_fee_rate_above_configured_minimum() {
        let mut pool = Mempool::new(100, 100_000).with_min_fee_rate(10);
        let tx = make_tx(&[outpoint(1, 0)], 49 * COIN, 0);
        let size = tx.encode().len() as u64;
        let fee = 50 * size;
        assert!(pool.insert(tx, fee).is_ok());
    }

    #[test]
    fn rejects_dust_output() {
        let mut pool = Mempool::with_defaults();
        let tx = make_tx(&[outpoint(1, 0)], DUST_THRESHOLD - 1, 0);
        let err = pool.insert(tx, MIN_TX_FEE).unwrap_err();
        assert!(matches!(err, MempoolError::DustOutput { index: 0, .. }));
    }

    #[test]
    fn accepts_output_at_dust_threshold() {
        let mut pool = Mempool::with_defaults();
        let tx = make_tx(&[outpoint(1, 0)], DUST_THRESHOLD, 0);
        assert!(pool.insert(tx, MIN_TX_FEE).is_ok());
    }

    // ------------------------------------------------------------------
    // Multiple outpoints per tx
    // ------------------------------------------------------------------

    #[test]
    fn multi_input_tx_tracks_all_outpoints() {
        let mut pool = Mempool::new(100, 100_000);
        let op1 = outpoint(1, 0);
        let op2 = outpoint(2, 0);
        pool.insert(make_tx(&[op1.clone(), op2.clone()], 49 * COIN, 0), MIN_TX_FEE)
            .unwrap();

        assert!(pool.has_conflict(&make_tx(&[op1], 40 * COIN, 1)));
        assert!(pool.has_conflict(&make_tx(&[op2], 40 * COIN, 2)));
    }

    #[test]
    fn multi_input_tx_removal_frees_all_outpoints() {
        let mut pool = Mempool::new(100, 100_000);
        let op1 = outpoint(1, 0);
        let op2 = outpoint(2, 0);
        let txid = pool
            .insert(make_tx(&[op1.clone(), op2.clone()], 49 * COIN, 0), MIN_TX_FEE)
            .unwrap();

        pool.remove(&txid);

        assert!(!pool.has_conflict(&make_tx(&[op1], 40 * COIN, 1)));
        assert!(!pool.has_conflict(&make_tx(&[op2], 40 * COIN, 2)));
    }
}
