//! Criterion benchmarks for rill-consensus critical operations.
//!
//! Covers: block validation and difficulty adjustment.

use std::collections::HashMap;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rill_core::constants::{BLOCK_TIME_SECS, COIN};
use rill_core::error::{RillError, TransactionError};
use rill_core::script::p2pkh_locking_script;
use rill_core::traits::{BlockProducer, ChainState};
use rill_core::types::{
    Block, BlockHeader, Hash160, Hash256, OutPoint, Transaction, TxInput, TxOutput, UtxoEntry,
};
use rill_core::{genesis, merkle, reward};

use rill_consensus::engine::{mine_block, ConsensusEngine};

const EASY_BITS: u32 = 0x207fffff;

fn pkh() -> Hash160 {
    Hash160([0xAA; 20])
}

// --- Mock ChainState ---

struct MockChainState {
    headers: Vec<BlockHeader>,
    blocks: Vec<Block>,
    hashes: Vec<Hash256>,
    utxos: HashMap<OutPoint, UtxoEntry>,
    supply: u64,
}

impl MockChainState {
    fn with_genesis() -> Self {
        let genesis = genesis::genesis_block(&pkh());
        let hash = genesis.header.hash();
        Self {
            headers: vec![genesis.header.clone()],
            blocks: vec![genesis],
            hashes: vec![hash],
            utxos: HashMap::new(),
            supply: 1_000_000 * COIN,
        }
    }

    fn add_block(&mut self, timestamp: u32, bits: u32) {
        let prev_hash = *self.hashes.last().unwrap();
        let height = self.headers.len() as u64;
        let mut signature_script = height.to_le_bytes().to_vec();
        signature_script.extend_from_slice(&0u64.to_le_bytes());
        let coinbase = Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutPoint::null(),
                signature_script,
                sequence: 0xFFFF_FFFF,
            }],
            outputs: vec![TxOutput {
                value: reward::block_reward(height) as i64,
                locking_script: p2pkh_locking_script(&pkh()),
            }],
            lock_time: height as u32,
        };
        let txid = coinbase.txid();
        let mr = merkle::merkle_root(&[txid]);
        let header = BlockHeader {
            version: 1,
            prev_hash,
            merkle_root: mr,
            timestamp,
            bits,
            nonce: 0,
        };
        let hash = header.hash();
        let block = Block {
            header: header.clone(),
            transactions: vec![coinbase],
        };
        self.headers.push(header);
        self.blocks.push(block);
        self.hashes.push(hash);
    }

    fn tip_height(&self) -> u64 {
        self.headers.len() as u64 - 1
    }

    fn tip_hash(&self) -> Hash256 {
        *self.hashes.last().unwrap()
    }
}

impl ChainState for MockChainState {
    fn get_utxo(&self, outpoint: &OutPoint) -> Result<Option<UtxoEntry>, RillError> {
        Ok(self.utxos.get(outpoint).cloned())
    }

    fn chain_tip(&self) -> Result<(u64, Hash256), RillError> {
        Ok((self.tip_height(), self.tip_hash()))
    }

    fn get_block_header(&self, hash: &Hash256) -> Result<Option<BlockHeader>, RillError> {
        Ok(self
            .hashes
            .iter()
            .position(|h| h == hash)
            .map(|i| self.headers[i].clone()))
    }

    fn get_block(&self, hash: &Hash256) -> Result<Option<Block>, RillError> {
        Ok(self
            .hashes
            .iter()
            .position(|h| h == hash)
            .map(|i| self.blocks[i].clone()))
    }

    fn get_block_hash(&self, height: u64) -> Result<Option<Hash256>, RillError> {
        Ok(self.hashes.get(height as usize).copied())
    }

    fn circulating_supply(&self) -> Result<u64, RillError> {
        Ok(self.supply)
    }

    fn validate_transaction(&self, tx: &Transaction) -> Result<(), TransactionError> {
        if tx.inputs.is_empty() || tx.outputs.is_empty() {
            return Err(TransactionError::EmptyInputsOrOutputs);
        }
        Ok(())
    }
}

fn make_engine_and_block() -> (ConsensusEngine, Block) {
    let cs = MockChainState::with_genesis();
    let tip_ts = cs.headers.last().unwrap().timestamp as u64;
    let current_time = tip_ts + BLOCK_TIME_SECS;

    let engine = ConsensusEngine::with_clock(Arc::new(cs), move || current_time)
        .with_bits_override(EASY_BITS);

    let mut block = engine
        .create_block_template(&pkh(), current_time)
        .unwrap();
    mine_block(&mut block, u32::MAX);

    (engine, block)
}

fn bench_block_validation(c: &mut Criterion) {
    let (engine, block) = make_engine_and_block();

    c.bench_function("block_validation", |b| {
        b.iter(|| engine.validate_block(black_box(&block)))
    });
}

fn bench_difficulty_adjustment(c: &mut Criterion) {
    // Build a chain with 65 blocks so the retargeting window is fully populated.
    let mut cs = MockChainState::with_genesis();
    let base_ts = genesis::GENESIS_TIMESTAMP;
    for i in 1..=65 {
        cs.add_block(base_ts + i * BLOCK_TIME_SECS as u32, EASY_BITS);
    }

    let tip_ts = cs.headers.last().unwrap().timestamp as u64;
    let current_time = tip_ts + BLOCK_TIME_SECS;
    let engine = ConsensusEngine::with_clock(Arc::new(cs), move || current_time)
        .with_bits_override(EASY_BITS);

    let next_height = 66u64;

    c.bench_function("difficulty_adjustment", |b| {
        b.iter(|| engine.expected_bits(black_box(next_height)))
    });
}

criterion_group!(benches, bench_block_validation, bench_difficulty_adjustment);
criterion_main!(benches);
