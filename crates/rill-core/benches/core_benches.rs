//! Criterion benchmarks for rill-core critical operations.
//!
//! Covers: Merkle tree construction, SHA-256 block hashing,
//! secp256k1 sign/verify, and transaction serialization.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sha2::{Digest, Sha256};

use rill_core::crypto::{verify_signature, KeyPair};
use rill_core::merkle::merkle_root;
use rill_core::types::{
    BlockHeader, Hash256, OutPoint, Transaction, TxInput, TxOutput,
};

/// Generate `n` deterministic 32-byte hashes for Merkle benchmarks.
fn make_txids(n: usize) -> Vec<Hash256> {
    (0..n)
        .map(|i| {
            let digest = Sha256::digest((i as u64).to_le_bytes());
            Hash256(digest.into())
        })
        .collect()
}

fn sample_block_header() -> BlockHeader {
    BlockHeader {
        version: 1,
        prev_hash: Hash256([0xAA; 32]),
        merkle_root: Hash256([0xBB; 32]),
        timestamp: 1_700_000_000,
        bits: 0x1d00ffff,
        nonce: 42,
    }
}

fn sample_transaction() -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxInput {
            previous_output: OutPoint {
                txid: Hash256([0x11; 32]),
                index: 0,
            },
            signature_script: vec![0u8; 64],
            sequence: 0xFFFF_FFFF,
        }],
        outputs: vec![
            TxOutput {
                value: 50 * 100_000_000,
                locking_script: vec![0u8; 25],
            },
            TxOutput {
                value: 25 * 100_000_000,
                locking_script: vec![0u8; 25],
            },
        ],
        lock_time: 0,
    }
}

fn bench_merkle_root(c: &mut Criterion) {
    let txids_10 = make_txids(10);
    let txids_1000 = make_txids(1000);

    c.bench_function("merkle_root_10_txids", |b| {
        b.iter(|| merkle_root(black_box(&txids_10)))
    });

    c.bench_function("merkle_root_1000_txids", |b| {
        b.iter(|| merkle_root(black_box(&txids_1000)))
    });
}

fn bench_sha256_block_hash(c: &mut Criterion) {
    let header = sample_block_header();

    c.bench_function("sha256_block_hash", |b| {
        b.iter(|| black_box(&header).hash())
    });
}

fn bench_secp256k1(c: &mut Criterion) {
    let keypair = KeyPair::from_secret_bytes(&[42u8; 32]).expect("valid secret key");
    let digest = Hash256(Sha256::digest(b"bench message").into());
    let signature = keypair.sign_digest(&digest, 0x01);
    let pubkey_bytes = keypair.public_key_bytes();

    c.bench_function("secp256k1_sign", |b| {
        b.iter(|| keypair.sign_digest(black_box(&digest), 0x01))
    });

    c.bench_function("secp256k1_verify", |b| {
        b.iter(|| verify_signature(black_box(&pubkey_bytes), black_box(&digest), black_box(&signature)))
    });
}

fn bench_transaction_serde(c: &mut Criterion) {
    let tx = sample_transaction();
    let encoded =
        bincode::encode_to_vec(&tx, bincode::config::standard()).expect("encode failed");

    c.bench_function("transaction_serialization", |b| {
        b.iter(|| bincode::encode_to_vec(black_box(&tx), bincode::config::standard()))
    });

    c.bench_function("transaction_deserialization", |b| {
        b.iter(|| {
            let (decoded, _): (Transaction, usize) =
                bincode::decode_from_slice(black_box(&encoded), bincode::config::standard())
                    .expect("decode failed");
            decoded
        })
    });
}

criterion_group!(
    benches,
    bench_merkle_root,
    bench_sha256_block_hash,
    bench_secp256k1,
    bench_transaction_serde,
);
criterion_main!(benches);
