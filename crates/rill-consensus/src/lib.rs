//! # rill-consensus — Block production, validation, and proof-of-work.
//!
//! This crate implements the [`BlockProducer`](rill_core::traits::BlockProducer)
//! trait, wiring together rill-core's validation, difficulty adjustment, and
//! reward modules with chain state, using SHA-256 double-hash proof-of-work.

pub mod engine;

pub use engine::{mine_block, ConsensusEngine};
