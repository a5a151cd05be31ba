//! Adversarial security test suite for RillCoin.
//!
//! This crate contains integration tests that attempt to break the protocol
//! from an attacker's perspective. All consensus-critical invariants are
//! verified under adversarial inputs.

pub mod helpers;
