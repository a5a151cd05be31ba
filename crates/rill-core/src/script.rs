//! Pay-to-pubkey-hash locking and unlocking scripts.
//!
//! Scripts are opaque byte strings to every layer except verification:
//! `validate_transaction` in [`crate::validation`] is the only place that
//! interprets them. This module defines the one script template the node
//! understands — P2PKH — as plain byte constants rather than a general
//! opcode interpreter, since that's the whole of what's supported.

use crate::types::Hash160;

pub const OP_DUP: u8 = 0x76;
pub const OP_HASH160: u8 = 0xA9;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_CHECKSIG: u8 = 0xAC;

/// Hash-type byte appended to a DER-less signature inside an unlocking script.
pub mod sighash_type {
    pub const ALL: u8 = 0x01;
    pub const NONE: u8 = 0x02;
    pub const SINGLE: u8 = 0x03;
    pub const ANYONECANPAY: u8 = 0x80;
}

/// Build a standard locking script: `OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG`.
pub fn p2pkh_locking_script(pubkey_hash: &Hash160) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.push(OP_DUP);
    script.push(OP_HASH160);
    script.push(20);
    script.extend_from_slice(pubkey_hash.as_bytes());
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

/// Build an unlocking script: `<sig || hash_type> <pubkey>`.
pub fn p2pkh_unlocking_script(signature_with_hash_type: &[u8], pubkey: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(1 + signature_with_hash_type.len() + 1 + pubkey.len());
    script.push(signature_with_hash_type.len() as u8);
    script.extend_from_slice(signature_with_hash_type);
    script.push(pubkey.len() as u8);
    script.extend_from_slice(pubkey);
    script
}

/// Recognize a P2PKH locking script and extract the embedded hash.
pub fn match_p2pkh(locking_script: &[u8]) -> Option<Hash160> {
    if locking_script.len() != 25 {
        return None;
    }
    if locking_script[0] != OP_DUP
        || locking_script[1] != OP_HASH160
        || locking_script[2] != 20
        || locking_script[23] != OP_EQUALVERIFY
        || locking_script[24] != OP_CHECKSIG
    {
        return None;
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&locking_script[3..23]);
    Some(Hash160(hash))
}

/// Parse `<sig || hash_type> <pubkey>` out of an unlocking script.
///
/// Returns `(signature, hash_type, pubkey)`.
pub fn parse_p2pkh_unlock(unlocking_script: &[u8]) -> Option<(&[u8], u8, &[u8])> {
    let sig_len = *unlocking_script.first()? as usize;
    let rest = unlocking_script.get(1..)?;
    let sig_with_type = rest.get(..sig_len)?;
    let (sig, hash_type) = sig_with_type.split_last()?;
    let after_sig = rest.get(sig_len..)?;
    let pk_len = *after_sig.first()? as usize;
    let pubkey = after_sig.get(1..1 + pk_len)?;
    Some((sig, *hash_type, pubkey))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locking_script_round_trips_through_match() {
        let hash = Hash160([0x42; 20]);
        let script = p2pkh_locking_script(&hash);
        assert_eq!(script.len(), 25);
        assert_eq!(match_p2pkh(&script), Some(hash));
    }

    #[test]
    fn match_rejects_wrong_length() {
        assert_eq!(match_p2pkh(&[OP_DUP, OP_HASH160]), None);
    }

    #[test]
    fn match_rejects_wrong_opcodes() {
        let mut script = p2pkh_locking_script(&Hash160([0; 20]));
        script[0] = 0xFF;
        assert_eq!(match_p2pkh(&script), None);
    }

    #[test]
    fn unlocking_script_round_trips_through_parse() {
        let sig = vec![0x11; 64];
        let mut sig_with_type = sig.clone();
        sig_with_type.push(sighash_type::ALL);
        let pubkey = vec![0x02; 33];
        let script = p2pkh_unlocking_script(&sig_with_type, &pubkey);

        let (parsed_sig, hash_type, parsed_pubkey) = parse_p2pkh_unlock(&script).unwrap();
        assert_eq!(parsed_sig, sig.as_slice());
        assert_eq!(hash_type, sighash_type::ALL);
        assert_eq!(parsed_pubkey, pubkey.as_slice());
    }
}
