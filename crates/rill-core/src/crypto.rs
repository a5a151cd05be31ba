//! secp256k1 ECDSA signing/verification and the transaction SIGHASH.
//!
//! Keys are secp256k1 keypairs. The pubkey hash used in P2PKH locking
//! scripts is [`Hash160`]: `RIPEMD160(SHA256(compressed_pubkey))`. Signing
//! a transaction input commits to a digest computed per the SIGHASH
//! algorithm below, not to the raw transaction bytes.

use rand::rngs::OsRng;
use ripemd160::{Digest as RipemdDigest, Ripemd160};
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey as SecpPublicKey, Secp256k1, SecretKey};
use sha2::{Digest as Sha2Digest, Sha256};

use crate::error::CryptoError;
use crate::script::{self, sighash_type};
use crate::types::{Hash160, Hash256, Transaction, TxOutput};

/// HASH160: RIPEMD160(SHA256(data)).
pub fn hash160(data: &[u8]) -> Hash160 {
    let sha = Sha256::digest(data);
    let ripemd = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripemd);
    Hash160(out)
}

/// A secp256k1 keypair, serialized and signed with a compressed public key.
pub struct KeyPair {
    secret: SecretKey,
    public: SecpPublicKey,
}

impl KeyPair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret, public) = secp.generate_keypair(&mut OsRng);
        Self { secret, public }
    }

    /// Reconstruct a keypair from a 32-byte secret key.
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let secret = SecretKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        let secp = Secp256k1::new();
        let public = SecpPublicKey::from_secret_key(&secp, &secret);
        Ok(Self { secret, public })
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.secret_bytes()
    }

    /// Compressed (33-byte) public key encoding.
    pub fn public_key_bytes(&self) -> [u8; 33] {
        self.public.serialize()
    }

    pub fn pubkey_hash(&self) -> Hash160 {
        hash160(&self.public_key_bytes())
    }

    /// Sign `digest` (already hashed), returning a DER-less compact
    /// signature with `hash_type` appended as the final byte.
    pub fn sign_digest(&self, digest: &Hash256, hash_type: u8) -> Vec<u8> {
        let secp = Secp256k1::signing_only();
        let message = Message::from_digest(*digest.as_bytes());
        let sig = secp.sign_ecdsa(&message, &self.secret);
        let mut out = sig.serialize_compact().to_vec();
        out.push(hash_type);
        out
    }
}

/// Verify a compact (64-byte) secp256k1 signature against a digest.
pub fn verify_signature(pubkey_bytes: &[u8], digest: &Hash256, signature: &[u8]) -> bool {
    let Ok(pubkey) = SecpPublicKey::from_slice(pubkey_bytes) else {
        return false;
    };
    let Ok(sig) = Signature::from_compact(signature) else {
        return false;
    };
    let secp = Secp256k1::verification_only();
    let message = Message::from_digest(*digest.as_bytes());
    secp.verify_ecdsa(&message, &sig, &pubkey).is_ok()
}

/// Compute the SIGHASH digest for input `input_index` of `tx`.
///
/// Deep-copies the transaction, clears every input's signature script,
/// sets the input under signature's script to the spent output's locking
/// script, applies the hash-type's input/output pruning, serializes the
/// result with the hash type appended as a 4-byte little-endian trailer,
/// and double-SHA256s it.
pub fn sighash(
    tx: &Transaction,
    input_index: usize,
    prev_output: &TxOutput,
    hash_type: u8,
) -> Result<Hash256, CryptoError> {
    if input_index >= tx.inputs.len() {
        return Err(CryptoError::InputIndexOutOfBounds {
            index: input_index,
            len: tx.inputs.len(),
        });
    }

    let base_type = hash_type & !sighash_type::ANYONECANPAY;
    if base_type != sighash_type::ALL
        && base_type != sighash_type::NONE
        && base_type != sighash_type::SINGLE
    {
        return Err(CryptoError::UnknownSighashType(hash_type));
    }

    let mut copy = tx.clone();
    for input in &mut copy.inputs {
        input.signature_script.clear();
    }
    copy.inputs[input_index].signature_script = prev_output.locking_script.clone();

    if hash_type & sighash_type::ANYONECANPAY != 0 {
        let signed_input = copy.inputs[input_index].clone();
        copy.inputs = vec![signed_input];
    }

    match base_type {
        sighash_type::NONE => {
            copy.outputs.clear();
            for (i, input) in copy.inputs.iter_mut().enumerate() {
                if hash_type & sighash_type::ANYONECANPAY == 0 && i != input_index {
                    input.sequence = 0;
                }
            }
        }
        sighash_type::SINGLE => {
            if input_index >= tx.outputs.len() {
                return Err(CryptoError::SighashSingleOutOfRange {
                    index: input_index,
                    outputs: tx.outputs.len(),
                });
            }
            let kept = copy.outputs[input_index].clone();
            copy.outputs = (0..=input_index)
                .map(|i| {
                    if i == input_index {
                        kept.clone()
                    } else {
                        TxOutput { value: -1, locking_script: Vec::new() }
                    }
                })
                .collect();
            for (i, input) in copy.inputs.iter_mut().enumerate() {
                if hash_type & sighash_type::ANYONECANPAY == 0 && i != input_index {
                    input.sequence = 0;
                }
            }
        }
        _ => {}
    }

    let mut buf = copy.encode();
    buf.extend_from_slice(&(hash_type as u32).to_le_bytes());
    let first = Sha256::digest(&buf);
    Ok(Hash256(Sha256::digest(first).into()))
}

/// Sign a specific input, producing an unlocking script ready to embed in
/// the input's `signature_script`.
pub fn sign_input(
    keypair: &KeyPair,
    tx: &Transaction,
    input_index: usize,
    prev_output: &TxOutput,
    hash_type: u8,
) -> Result<Vec<u8>, CryptoError> {
    let digest = sighash(tx, input_index, prev_output, hash_type)?;
    let sig_with_type = keypair.sign_digest(&digest, hash_type);
    Ok(script::p2pkh_unlocking_script(
        &sig_with_type,
        &keypair.public_key_bytes(),
    ))
}

/// Verify a P2PKH input: recompute the SIGHASH digest, check the embedded
/// pubkey hashes to the locking script's hash, and verify the signature.
pub fn verify_input(
    tx: &Transaction,
    input_index: usize,
    prev_output: &TxOutput,
) -> Result<(), CryptoError> {
    let input = tx
        .inputs
        .get(input_index)
        .ok_or(CryptoError::InputIndexOutOfBounds { index: input_index, len: tx.inputs.len() })?;

    let expected_hash = script::match_p2pkh(&prev_output.locking_script)
        .ok_or(CryptoError::VerificationFailed)?;

    let (sig, hash_type, pubkey) =
        script::parse_p2pkh_unlock(&input.signature_script).ok_or(CryptoError::InvalidSignature)?;

    if hash160(pubkey) != expected_hash {
        return Err(CryptoError::PubkeyHashMismatch);
    }

    let digest = sighash(tx, input_index, prev_output, hash_type)?;
    if verify_signature(pubkey, &digest, sig) {
        Ok(())
    } else {
        Err(CryptoError::VerificationFailed)
    }
}
