use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};
use thiserror::Error;

use crate::transaction::Transaction;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid secret key")]
    InvalidSecretKey,
    #[error("invalid signature encoding")]
    InvalidSignature,
    #[error("transaction is not signed")]
    MissingSignature,
}

/// Generate a new secp256k1 keypair and return (priv_hex, pub_hex_compressed).
/// The compressed public key hex doubles as the account identifier.
pub fn generate_keypair_hex() -> (String, String) {
    let secp = Secp256k1::new();
    let (sk, pk) = secp.generate_keypair(&mut OsRng);
    (hex::encode(sk.secret_bytes()), hex::encode(pk.serialize()))
}

/// Sign `tx` with the hex secret key, storing a hex compact signature.
pub fn sign_transaction(tx: &mut Transaction, secret_hex: &str) -> Result<(), SignatureError> {
    let secp = Secp256k1::signing_only();
    let bytes = hex::decode(secret_hex).map_err(|_| SignatureError::InvalidSecretKey)?;
    let sk = SecretKey::from_slice(&bytes).map_err(|_| SignatureError::InvalidSecretKey)?;
    let msg = Message::from_digest_slice(&tx.sighash()).map_err(|_| SignatureError::InvalidSignature)?;
    let sig = secp.sign_ecdsa(&msg, &sk);
    tx.signature = Some(hex::encode(sig.serialize_compact()));
    Ok(())
}

/// Check `tx.signature` against the hex-encoded compressed `pubkey_hex`.
///
/// Malformed keys or signatures are errors; a well-formed signature that
/// does not match yields `Ok(false)`.
pub fn verify_transaction(tx: &Transaction, pubkey_hex: &str) -> Result<bool, SignatureError> {
    let secp = Secp256k1::verification_only();

    let sig_hex = tx
        .signature
        .as_deref()
        .ok_or(SignatureError::MissingSignature)?;
    let sig_bytes = hex::decode(sig_hex).map_err(|_| SignatureError::InvalidSignature)?;
    let sig = Signature::from_compact(&sig_bytes).map_err(|_| SignatureError::InvalidSignature)?;

    let pk_bytes = hex::decode(pubkey_hex).map_err(|_| SignatureError::InvalidPublicKey)?;
    let pk = PublicKey::from_slice(&pk_bytes).map_err(|_| SignatureError::InvalidPublicKey)?;

    let msg = Message::from_digest_slice(&tx.sighash()).map_err(|_| SignatureError::InvalidSignature)?;
    Ok(secp.verify_ecdsa(&msg, &sig, &pk).is_ok())
}
