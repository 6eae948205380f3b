//! Cryptographic primitives for object signing.
//!
//! # Algorithms
//!
//! - **Keys**: Ed25519, loaded from a 32-byte hex seed
//! - **Signatures**: detached Ed25519 over the exact canonical UTF-8 bytes
//!   that travel as `rawpayload`; the signer never re-serializes or
//!   normalizes its input
//! - **CCID**: `"cc"` + base58 of the verifying key bytes

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::types::{ApiError, Result};

// =============================================================================
// Constants
// =============================================================================

/// Ed25519 private key seed length (32 bytes)
pub const SEED_LEN: usize = 32;

/// Text prefix of a content-owner identifier
pub const CCID_PREFIX: &str = "cc";

// =============================================================================
// Key Handling
// =============================================================================

/// Generate a new Ed25519 signing keypair.
///
/// Uses the OS cryptographically secure random number generator.
pub fn generate_keypair() -> (SigningKey, VerifyingKey) {
    let signing_key = SigningKey::generate(&mut OsRng);
    let verifying_key = signing_key.verifying_key();
    (signing_key, verifying_key)
}

/// Load a signing key from a 64-char hex seed.
pub fn load_signing_key(hex_seed: &str) -> Result<SigningKey> {
    let bytes = hex::decode(hex_seed)
        .map_err(|e| ApiError::Config(format!("private key is not hex: {}", e)))?;

    let seed: [u8; SEED_LEN] = bytes
        .try_into()
        .map_err(|_| ApiError::Config(format!("private key must be {} bytes", SEED_LEN)))?;

    Ok(SigningKey::from_bytes(&seed))
}

/// Export a signing key's seed as hex (for storage or config round-trips).
pub fn signing_key_hex(key: &SigningKey) -> String {
    hex::encode(key.to_bytes())
}

// =============================================================================
// CCID
// =============================================================================

/// Derive the content-owner identifier for a verifying key.
pub fn ccid_for_key(key: &VerifyingKey) -> String {
    format!("{}{}", CCID_PREFIX, bs58::encode(key.as_bytes()).into_string())
}

/// Whether a string is syntactically a CCID.
pub fn is_ccid(value: &str) -> bool {
    value
        .strip_prefix(CCID_PREFIX)
        .map(|rest| !rest.is_empty() && bs58::decode(rest).into_vec().is_ok())
        .unwrap_or(false)
}

// =============================================================================
// Signing
// =============================================================================

/// Sign canonical payload bytes with an Ed25519 private key.
pub fn sign_payload(signing_key: &SigningKey, payload: &[u8]) -> Signature {
    signing_key.sign(payload)
}

/// Sign canonical payload bytes, returning the signature as hex.
pub fn sign_payload_hex(signing_key: &SigningKey, payload: &[u8]) -> String {
    hex::encode(sign_payload(signing_key, payload).to_bytes())
}

/// Verify a hex signature over payload bytes.
///
/// The client never verifies on the read path (verification is server-side);
/// this exists for key management and tests.
pub fn verify_payload_hex(key: &VerifyingKey, payload: &[u8], signature_hex: &str) -> Result<()> {
    let bytes = hex::decode(signature_hex)
        .map_err(|e| ApiError::Signing(format!("signature is not hex: {}", e)))?;

    let signature = Signature::from_slice(&bytes)
        .map_err(|e| ApiError::Signing(format!("malformed signature: {}", e)))?;

    key.verify(payload, &signature)
        .map_err(|e| ApiError::Signing(format!("verification failed: {}", e)))
}

// =============================================================================
// Tests
// =============================================================================
