//! Detached-signature verification strategies.
//!
//! Decides authenticity of a raw byte payload given a base64-encoded
//! detached signature and resolved key material. Two interchangeable
//! strategies are supported, selected at configuration time:
//!
//! - **ECDSA P-256**: key material is a PEM-encoded public key; the
//!   signature is DER-encoded over the SHA-256 digest of the payload.
//! - **HMAC-SHA-256**: key material is a shared secret; the signature is
//!   the base64 encoding of the keyed digest, compared in constant time.
//!
//! Malformed input of any kind, a bad base64 transport encoding, a
//! truncated DER signature, an unparseable key, is simply "not valid";
//! nothing here panics or propagates a decode error past this module.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use gatehouse_core::VerifyStrategy;
use hmac::{Hmac, Mac};
use p256::{
    ecdsa::{signature::Verifier, Signature, VerifyingKey},
    pkcs8::DecodePublicKey,
};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Why a signature check failed.
///
/// Distinguishes unusable key material from a plain mismatch so the
/// authenticator can report `MalformedKeyMaterial` separately; every
/// variant still means "reject".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyFailure {
    /// Signature was not valid base64 or not a well-formed signature encoding.
    MalformedSignature,
    /// Key material could not be parsed for the configured strategy.
    MalformedKey,
    /// Signature was well-formed but did not match the payload and key.
    Mismatch,
}

/// Checks a detached signature, reporting why verification failed.
///
/// # Errors
///
/// Returns a [`VerifyFailure`] describing the first decode or verification
/// step that failed. All failures mean the request must be rejected.
pub fn check(
    raw_body: &[u8],
    signature_b64: &str,
    key_material: &str,
    strategy: VerifyStrategy,
) -> Result<(), VerifyFailure> {
    match strategy {
        VerifyStrategy::EcdsaP256 => check_ecdsa_p256(raw_body, signature_b64, key_material),
        VerifyStrategy::HmacSha256 => check_hmac_sha256(raw_body, signature_b64, key_material),
    }
}

/// Decides authenticity of a payload for the given strategy.
///
/// Boolean form of [`check`]: any malformed signature, unparseable key, or
/// digest mismatch yields `false`, never an error.
pub fn verify(
    raw_body: &[u8],
    signature_b64: &str,
    key_material: &str,
    strategy: VerifyStrategy,
) -> bool {
    check(raw_body, signature_b64, key_material, strategy).is_ok()
}

fn check_ecdsa_p256(
    raw_body: &[u8],
    signature_b64: &str,
    key_material: &str,
) -> Result<(), VerifyFailure> {
    let signature_bytes =
        BASE64.decode(signature_b64.trim()).map_err(|_| VerifyFailure::MalformedSignature)?;
    let signature =
        Signature::from_der(&signature_bytes).map_err(|_| VerifyFailure::MalformedSignature)?;
    let verifying_key =
        VerifyingKey::from_public_key_pem(key_material).map_err(|_| VerifyFailure::MalformedKey)?;

    // Verifier for P-256 hashes the message with SHA-256 internally.
    verifying_key.verify(raw_body, &signature).map_err(|_| VerifyFailure::Mismatch)
}

fn check_hmac_sha256(
    raw_body: &[u8],
    signature_b64: &str,
    key_material: &str,
) -> Result<(), VerifyFailure> {
    let signature_bytes =
        BASE64.decode(signature_b64.trim()).map_err(|_| VerifyFailure::MalformedSignature)?;
    let mut mac = HmacSha256::new_from_slice(key_material.as_bytes())
        .map_err(|_| VerifyFailure::MalformedKey)?;
    mac.update(raw_body);

    // verify_slice is a constant-time comparison.
    mac.verify_slice(&signature_bytes).map_err(|_| VerifyFailure::Mismatch)
}
