//! Genuine signers producing the wire encodings the gateway verifies.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use gatehouse_core::KeyRecord;
use hmac::{Hmac, Mac};
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use p256::pkcs8::{EncodePublicKey, LineEnding};
use rand::rngs::OsRng;
use sha2::Sha256;

/// Computes the base64-encoded HMAC-SHA-256 signature of a payload, the
/// encoding a symmetric-strategy caller puts in the signature header.
pub fn hmac_signature(secret: &str, payload: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    BASE64.encode(mac.finalize().into_bytes())
}

/// An ECDSA P-256 test signer with a directory identity.
///
/// Generates a fresh keypair per instance; [`key_record`](Self::key_record)
/// yields the entry a directory would publish for it and
/// [`sign`](Self::sign) the header value a caller would send.
pub struct TestSigner {
    key_identifier: String,
    signing_key: SigningKey,
}

impl TestSigner {
    /// Generates a signer with a fresh random keypair.
    pub fn generate(key_identifier: impl Into<String>) -> Self {
        Self { key_identifier: key_identifier.into(), signing_key: SigningKey::random(&mut OsRng) }
    }

    /// The signer's key identifier.
    pub fn key_identifier(&self) -> &str {
        &self.key_identifier
    }

    /// PEM encoding of the public key, as the directory publishes it.
    pub fn public_key_pem(&self) -> String {
        self.signing_key
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .expect("P-256 public key is PEM-encodable")
    }

    /// Directory record for this signer.
    pub fn key_record(&self) -> KeyRecord {
        KeyRecord { identifier: self.key_identifier.clone(), material: self.public_key_pem() }
    }

    /// Signs a payload, returning the base64-encoded DER signature.
    pub fn sign(&self, payload: &[u8]) -> String {
        let signature: Signature = self.signing_key.sign(payload);
        BASE64.encode(signature.to_der().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_signature_is_deterministic() {
        assert_eq!(hmac_signature("secret", b"hello"), hmac_signature("secret", b"hello"));
        assert_ne!(hmac_signature("secret", b"hello"), hmac_signature("secret", b"world"));
    }

    #[test]
    fn test_signer_round_trips_through_the_verifier() {
        let signer = TestSigner::generate("kid-test");
        let signature = signer.sign(b"payload");

        assert!(gatehouse_auth::verify(
            b"payload",
            &signature,
            &signer.public_key_pem(),
            gatehouse_core::VerifyStrategy::EcdsaP256,
        ));
    }
}
