//! Asymmetric signing abstraction and the default Ed25519 provider.
//!
//! The CA engine is decoupled from the concrete primitive through
//! [`SignatureProvider`], so algorithms and test doubles can be swapped
//! without touching issuance or verification logic.

use ed25519_dalek::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use crate::error::{Error, Result};
use crate::types::PrivateKey;

/// A freshly generated key pair.
#[derive(Debug, Clone)]
pub struct KeyPair {
    public: Vec<u8>,
    private: PrivateKey,
}

impl KeyPair {
    /// Creates a key pair from its raw parts.
    #[must_use]
    pub const fn new(public: Vec<u8>, private: PrivateKey) -> Self {
        Self { public, private }
    }

    /// Returns the public key bytes.
    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        &self.public
    }

    /// Returns the private key.
    #[must_use]
    pub const fn private_key(&self) -> &PrivateKey {
        &self.private
    }
}

/// Capability to generate keys, sign content, and verify signatures.
pub trait SignatureProvider: Send + Sync {
    /// Generates a fresh key pair.
    fn generate_key_pair(&self) -> Result<KeyPair>;

    /// Signs a message with the given private key.
    fn sign(&self, message: &[u8], key: &PrivateKey) -> Result<Vec<u8>>;

    /// Verifies a signature over a message against a public key.
    ///
    /// Malformed keys or signatures verify as `false`, never as an error.
    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool;
}

/// Default provider: Ed25519 via `ed25519-dalek`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Provider;

impl Ed25519Provider {
    fn signing_key(key: &PrivateKey) -> Result<SigningKey> {
        let bytes: [u8; 32] = key
            .bytes()
            .try_into()
            .map_err(|_| Error::Generation("private key must be 32 bytes".into()))?;
        Ok(SigningKey::from_bytes(&bytes))
    }
}

impl SignatureProvider for Ed25519Provider {
    fn generate_key_pair(&self) -> Result<KeyPair> {
        let signing_key = SigningKey::generate(&mut OsRng);
        let public = signing_key.verifying_key().to_bytes().to_vec();
        let private = PrivateKey::new(signing_key.to_bytes().to_vec());
        Ok(KeyPair::new(public, private))
    }

    fn sign(&self, message: &[u8], key: &PrivateKey) -> Result<Vec<u8>> {
        use ed25519_dalek::Signer;

        let signing_key = Self::signing_key(key)?;
        Ok(signing_key.sign(message).to_bytes().to_vec())
    }

    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        use ed25519_dalek::Verifier;

        let Ok(key_bytes) = <[u8; 32]>::try_from(public_key) else {
            return false;
        };
        let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
            return false;
        };
        let Ok(sig_bytes) = <[u8; 64]>::try_from(signature) else {
            return false;
        };
        let signature = Signature::from_bytes(&sig_bytes);

        verifying_key.verify(message, &signature).is_ok()
    }
}
