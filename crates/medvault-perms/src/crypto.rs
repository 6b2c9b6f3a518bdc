//! Key material for sealing documents.
//!
//! Provides X25519 key agreement for wrapping content keys and
//! ChaCha20-Poly1305 for the content itself.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::error::{DecryptError, PermsError, Result};

/// Domain separation for wrap keys.
const WRAP_KEY_CONTEXT: &str = "medvault-perms-v1-content-key-wrap";

/// The public half of a vault key (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultPublicKey(pub [u8; 32]);

impl VaultPublicKey {
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn to_dalek(self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl From<PublicKey> for VaultPublicKey {
    fn from(pk: PublicKey) -> Self {
        Self(*pk.as_bytes())
    }
}

/// The long-lived secret every document's content key is sealed to.
pub struct VaultSecretKey(StaticSecret);

impl VaultSecretKey {
    /// Generate a new random secret.
    pub fn generate() -> Self {
        Self(StaticSecret::random_from_rng(rand::thread_rng()))
    }

    /// Restore from stored bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// Raw bytes, for persisting the key in a secret store.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn public_key(&self) -> VaultPublicKey {
        VaultPublicKey::from(PublicKey::from(&self.0))
    }

    /// Recompute the wrap key an ephemeral sender derived for us.
    pub(crate) fn wrap_key_from(&self, ephemeral_public: &VaultPublicKey) -> ContentKey {
        let shared = self.0.diffie_hellman(&ephemeral_public.to_dalek());
        derive_wrap_key(shared.as_bytes(), ephemeral_public)
    }
}

impl std::fmt::Debug for VaultSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VaultSecretKey({:?})", self.public_key())
    }
}

/// One-time sender key used to seal a single content key.
pub(crate) struct Ephemeral {
    secret: EphemeralSecret,
    public: VaultPublicKey,
}

impl Ephemeral {
    pub(crate) fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(rand::thread_rng());
        let public = VaultPublicKey::from(PublicKey::from(&secret));
        Self { secret, public }
    }

    pub(crate) fn public_key(&self) -> VaultPublicKey {
        self.public
    }

    /// Derive the wrap key for `recipient`. Consumes the ephemeral secret.
    pub(crate) fn wrap_key_for(self, recipient: &VaultPublicKey) -> ContentKey {
        let shared = self.secret.diffie_hellman(&recipient.to_dalek());
        derive_wrap_key(shared.as_bytes(), &self.public)
    }
}

/// Bind the wrap key to the ephemeral public key that produced it.
fn derive_wrap_key(shared: &[u8; 32], ephemeral_public: &VaultPublicKey) -> ContentKey {
    let mut hasher = blake3::Hasher::new_derive_key(WRAP_KEY_CONTEXT);
    hasher.update(shared);
    hasher.update(ephemeral_public.as_bytes());
    ContentKey(*hasher.finalize().as_bytes())
}

/// A 256-bit ChaCha20-Poly1305 key.
#[derive(Clone)]
pub struct ContentKey([u8; 32]);

impl ContentKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub(crate) fn from_slice(bytes: &[u8]) -> std::result::Result<Self, DecryptError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| DecryptError("wrapped key has wrong length".into()))?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn seal(&self, plaintext: &[u8], nonce: &SealNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| PermsError::EncryptionError(e.to_string()))?;
        cipher
            .encrypt(Nonce::from_slice(&nonce.0), plaintext)
            .map_err(|e| PermsError::EncryptionError(e.to_string()))
    }

    pub fn open(
        &self,
        ciphertext: &[u8],
        nonce: &SealNonce,
    ) -> std::result::Result<Vec<u8>, DecryptError> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| DecryptError(e.to_string()))?;
        cipher
            .decrypt(Nonce::from_slice(&nonce.0), ciphertext)
            .map_err(|_| DecryptError("authentication failed".into()))
    }
}

/// A 96-bit nonce, unique per sealing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealNonce(pub [u8; 12]);

impl SealNonce {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }
}
