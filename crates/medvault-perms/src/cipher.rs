//! Encryption service for documents at rest.
//!
//! The vault never stores plaintext. Uploads go through
//! [`EncryptionService::encrypt`]; reads that passed the consent gate go
//! through [`EncryptionService::decrypt`], which fails closed on any tamper
//! or format error.
//!
//! ## Sealed envelope
//!
//! [`SealedCipher`] is the default service. Each document gets its own
//! random content key:
//!
//! ```text
//! content_key  = random 256-bit
//! ciphertext   = ChaCha20-Poly1305(content_key, nonce, plaintext)
//! ephemeral    = fresh X25519 key pair
//! wrap_key     = Blake3-derive(DH(ephemeral, vault_public) || ephemeral_public)
//! wrapped_key  = ChaCha20-Poly1305(wrap_key, key_nonce, content_key)
//! envelope     = CBOR { version, ephemeral_public, key_nonce, wrapped_key, nonce, ciphertext }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::crypto::{ContentKey, Ephemeral, SealNonce, VaultPublicKey, VaultSecretKey};
use crate::error::{DecryptError, PermsError, Result};

/// Envelope format version.
const ENVELOPE_VERSION: u8 = 1;

/// Opaque encrypt/decrypt of document content.
///
/// Implementations may be backed by a remote key service, so both calls
/// are async.
#[async_trait]
pub trait EncryptionService: Send + Sync {
    /// Seal plaintext into an opaque blob.
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Open a blob produced by `encrypt`.
    async fn decrypt(&self, sealed: &[u8]) -> std::result::Result<Vec<u8>, DecryptError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct SealedEnvelope {
    version: u8,
    ephemeral_public: VaultPublicKey,
    key_nonce: SealNonce,
    wrapped_key: Vec<u8>,
    nonce: SealNonce,
    ciphertext: Vec<u8>,
}

/// Seals each document to the vault's X25519 key.
pub struct SealedCipher {
    secret: VaultSecretKey,
    public: VaultPublicKey,
}

impl SealedCipher {
    /// Create a cipher around an existing vault key.
    pub fn new(secret: VaultSecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Create a cipher with a fresh random vault key.
    pub fn generate() -> Self {
        Self::new(VaultSecretKey::generate())
    }

    pub fn public_key(&self) -> VaultPublicKey {
        self.public
    }

    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let content_key = ContentKey::generate();
        let nonce = SealNonce::generate();
        let ciphertext = content_key.seal(plaintext, &nonce)?;

        let ephemeral = Ephemeral::generate();
        let ephemeral_public = ephemeral.public_key();
        let wrap_key = ephemeral.wrap_key_for(&self.public);
        let key_nonce = SealNonce::generate();
        let wrapped_key = wrap_key.seal(content_key.as_bytes(), &key_nonce)?;

        let envelope = SealedEnvelope {
            version: ENVELOPE_VERSION,
            ephemeral_public,
            key_nonce,
            wrapped_key,
            nonce,
            ciphertext,
        };

        let mut buf = Vec::new();
        ciborium::into_writer(&envelope, &mut buf)
            .map_err(|e| PermsError::EncryptionError(e.to_string()))?;
        Ok(buf)
    }

    fn open(&self, sealed: &[u8]) -> std::result::Result<Vec<u8>, DecryptError> {
        let envelope: SealedEnvelope = ciborium::from_reader(sealed)
            .map_err(|_| DecryptError("malformed envelope".into()))?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(DecryptError(format!(
                "unsupported envelope version {}",
                envelope.version
            )));
        }

        let wrap_key = self.secret.wrap_key_from(&envelope.ephemeral_public);
        let content_key = ContentKey::from_slice(
            &wrap_key.open(&envelope.wrapped_key, &envelope.key_nonce)?,
        )?;
        content_key.open(&envelope.ciphertext, &envelope.nonce)
    }
}

#[async_trait]
impl EncryptionService for SealedCipher {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.seal(plaintext)
    }

    async fn decrypt(&self, sealed: &[u8]) -> std::result::Result<Vec<u8>, DecryptError> {
        self.open(sealed)
    }
}
