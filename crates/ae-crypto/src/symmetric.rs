//! # Symmetric Authenticated Encryption
//!
//! Provides AES-128-GCM (the framework default) and ChaCha20-Poly1305.
//!
//! ## Nonce Layout
//!
//! ```text
//! | sender:u16 | 0x0000 | sequence:u64 |   (12 bytes, big endian)
//! ```
//!
//! Both directions of a session share one key; the sender component keeps
//! their nonce spaces disjoint.

use crate::CryptoError;
use ae_types::{ModuleId, TAG_LEN};
use aes_gcm::aead::consts::{U12, U16};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::Aes128Gcm;
use chacha20poly1305::ChaCha20Poly1305;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Nonce length shared by both ciphers.
pub const NONCE_LEN: usize = 12;

/// Cipher selection, numbered as on the deployment wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encryption {
    /// AES-128-GCM (id 0)
    #[default]
    #[serde(rename = "aes")]
    Aes128Gcm,
    /// ChaCha20-Poly1305 (id 1)
    #[serde(rename = "chacha20poly1305")]
    ChaCha20Poly1305,
}

impl Encryption {
    /// Key size in bytes.
    #[must_use]
    pub const fn key_size(self) -> usize {
        match self {
            Self::Aes128Gcm => 16,
            Self::ChaCha20Poly1305 => 32,
        }
    }

    /// Wire identifier.
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::Aes128Gcm => 0,
            Self::ChaCha20Poly1305 => 1,
        }
    }

    /// Parse a wire identifier.
    ///
    /// # Errors
    ///
    /// `CryptoError::UnknownEncryption` for unassigned ids.
    pub fn from_id(id: u8) -> Result<Self, CryptoError> {
        match id {
            0 => Ok(Self::Aes128Gcm),
            1 => Ok(Self::ChaCha20Poly1305),
            other => Err(CryptoError::UnknownEncryption(other)),
        }
    }
}

/// Session or module key, bound to the cipher it is used with.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    #[zeroize(skip)]
    encryption: Encryption,
    bytes: Vec<u8>,
}

impl SecretKey {
    /// Create from bytes, checking the length against the cipher.
    ///
    /// # Errors
    ///
    /// `CryptoError::InvalidKeyLength` if `bytes` has the wrong size.
    pub fn new(encryption: Encryption, bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != encryption.key_size() {
            return Err(CryptoError::InvalidKeyLength {
                expected: encryption.key_size(),
                actual: bytes.len(),
            });
        }
        Ok(Self {
            encryption,
            bytes: bytes.to_vec(),
        })
    }

    /// Generate random key.
    pub fn generate(encryption: Encryption) -> Self {
        let mut bytes = vec![0u8; encryption.key_size()];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self { encryption, bytes }
    }

    /// Cipher this key belongs to.
    pub fn encryption(&self) -> Encryption {
        self.encryption
    }

    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Constant-time over the key bytes.
impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.encryption == other.encryption
            && bool::from(self.bytes.as_slice().ct_eq(other.bytes.as_slice()))
    }
}

impl Eq for SecretKey {}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("encryption", &self.encryption)
            .field("bytes", &"<redacted>")
            .finish()
    }
}

/// Output of `seal`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sealed {
    /// Ciphertext, same length as the plaintext.
    pub ciphertext: Vec<u8>,
    /// Detached authentication tag.
    pub tag: [u8; TAG_LEN],
}

/// Derive the nonce for one message.
#[must_use]
pub fn nonce_for(sender: ModuleId, sequence: u64) -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    nonce[0..2].copy_from_slice(&sender.to_be_bytes());
    nonce[4..12].copy_from_slice(&sequence.to_be_bytes());
    nonce
}

/// Encrypt `plaintext` and authenticate it together with `associated`.
///
/// # Errors
///
/// Returns `CryptoError::EncryptionFailed` if the cipher refuses the input.
pub fn seal(
    key: &SecretKey,
    sender: ModuleId,
    sequence: u64,
    associated: &[u8],
    plaintext: &[u8],
) -> Result<Sealed, CryptoError> {
    let nonce = nonce_for(sender, sequence);
    let mut buffer = plaintext.to_vec();

    let tag = match key.encryption {
        Encryption::Aes128Gcm => {
            seal_detached::<Aes128Gcm>(key.as_bytes(), &nonce, associated, &mut buffer)?
        }
        Encryption::ChaCha20Poly1305 => {
            seal_detached::<ChaCha20Poly1305>(key.as_bytes(), &nonce, associated, &mut buffer)?
        }
    };

    Ok(Sealed {
        ciphertext: buffer,
        tag,
    })
}

/// Verify and decrypt a sealed payload.
///
/// # Errors
///
/// Returns `CryptoError::AuthenticationFailure` if the tag does not verify for
/// this key, sender, sequence and associated data.
pub fn open(
    key: &SecretKey,
    sender: ModuleId,
    sequence: u64,
    associated: &[u8],
    ciphertext: &[u8],
    tag: &[u8; TAG_LEN],
) -> Result<Vec<u8>, CryptoError> {
    let nonce = nonce_for(sender, sequence);
    let mut buffer = ciphertext.to_vec();

    let verified = match key.encryption {
        Encryption::Aes128Gcm => {
            open_detached::<Aes128Gcm>(key.as_bytes(), &nonce, associated, &mut buffer, tag)
        }
        Encryption::ChaCha20Poly1305 => {
            open_detached::<ChaCha20Poly1305>(key.as_bytes(), &nonce, associated, &mut buffer, tag)
        }
    };

    match verified {
        Ok(()) => Ok(buffer),
        Err(e) => {
            buffer.zeroize();
            Err(e)
        }
    }
}

fn seal_detached<C>(
    key: &[u8],
    nonce: &[u8; NONCE_LEN],
    associated: &[u8],
    buffer: &mut [u8],
) -> Result<[u8; TAG_LEN], CryptoError>
where
    C: KeyInit + AeadInPlace<NonceSize = U12, TagSize = U16>,
{
    let cipher = C::new_from_slice(key)
        .map_err(|_| CryptoError::InvalidInput(format!("{}-byte key rejected", key.len())))?;

    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(nonce), associated, buffer)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut out = [0u8; TAG_LEN];
    out.copy_from_slice(tag.as_slice());
    Ok(out)
}

fn open_detached<C>(
    key: &[u8],
    nonce: &[u8; NONCE_LEN],
    associated: &[u8],
    buffer: &mut [u8],
    tag: &[u8; TAG_LEN],
) -> Result<(), CryptoError>
where
    C: KeyInit + AeadInPlace<NonceSize = U12, TagSize = U16>,
{
    let cipher = C::new_from_slice(key).map_err(|_| CryptoError::AuthenticationFailure)?;

    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(nonce),
            associated,
            buffer,
            GenericArray::from_slice(tag),
        )
        .map_err(|_| CryptoError::AuthenticationFailure)
}
