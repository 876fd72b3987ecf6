//! # Key Derivation
//!
//! SHA-256 based derivations used when a node provisions module keys.
//!
//! - vendor key: `SHA-256(node_key ‖ vendor_id as u16 LE)`
//! - module key: `SHA-256(node_key ‖ module_hash)`, truncated to the cipher's
//!   key size

use crate::{CryptoError, Encryption, SecretKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// SHA-256 output (256-bit).
pub type Digest256 = [u8; 32];

/// Offset of the image hash inside a signed TA binary (after `struct shdr`).
const TA_HEADER_LEN: usize = 20;

/// Derive the vendor key of a node.
#[must_use]
pub fn derive_vendor_key(node_key: &[u8], vendor_id: u16) -> Digest256 {
    let mut hasher = Sha256::new();
    hasher.update(node_key);
    hasher.update(vendor_id.to_le_bytes());
    hasher.finalize().into()
}

/// Derive the key a node assigns to a module with the given image hash.
///
/// # Errors
///
/// `CryptoError::InvalidKeyLength` if the cipher needs more than 32 bytes.
pub fn derive_module_key(
    node_key: &[u8],
    module_hash: &[u8],
    encryption: Encryption,
) -> Result<SecretKey, CryptoError> {
    let size = encryption.key_size();
    if size > 32 {
        return Err(CryptoError::InvalidKeyLength {
            expected: 32,
            actual: size,
        });
    }

    let mut hasher = Sha256::new();
    hasher.update(node_key);
    hasher.update(module_hash);
    let mut digest: Digest256 = hasher.finalize().into();

    let key = SecretKey::new(encryption, &digest[..size]);
    digest.zeroize();
    key
}

/// Extract the image hash from a signed TrustZone TA binary.
///
/// Returns `None` if the binary is shorter than header plus hash.
#[must_use]
pub fn ta_image_hash(binary: &[u8]) -> Option<Digest256> {
    let hash = binary.get(TA_HEADER_LEN..TA_HEADER_LEN + 32)?;
    let mut out = [0u8; 32];
    out.copy_from_slice(hash);
    Some(out)
}
