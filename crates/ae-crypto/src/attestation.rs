//! # Attestation Responses
//!
//! A module proves possession of its module key by returning an
//! HMAC-SHA256 over `module_id ‖ challenge`, truncated to 16 bytes.
//!
//! The MAC key is not the module key itself but a subkey
//! `HMAC-SHA256(module_key, ATTESTATION_LABEL)`. The module key stays
//! reserved for AEAD unwrapping of `SetKey` payloads, and no number of
//! host-chosen challenges can force a nonce repetition under it.

use crate::{CryptoError, SecretKey};
use ae_types::{ModuleId, TAG_LEN};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Label separating the attestation subkey from other uses of the module key.
pub const ATTESTATION_LABEL: &[u8] = b"authentic-execution/attestation/v1";

fn attestation_key(module_key: &SecretKey) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
    let mut kdf = HmacSha256::new_from_slice(module_key.as_bytes())
        .map_err(|e| CryptoError::InvalidInput(e.to_string()))?;
    kdf.update(ATTESTATION_LABEL);
    Ok(Zeroizing::new(kdf.finalize().into_bytes().into()))
}

fn keyed_mac(
    module_key: &SecretKey,
    module: ModuleId,
    challenge: &[u8],
) -> Result<HmacSha256, CryptoError> {
    let subkey = attestation_key(module_key)?;
    let mut mac = HmacSha256::new_from_slice(subkey.as_slice())
        .map_err(|e| CryptoError::InvalidInput(e.to_string()))?;
    mac.update(&module.to_be_bytes());
    mac.update(challenge);
    Ok(mac)
}

/// Answer an attestation challenge.
///
/// # Errors
///
/// `CryptoError::InvalidInput` for an empty challenge.
pub fn attestation_tag(
    module_key: &SecretKey,
    module: ModuleId,
    challenge: &[u8],
) -> Result<[u8; TAG_LEN], CryptoError> {
    if challenge.is_empty() {
        return Err(CryptoError::InvalidInput("empty challenge".into()));
    }
    let digest = keyed_mac(module_key, module, challenge)?.finalize().into_bytes();
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&digest[..TAG_LEN]);
    Ok(tag)
}

/// Check an attestation response (deployer side). Constant time.
#[must_use]
pub fn verify_attestation(
    module_key: &SecretKey,
    module: ModuleId,
    challenge: &[u8],
    response: &[u8],
) -> bool {
    if challenge.is_empty() || response.len() != TAG_LEN {
        return false;
    }
    match keyed_mac(module_key, module, challenge) {
        Ok(mac) => mac.verify_truncated_left(response).is_ok(),
        Err(_) => false,
    }
}
