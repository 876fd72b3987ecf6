//! # Deployment Entry Points
//!
//! `SetKey` and `Attest`, the two commands the deployer sends to a module.
//!
//! ## `SetKey` Payload
//!
//! ```text
//! | encryption:u8 | peer:u16 | nonce:u16 | wrapped_key[key_size] | tag[16] |
//! ```
//!
//! The first five bytes are associated data. The session key is sealed under
//! the module key with nonce `(ModuleId(0), nonce)`. `nonce` must equal the
//! module's expected deployer nonce, which then advances, so a replayed
//! `SetKey` is refused.
//!
//! The nonce is 16 bits wide and never wraps. After nonce `0xFFFF` was
//! accepted every further `SetKey` is refused and `DeployerNonceExhausted`
//! is audited; existing sessions keep working, new keys need a redeployed
//! module.
//!
//! ## `Attest` Payload
//!
//! ```text
//! | length:u16 | challenge[length] |
//! ```

use crate::service::runtime::ModuleRuntime;
use ae_audit::AuditEvent;
use ae_crypto::{attestation_tag, CryptoError, Encryption, SecretKey};
use ae_types::{ModuleId, RuntimeError, TAG_LEN};
use tracing::{info, warn};
use zeroize::Zeroize;

/// Length of the `SetKey` associated data.
pub const SET_KEY_HEADER_LEN: usize = 1 + 2 + 2;

impl ModuleRuntime {
    /// Install or rotate the session described by a `SetKey` payload.
    ///
    /// Allowed in both lifecycle phases. A rotated session starts with fresh
    /// counters.
    ///
    /// # Errors
    ///
    /// `DeploymentRefused` for malformed, stale or unauthenticated payloads.
    pub fn set_key(&mut self, payload: &[u8]) -> Result<(), RuntimeError> {
        let Some(expected) = self.deployer_nonce else {
            warn!(module = %self.id, "SetKey refused, deployer nonces exhausted");
            self.audit
                .notify(AuditEvent::DeployerNonceExhausted { module: self.id });
            return Err(RuntimeError::DeploymentRefused(
                "deployer nonce space exhausted, module must be redeployed".into(),
            ));
        };

        match self.unwrap_set_key(payload, expected) {
            Ok((peer, key)) => {
                self.deployer_nonce = expected.checked_add(1);
                if self.deployer_nonce.is_none() {
                    warn!(module = %self.id, "Last SetKey nonce consumed");
                }
                let rotated = self.sessions.establish(peer, key);
                info!(module = %self.id, %peer, rotated, "Session key installed");
                self.audit.notify(AuditEvent::SessionEstablished {
                    module: self.id,
                    peer,
                    rotated,
                });
                Ok(())
            }
            Err(reason) => {
                warn!(module = %self.id, %reason, "SetKey refused");
                Err(RuntimeError::DeploymentRefused(reason))
            }
        }
    }

    /// Answer an `Attest` payload with the MAC of its challenge.
    ///
    /// # Errors
    ///
    /// `DeploymentRefused` for malformed payloads or empty challenges.
    pub fn attest(&mut self, payload: &[u8]) -> Result<[u8; TAG_LEN], RuntimeError> {
        let challenge = match payload {
            [hi, lo, rest @ ..] if usize::from(u16::from_be_bytes([*hi, *lo])) == rest.len() => {
                rest
            }
            _ => {
                return Err(RuntimeError::DeploymentRefused(
                    "attestation payload length mismatch".into(),
                ))
            }
        };

        let tag = attestation_tag(&self.module_key, self.id, challenge)
            .map_err(|e| RuntimeError::DeploymentRefused(e.to_string()))?;

        info!(module = %self.id, "Attestation answered");
        self.audit.notify(AuditEvent::Attested { module: self.id });
        Ok(tag)
    }

    fn unwrap_set_key(
        &self,
        payload: &[u8],
        expected: u16,
    ) -> Result<(ModuleId, SecretKey), String> {
        if payload.len() < SET_KEY_HEADER_LEN + TAG_LEN {
            return Err(format!("payload of {} bytes is truncated", payload.len()));
        }

        let (header, rest) = payload.split_at(SET_KEY_HEADER_LEN);
        let encryption = Encryption::from_id(header[0]).map_err(|e| e.to_string())?;
        let peer = ModuleId(u16::from_be_bytes([header[1], header[2]]));
        let nonce = u16::from_be_bytes([header[3], header[4]]);

        if peer == ModuleId::DEPLOYER || peer == self.id {
            return Err(format!("cannot establish a session with {peer}"));
        }
        if nonce != expected {
            return Err(format!("nonce {nonce} does not match expected {expected}"));
        }

        let (wrapped, tag) = rest.split_at(rest.len() - TAG_LEN);
        if wrapped.len() != encryption.key_size() {
            return Err(format!(
                "wrapped key of {} bytes, expected {}",
                wrapped.len(),
                encryption.key_size()
            ));
        }

        let mut tag_bytes = [0u8; TAG_LEN];
        tag_bytes.copy_from_slice(tag);
        let mut key_bytes = ae_crypto::open(
            &self.module_key,
            ModuleId::DEPLOYER,
            u64::from(nonce),
            header,
            wrapped,
            &tag_bytes,
        )
        .map_err(|e| e.to_string())?;

        let key = SecretKey::new(encryption, &key_bytes);
        key_bytes.zeroize();
        key.map(|key| (peer, key)).map_err(|e| e.to_string())
    }
}

/// Build a `SetKey` payload (deployer side).
///
/// # Errors
///
/// `CryptoError` if sealing fails.
pub fn set_key_payload(
    module_key: &SecretKey,
    peer: ModuleId,
    nonce: u16,
    session_key: &SecretKey,
) -> Result<Vec<u8>, CryptoError> {
    let mut header = [0u8; SET_KEY_HEADER_LEN];
    header[0] = session_key.encryption().id();
    header[1..3].copy_from_slice(&peer.to_be_bytes());
    header[3..5].copy_from_slice(&nonce.to_be_bytes());

    let sealed = ae_crypto::seal(
        module_key,
        ModuleId::DEPLOYER,
        u64::from(nonce),
        &header,
        session_key.as_bytes(),
    )?;

    let mut payload = Vec::with_capacity(SET_KEY_HEADER_LEN + sealed.ciphertext.len() + TAG_LEN);
    payload.extend_from_slice(&header);
    payload.extend_from_slice(&sealed.ciphertext);
    payload.extend_from_slice(&sealed.tag);
    Ok(payload)
}

/// Build an `Attest` payload (deployer side).
///
/// # Errors
///
/// `CryptoError::InvalidInput` if the challenge exceeds the length field.
pub fn attest_payload(challenge: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let len = u16::try_from(challenge.len())
        .map_err(|_| CryptoError::InvalidInput("challenge too long".into()))?;
    let mut payload = Vec::with_capacity(2 + challenge.len());
    payload.extend_from_slice(&len.to_be_bytes());
    payload.extend_from_slice(challenge);
    Ok(payload)
}
