//! # AE Crypto - Crypto Engine
//!
//! Stateless primitives used by the session store, the dispatcher and the
//! forwarder.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `symmetric` | AES-128-GCM, ChaCha20-Poly1305 | Event sealing, key wrapping |
//! | `kdf` | SHA-256 | Vendor and module key derivation |
//! | `attestation` | HMAC-SHA256 | Attestation challenge responses |
//!
//! ## Security Properties
//!
//! - **Nonces** are derived from `(sender, sequence)`, never random, so a
//!   session key plus a never-repeating sequence number is nonce-safe in both
//!   directions.
//! - **Tag verification** is delegated to the AEAD implementations, which
//!   compare in constant time.
//! - **Key material** is zeroized on drop.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attestation;
pub mod errors;
pub mod kdf;
pub mod symmetric;

// Re-exports
pub use attestation::{attestation_tag, verify_attestation, ATTESTATION_LABEL};
pub use errors::CryptoError;
pub use kdf::{derive_module_key, derive_vendor_key, ta_image_hash};
pub use symmetric::{nonce_for, open, seal, Encryption, Sealed, SecretKey};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
