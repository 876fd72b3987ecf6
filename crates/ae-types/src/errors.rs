//! # Error Types
//!
//! Two planes:
//!
//! - `Rejection`: inbound events dropped before reaching application code.
//!   Never reported to the sender or the untrusted host, only to the audit hook.
//! - `RuntimeError`: configuration faults and session-fatal conditions that the
//!   hosting layer must see.

use crate::ids::{IoDirection, IoId, ModuleId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Envelope decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum EnvelopeError {
    /// Buffer shorter than header plus tag.
    #[error("Envelope truncated: {len} bytes, need at least {min}")]
    Truncated { len: usize, min: usize },

    /// Declared ciphertext length disagrees with the buffer.
    #[error("Envelope length mismatch: header declares {declared} bytes, found {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Payload larger than the configured maximum message size.
    #[error("Payload of {len} bytes exceeds maximum of {max}")]
    PayloadTooLarge { len: usize, max: usize },
}

/// Reason an inbound event was dropped silently.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum Rejection {
    /// The envelope could not be decoded.
    #[error("Malformed message: {0}")]
    MalformedMessage(EnvelopeError),

    /// No session exists for the claimed sender.
    #[error("Unknown peer {peer}")]
    UnknownPeer { peer: ModuleId },

    /// Tag verification failed.
    #[error("Authentication failure for message from {peer}")]
    AuthenticationFailure { peer: ModuleId },

    /// The sequence number was already accepted.
    #[error("Replayed sequence {sequence} from {peer}")]
    Replayed { peer: ModuleId, sequence: u64 },

    /// The sequence number is older than the replay window.
    #[error("Sequence {sequence} from {peer} is outside the replay window")]
    OutOfWindow { peer: ModuleId, sequence: u64 },
}

/// Faults reported to the hosting/deployment layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// Routing table used before initialization completed.
    #[error("Runtime is not initialized")]
    UninitializedRuntime,

    /// No registration for the identifier (deployment mismatch).
    #[error("No {direction} registered for id {id}")]
    RoutingNotFound { direction: IoDirection, id: IoId },

    /// Two registrations for the same identifier.
    #[error("Duplicate {direction} registration for id {id}")]
    DuplicateRegistration { direction: IoDirection, id: IoId },

    /// Registration attempted after initialization completed.
    #[error("Routing table is sealed; {direction} {id} cannot be registered")]
    RoutingSealed { direction: IoDirection, id: IoId },

    /// A routing destination has no established session at activation.
    #[error("Route for output {output} names {peer}, which has no session")]
    MissingSession { output: IoId, peer: ModuleId },

    /// Send counter exhausted; the session was retired and needs re-attestation.
    #[error("Sequence space exhausted for session with {peer}")]
    SequenceExhausted { peer: ModuleId },

    /// No session with the peer (never established or retired).
    #[error("No session with {peer}")]
    UnknownPeer { peer: ModuleId },

    /// Transport refused the message for one destination.
    #[error("Transport failure towards {destination}: {reason}")]
    TransportFailure { destination: ModuleId, reason: String },

    /// Payload above the configured maximum message size.
    #[error("Payload of {len} bytes exceeds maximum of {max}")]
    PayloadTooLarge { len: usize, max: usize },

    /// Sealing failed for one destination.
    #[error("Sealing failed: {0}")]
    SealFailed(String),

    /// A deployment command (`SetKey`, `Attest`) was refused.
    #[error("Deployment command refused: {0}")]
    DeploymentRefused(String),
}

impl RuntimeError {
    /// True for faults that indicate a build/deployment mismatch.
    #[must_use]
    pub fn is_configuration_fault(&self) -> bool {
        matches!(
            self,
            Self::UninitializedRuntime
                | Self::RoutingNotFound { .. }
                | Self::DuplicateRegistration { .. }
                | Self::RoutingSealed { .. }
                | Self::MissingSession { .. }
        )
    }
}
