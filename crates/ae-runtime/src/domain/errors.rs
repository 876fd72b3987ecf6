//! Domain error types.

use ae_types::{ModuleId, RuntimeError};
use thiserror::Error;

/// Session State Store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No session with this peer.
    #[error("No session with {peer}")]
    NotFound { peer: ModuleId },

    /// The send counter reached its end; the session has been retired.
    #[error("Sequence space exhausted for session with {peer}")]
    SequenceExhausted { peer: ModuleId },

    /// Replay window size outside `1..=128`.
    #[error("Replay window of {size} is outside 1..=128")]
    InvalidWindow { size: u32 },

    /// Send counters only move forward.
    #[error("Send counter for {peer} is at {current}, cannot move to {requested}")]
    CounterRegression {
        peer: ModuleId,
        current: u64,
        requested: u64,
    },
}

impl From<SessionError> for RuntimeError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound { peer } => RuntimeError::UnknownPeer { peer },
            SessionError::SequenceExhausted { peer } => RuntimeError::SequenceExhausted { peer },
            other => RuntimeError::DeploymentRefused(other.to_string()),
        }
    }
}

/// Transport boundary failures, isolated per destination.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No route to the destination module.
    #[error("{0} is unreachable")]
    Unreachable(ModuleId),

    /// The destination stopped accepting messages.
    #[error("Channel to {0} is closed")]
    Closed(ModuleId),

    /// The message could not be encoded for the wire.
    #[error("Encoding failed: {0}")]
    Encoding(String),
}
