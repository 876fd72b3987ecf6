//! # Host Invocation Boundary (backend-neutral part)
//!
//! `execute` runs one reactive entry point against any `ModuleApi` and
//! `StatusClass` groups the outcome into the classes every backend has a
//! native status code for:
//!
//! | Outcome | Class |
//! |---------|-------|
//! | `Ok`, including `Rejected` inbound events | `Success` |
//! | `UninitializedRuntime`, `RoutingNotFound`, ... | `ConfigurationFault` |
//! | `SequenceExhausted` anywhere in the call | `Reattest` |
//! | `DeploymentRefused` | `Refused` |
//! | anything else | `Internal` |
//!
//! Rejections stay invisible to the host: an attacker replaying or tampering
//! with messages learns nothing from the status.

use crate::domain::{DispatchOutcome, ForwardReport};
use crate::ports::ModuleApi;
use ae_types::{Entrypoint, RuntimeError};
use tracing::warn;

/// Run `entry` on `module` and return the response bytes.
///
/// Only `Attest` has a non-empty response.
///
/// # Errors
///
/// The entry point's `RuntimeError`, or `SequenceExhausted` if a forwarded
/// output retired a session.
pub fn execute<M: ModuleApi + ?Sized>(
    module: &mut M,
    entry: Entrypoint,
    payload: &[u8],
) -> Result<Vec<u8>, RuntimeError> {
    match entry {
        Entrypoint::SetKey => module.set_key(payload).map(|()| Vec::new()),
        Entrypoint::Attest => module.attest(payload).map(|tag| tag.to_vec()),
        Entrypoint::HandleInput => match module.handle_input(payload)? {
            DispatchOutcome::Completed(report) => escalate(module, &report),
            DispatchOutcome::Rejected(_) => Ok(Vec::new()),
        },
        Entrypoint::User(id) => {
            let report = module.call_entry(id, payload)?;
            escalate(module, &report)
        }
    }
}

fn escalate<M: ModuleApi + ?Sized>(
    module: &M,
    report: &ForwardReport,
) -> Result<Vec<u8>, RuntimeError> {
    match report.exhausted_peer() {
        Some(peer) => {
            warn!(module = %module.module_id(), %peer, "Session exhausted, requesting re-attestation");
            Err(RuntimeError::SequenceExhausted { peer })
        }
        None => Ok(Vec::new()),
    }
}

/// Backend-neutral status class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    /// Call completed (possibly by silently dropping the event).
    Success,
    /// Build/deployment mismatch.
    ConfigurationFault,
    /// A session was retired; the deployer must re-attest and re-key.
    Reattest,
    /// A deployment command was refused.
    Refused,
    /// Any other failure.
    Internal,
}

impl StatusClass {
    /// Classify the result of `execute`.
    pub fn classify<T>(result: &Result<T, RuntimeError>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(err) => Self::of(err),
        }
    }

    /// Class of one error.
    pub fn of(err: &RuntimeError) -> Self {
        match err {
            e if e.is_configuration_fault() => Self::ConfigurationFault,
            RuntimeError::SequenceExhausted { .. } => Self::Reattest,
            RuntimeError::DeploymentRefused(_) => Self::Refused,
            _ => Self::Internal,
        }
    }
}
