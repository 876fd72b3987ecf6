//! Inbound (Driving) ports of the module runtime.
//!
//! `ModuleApi` is the backend-neutral surface the host invocation boundary
//! drives, one method per reactive entry point. `HostBackend` is the
//! backend-native surface (TrustZone TA commands, Sancus reactive calls) that
//! the transport loop delivers to.

use crate::domain::{DispatchOutcome, ForwardReport};
use ae_types::{IoId, ModuleId, RuntimeError, TAG_LEN};
use std::fmt;

/// Reactive entry points of one module.
pub trait ModuleApi {
    /// Identity of the module.
    fn module_id(&self) -> ModuleId;

    /// `SetKey`: install or rotate the session with a peer.
    ///
    /// # Errors
    ///
    /// `DeploymentRefused` for malformed, stale or unauthenticated payloads.
    fn set_key(&mut self, payload: &[u8]) -> Result<(), RuntimeError>;

    /// `Attest`: MAC the challenge under the module key.
    ///
    /// # Errors
    ///
    /// `DeploymentRefused` for malformed payloads.
    fn attest(&mut self, payload: &[u8]) -> Result<[u8; TAG_LEN], RuntimeError>;

    /// `HandleInput`: run one encoded Event Message through the dispatcher.
    ///
    /// Authentication, replay and decoding failures are `Ok(Rejected(_))`.
    ///
    /// # Errors
    ///
    /// Configuration faults (`UninitializedRuntime`, `RoutingNotFound`).
    fn handle_input(&mut self, message: &[u8]) -> Result<DispatchOutcome, RuntimeError>;

    /// User entry point `id` (`>= 3`).
    ///
    /// # Errors
    ///
    /// Configuration faults (`UninitializedRuntime`, `RoutingNotFound`).
    fn call_entry(&mut self, id: IoId, payload: &[u8]) -> Result<ForwardReport, RuntimeError>;
}

/// Backend-native host invocation boundary.
///
/// One implementation per isolation technology. Backend marshalling lives
/// only in implementations of this trait; the runtime core never sees it.
pub trait HostBackend: Send {
    /// Native status code returned to the untrusted host.
    type Status: Copy + Eq + fmt::Debug + Send;

    /// Identity of the hosted module.
    fn module_id(&self) -> ModuleId;

    /// Deliver one encoded Event Message through the native invocation path.
    fn deliver(&mut self, message: &[u8]) -> Self::Status;

    /// True if `status` is the backend's success code.
    fn is_success(&self, status: Self::Status) -> bool;
}
