//! # Event Dispatcher
//!
//! ```text
//! Received ──decode──→ session ──open──→ Authenticated ──window──→ Dispatched ──→ Completed
//!     │                   │                   │                        │
//!     └─ Malformed        └─ UnknownPeer      └─ AuthenticationFailure └─ Replayed / OutOfWindow
//!                                                       (all: Rejected, fail-silent)
//! ```
//!
//! Rejections are reported only through the audit hook. The one reported
//! fault is `RoutingNotFound` (a deployment mismatch), which is terminal for
//! that message only.

use crate::domain::{Acceptance, DispatchOutcome, Emitter, ForwardReport};
use crate::service::runtime::ModuleRuntime;
use ae_audit::AuditEvent;
use ae_types::{EventMessage, IoId, Rejection, RuntimeError};
use tracing::{debug, warn};
use zeroize::Zeroize;

impl ModuleRuntime {
    /// Run one encoded Event Message through the dispatcher.
    ///
    /// # Errors
    ///
    /// - `UninitializedRuntime` before `activate`
    /// - `RoutingNotFound` if the authenticated message names an input
    ///   without a handler
    pub fn dispatch(&mut self, bytes: &[u8]) -> Result<DispatchOutcome, RuntimeError> {
        if !self.is_active() {
            return Err(RuntimeError::UninitializedRuntime);
        }

        let message = match EventMessage::decode(bytes, self.max_payload) {
            Ok(message) => message,
            Err(err) => return Ok(self.reject(Rejection::MalformedMessage(err))),
        };
        let peer = message.sender;

        let Ok(session) = self.sessions.get(peer) else {
            return Ok(self.reject(Rejection::UnknownPeer { peer }));
        };

        let mut plaintext = match ae_crypto::open(
            session.key(),
            peer,
            message.sequence,
            &message.associated_data(),
            &message.ciphertext,
            &message.tag,
        ) {
            Ok(plaintext) => plaintext,
            Err(_) => return Ok(self.reject(Rejection::AuthenticationFailure { peer })),
        };

        let sequence = message.sequence;
        match self.sessions.accept_receive(peer, sequence) {
            Ok(Acceptance::Accepted) => {}
            Ok(Acceptance::Replayed) => {
                plaintext.zeroize();
                return Ok(self.reject(Rejection::Replayed { peer, sequence }));
            }
            Ok(Acceptance::OutOfWindow) => {
                plaintext.zeroize();
                return Ok(self.reject(Rejection::OutOfWindow { peer, sequence }));
            }
            Err(_) => {
                plaintext.zeroize();
                return Ok(self.reject(Rejection::UnknownPeer { peer }));
            }
        }

        debug!(module = %self.id, %peer, input = %message.input, sequence, "Event authenticated");
        let report = self.run_handler(HandlerKind::Input, message.input, &plaintext);
        plaintext.zeroize();
        report.map(DispatchOutcome::Completed)
    }

    /// Invoke user entry point `id` with `payload`.
    ///
    /// # Errors
    ///
    /// `UninitializedRuntime` before `activate`, `RoutingNotFound` for an
    /// unregistered entry.
    pub fn call_entry(&mut self, id: IoId, payload: &[u8]) -> Result<ForwardReport, RuntimeError> {
        if !self.is_active() {
            return Err(RuntimeError::UninitializedRuntime);
        }
        self.run_handler(HandlerKind::Entry, id, payload)
    }

    fn run_handler(
        &mut self,
        kind: HandlerKind,
        id: IoId,
        payload: &[u8],
    ) -> Result<ForwardReport, RuntimeError> {
        let resolved = match kind {
            HandlerKind::Input => self.routing.resolve_input(id),
            HandlerKind::Entry => self.routing.resolve_entry(id),
        };
        let handler = match resolved {
            Ok(handler) => handler,
            Err(err) => {
                self.report_fault(&err);
                return Err(err);
            }
        };

        let mut emitter = Emitter::default();
        handler(payload, &mut emitter);

        Ok(self.forwarder().forward_all(emitter.into_emitted()))
    }

    fn reject(&self, rejection: Rejection) -> DispatchOutcome {
        warn!(module = %self.id, %rejection, "Inbound event rejected");
        self.audit.notify(AuditEvent::Rejected {
            module: self.id,
            rejection: rejection.clone(),
        });
        DispatchOutcome::Rejected(rejection)
    }
}

#[derive(Clone, Copy)]
enum HandlerKind {
    Input,
    Entry,
}
