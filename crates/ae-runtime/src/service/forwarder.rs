//! # Output Forwarder
//!
//! `emit(output, payload)`: resolve destinations, then per destination
//! `advance_send` → `seal` → `Transport::send`.
//!
//! A failure for one destination never prevents the attempt for the next.
//! A sequence number consumed by a failed attempt is never reused.

use crate::domain::{Delivery, ForwardReport, RoutingTable, SessionError, SessionStore};
use crate::ports::{AuditSink, Transport};
use ae_audit::AuditEvent;
use ae_types::{Destination, EventMessage, IoId, ModuleId, RuntimeError};
use tracing::{debug, warn};

/// Borrowed view of the runtime state the forwarder needs.
pub(crate) struct OutputForwarder<'a> {
    pub module: ModuleId,
    pub max_payload: usize,
    pub routing: &'a RoutingTable,
    pub sessions: &'a mut SessionStore,
    pub transport: &'a dyn Transport,
    pub audit: &'a dyn AuditSink,
}

impl OutputForwarder<'_> {
    /// Forward every buffered emit, in emit order.
    pub fn forward_all(&mut self, emitted: Vec<(IoId, Vec<u8>)>) -> ForwardReport {
        let mut report = ForwardReport::default();
        for (output, payload) in emitted {
            report.merge(self.emit(output, &payload));
        }
        report
    }

    /// Seal `payload` for every destination of `output` and send it.
    pub fn emit(&mut self, output: IoId, payload: &[u8]) -> ForwardReport {
        let mut report = ForwardReport::default();
        let routing = self.routing;

        let destinations = match routing.resolve_output(output) {
            Ok(destinations) => destinations,
            Err(err) => {
                self.audit.notify(AuditEvent::ConfigurationFault {
                    module: self.module,
                    error: err.to_string(),
                });
                return report;
            }
        };

        if destinations.is_empty() {
            debug!(module = %self.module, %output, "Emit has no destinations");
            self.audit.notify(AuditEvent::NoDestinations {
                module: self.module,
                output,
            });
            report.unrouted.push(output);
            return report;
        }

        for destination in destinations {
            let result = self.deliver(*destination, payload);
            if let Err(err) = &result {
                warn!(
                    module = %self.module,
                    %output,
                    %destination,
                    error = %err,
                    "Delivery failed"
                );
                self.audit.notify(AuditEvent::DeliveryFailed {
                    module: self.module,
                    output,
                    destination: *destination,
                    reason: err.to_string(),
                });
            }
            report.deliveries.push(Delivery {
                output,
                destination: *destination,
                result,
            });
        }

        report
    }

    fn deliver(&mut self, destination: Destination, payload: &[u8]) -> Result<u64, RuntimeError> {
        let len = u16::try_from(payload.len())
            .ok()
            .filter(|_| payload.len() <= self.max_payload)
            .ok_or(RuntimeError::PayloadTooLarge {
                len: payload.len(),
                max: self.max_payload,
            })?;

        let peer = destination.module;
        let sequence = match self.sessions.advance_send(peer) {
            Ok(sequence) => sequence,
            Err(err @ SessionError::SequenceExhausted { .. }) => {
                self.audit.notify(AuditEvent::SessionRetired {
                    module: self.module,
                    peer,
                });
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };

        let key = self.sessions.get(peer)?.key();
        let header = EventMessage::header(self.module, destination.input, sequence, len);
        let sealed = ae_crypto::seal(key, self.module, sequence, &header, payload)
            .map_err(|e| RuntimeError::SealFailed(e.to_string()))?;

        let message = EventMessage {
            sender: self.module,
            input: destination.input,
            sequence,
            ciphertext: sealed.ciphertext,
            tag: sealed.tag,
        };

        self.transport
            .send(peer, message)
            .map_err(|e| RuntimeError::TransportFailure {
                destination: peer,
                reason: e.to_string(),
            })?;

        debug!(module = %self.module, %destination, sequence, "Event forwarded");
        Ok(sequence)
    }
}
