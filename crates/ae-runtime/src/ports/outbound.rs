//! Outbound (Driven) ports of the module runtime.
//!
//! The runtime depends on exactly two external systems: the transport that
//! carries sealed Event Messages, and the observability hook.

use crate::domain::TransportError;
use ae_audit::AuditEvent;
use ae_types::{EventMessage, ModuleId};

/// Transport boundary.
///
/// Reliability and ordering are not assumed. Implementations must not block:
/// the forwarder calls `send` synchronously for every destination.
pub trait Transport: Send + Sync {
    /// Hand a sealed message to the network for `destination`.
    fn send(&self, destination: ModuleId, message: EventMessage) -> Result<(), TransportError>;
}

/// Observability hook.
///
/// Best effort: `notify` must return promptly and may drop events.
pub trait AuditSink: Send + Sync {
    /// Report one event.
    fn notify(&self, event: AuditEvent);
}

/// Recording transport for testing.
#[cfg(test)]
pub struct MockTransport {
    sent: parking_lot::Mutex<Vec<(ModuleId, EventMessage)>>,
    failing: std::collections::HashSet<ModuleId>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new() -> Self {
        Self {
            sent: parking_lot::Mutex::new(Vec::new()),
            failing: std::collections::HashSet::new(),
        }
    }

    /// Refuse every message for `destination`.
    pub fn failing_for(mut self, destination: ModuleId) -> Self {
        self.failing.insert(destination);
        self
    }

    pub fn sent(&self) -> Vec<(ModuleId, EventMessage)> {
        self.sent.lock().clone()
    }

    pub fn attempts(&self) -> usize {
        self.sent.lock().len()
    }
}

#[cfg(test)]
impl Transport for MockTransport {
    fn send(&self, destination: ModuleId, message: EventMessage) -> Result<(), TransportError> {
        // Failing destinations still count as attempts.
        self.sent.lock().push((destination, message));
        if self.failing.contains(&destination) {
            return Err(TransportError::Unreachable(destination));
        }
        Ok(())
    }
}

/// Recording audit sink for testing.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingAuditSink {
    events: parking_lot::Mutex<Vec<AuditEvent>>,
}

#[cfg(test)]
impl RecordingAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }
}

#[cfg(test)]
impl AuditSink for RecordingAuditSink {
    fn notify(&self, event: AuditEvent) {
        self.events.lock().push(event);
    }
}
