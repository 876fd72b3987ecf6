//! Audit sink adapters.
//!
//! `TracingAuditSink` turns audit events into log records. The audit bus from
//! `ae-audit` is a sink as well, so consumers can subscribe to one module's
//! events.

use crate::ports::AuditSink;
use ae_audit::{AuditEvent, AuditPublisher, InMemoryAuditBus};
use tracing::{debug, error, info, warn};

/// Logs every audit event at a level matching its severity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn notify(&self, event: AuditEvent) {
        match &event {
            AuditEvent::Rejected { module, rejection } => {
                warn!(%module, %rejection, "Inbound event rejected");
            }
            AuditEvent::NoDestinations { module, output } => {
                debug!(%module, %output, "Output has no destinations");
            }
            AuditEvent::DeliveryFailed {
                module,
                output,
                destination,
                reason,
            } => {
                warn!(%module, %output, %destination, %reason, "Delivery failed");
            }
            AuditEvent::SessionEstablished {
                module,
                peer,
                rotated,
            } => {
                info!(%module, %peer, rotated, "Session established");
            }
            AuditEvent::SessionRetired { module, peer } => {
                warn!(%module, %peer, "Session retired, re-attestation required");
            }
            AuditEvent::DeployerNonceExhausted { module } => {
                error!(%module, "SetKey nonces exhausted, redeployment required");
            }
            AuditEvent::Attested { module } => {
                info!(%module, "Module attested");
            }
            AuditEvent::ConfigurationFault { module, error } => {
                error!(%module, %error, "Configuration fault");
            }
        }
    }
}

impl AuditSink for InMemoryAuditBus {
    fn notify(&self, event: AuditEvent) {
        self.publish(event);
    }
}

/// Forwards every event to several sinks.
#[derive(Default)]
pub struct FanoutAuditSink {
    sinks: Vec<std::sync::Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    /// Empty fan-out; events are dropped until a sink is added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    pub fn with(mut self, sink: std::sync::Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of attached sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// True if no sink is attached.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl AuditSink for FanoutAuditSink {
    fn notify(&self, event: AuditEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.notify(event.clone());
            }
            last.notify(event);
        }
    }
}
