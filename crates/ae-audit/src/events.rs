//! # Audit Events
//!
//! Everything the runtime reports out-of-band. None of these are visible to
//! the sender of an event or to the untrusted host.

use ae_types::{Destination, IoId, ModuleId, Rejection};
use serde::{Deserialize, Serialize};

/// Events published to the audit bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEvent {
    // =========================================================================
    // INBOUND
    // =========================================================================
    /// An inbound event was dropped before reaching application code.
    Rejected {
        /// Module that dropped it.
        module: ModuleId,
        /// Why.
        rejection: Rejection,
    },

    // =========================================================================
    // OUTBOUND
    // =========================================================================
    /// An output was emitted but has no subscribers.
    NoDestinations {
        /// Emitting module.
        module: ModuleId,
        /// Output id.
        output: IoId,
    },

    /// Delivery to one destination failed; siblings were still attempted.
    DeliveryFailed {
        /// Emitting module.
        module: ModuleId,
        /// Output id.
        output: IoId,
        /// Destination that failed.
        destination: Destination,
        /// Failure description.
        reason: String,
    },

    // =========================================================================
    // SESSIONS
    // =========================================================================
    /// A session was installed by the deployer.
    SessionEstablished {
        /// Owning module.
        module: ModuleId,
        /// Peer of the session.
        peer: ModuleId,
        /// True when an existing session was replaced.
        rotated: bool,
    },

    /// A session exhausted its sequence space and was retired.
    SessionRetired {
        /// Owning module.
        module: ModuleId,
        /// Peer of the retired session.
        peer: ModuleId,
    },

    /// The module consumed its last `SetKey` nonce. Further `SetKey`
    /// commands are refused until the module is redeployed.
    DeployerNonceExhausted {
        /// Affected module.
        module: ModuleId,
    },

    /// The module answered an attestation challenge.
    Attested {
        /// Attested module.
        module: ModuleId,
    },

    // =========================================================================
    // CONFIGURATION
    // =========================================================================
    /// A deployment/build mismatch surfaced at runtime.
    ConfigurationFault {
        /// Module that hit the fault.
        module: ModuleId,
        /// Error description.
        error: String,
    },
}

impl AuditEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> AuditTopic {
        match self {
            Self::Rejected { .. } => AuditTopic::Rejection,
            Self::NoDestinations { .. } | Self::DeliveryFailed { .. } => AuditTopic::Delivery,
            Self::SessionEstablished { .. }
            | Self::SessionRetired { .. }
            | Self::DeployerNonceExhausted { .. } => AuditTopic::Session,
            Self::Attested { .. } => AuditTopic::Attestation,
            Self::ConfigurationFault { .. } => AuditTopic::Configuration,
        }
    }

    /// Module that published the event.
    #[must_use]
    pub fn module(&self) -> ModuleId {
        match self {
            Self::Rejected { module, .. }
            | Self::NoDestinations { module, .. }
            | Self::DeliveryFailed { module, .. }
            | Self::SessionEstablished { module, .. }
            | Self::SessionRetired { module, .. }
            | Self::DeployerNonceExhausted { module }
            | Self::Attested { module }
            | Self::ConfigurationFault { module, .. } => *module,
        }
    }
}

/// Audit topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditTopic {
    /// Dropped inbound events.
    Rejection,
    /// Outbound no-ops and failures.
    Delivery,
    /// Session lifecycle.
    Session,
    /// Attestation answers.
    Attestation,
    /// Deployment mismatches.
    Configuration,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<AuditTopic>,
    /// Modules to include. Empty means all modules.
    pub modules: Vec<ModuleId>,
}

impl AuditFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<AuditTopic>) -> Self {
        Self {
            topics,
            modules: Vec::new(),
        }
    }

    /// Create a filter for events from specific modules.
    #[must_use]
    pub fn from_modules(modules: Vec<ModuleId>) -> Self {
        Self {
            topics: Vec::new(),
            modules,
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &AuditEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&AuditTopic::All)
            || self.topics.contains(&event.topic());

        let module_match = self.modules.is_empty() || self.modules.contains(&event.module());

        topic_match && module_match
    }
}
