//! # Module Runtime
//!
//! One instance per hosted module. Owns the Session State Store and the
//! Routing Table; borrows nothing from other modules.
//!
//! ## Lifecycle
//!
//! ```text
//! new(config) ──register_*──→ [INITIALIZING] ──activate()──→ [ACTIVE]
//!                              SetKey, Attest ok              all entry points
//!                              HandleInput → Uninitialized
//! ```
//!
//! `activate` seals the routing table after checking that every routed
//! destination has a session.

use crate::config::{ConfigError, RuntimeConfig};
use crate::domain::{
    DispatchOutcome, ForwardReport, Handler, RoutingTable, SessionError, SessionStore,
};
use crate::ports::{AuditSink, ModuleApi, Transport};
use crate::service::forwarder::OutputForwarder;
use ae_audit::AuditEvent;
use ae_crypto::SecretKey;
use ae_types::{IoId, ModuleId, RuntimeError, TAG_LEN};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Runtime of one module instance.
pub struct ModuleRuntime {
    pub(crate) id: ModuleId,
    pub(crate) name: String,
    pub(crate) uuid: Option<Uuid>,
    pub(crate) module_key: SecretKey,
    pub(crate) max_payload: usize,
    /// Next nonce expected in a `SetKey` payload. `None` once all 2^16
    /// nonces were used.
    pub(crate) deployer_nonce: Option<u16>,
    pub(crate) routing: RoutingTable,
    pub(crate) sessions: SessionStore,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) audit: Arc<dyn AuditSink>,
}

impl ModuleRuntime {
    /// Create a runtime in the initializing phase.
    ///
    /// Routes and pre-provisioned sessions from `config` are installed; input
    /// and entry handlers are registered afterwards.
    ///
    /// # Errors
    ///
    /// Any `ConfigError` from validation, or `MissingModuleKey`.
    pub fn new(
        config: RuntimeConfig,
        transport: Arc<dyn Transport>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let module_key = config.module_secret()?;

        let mut sessions = SessionStore::new(config.replay_window)
            .map_err(|_| ConfigError::InvalidReplayWindow(config.replay_window))?;
        for session in &config.sessions {
            let key = session
                .key
                .to_secret(session.encryption)
                .map_err(|error| ConfigError::InvalidKey {
                    context: session.peer.to_string(),
                    error,
                })?;
            sessions.establish(session.peer, key);
        }

        let mut routing = RoutingTable::new();
        for route in &config.routes {
            routing.register_output(route.output, route.destinations.clone())?;
        }

        info!(
            module = %config.module_id,
            name = %config.name,
            routes = config.routes.len(),
            sessions = sessions.len(),
            "Module runtime created"
        );

        Ok(Self {
            id: config.module_id,
            name: config.name.clone(),
            uuid: config.uuid,
            module_key,
            max_payload: config.max_payload_len,
            deployer_nonce: Some(0),
            routing,
            sessions,
            transport,
            audit,
        })
    }

    /// Register the handler for input `id`.
    ///
    /// # Errors
    ///
    /// `DuplicateRegistration`, or `RoutingSealed` once active.
    pub fn register_input<F>(&mut self, id: IoId, handler: F) -> Result<(), RuntimeError>
    where
        F: FnMut(&[u8], &mut crate::domain::Emitter) + Send + 'static,
    {
        self.routing.register_input(id, Box::new(handler) as Handler)
    }

    /// Register user entry point `id` (`>= 3`).
    ///
    /// # Errors
    ///
    /// `DuplicateRegistration`, or `RoutingSealed` once active.
    pub fn register_entry<F>(&mut self, id: IoId, handler: F) -> Result<(), RuntimeError>
    where
        F: FnMut(&[u8], &mut crate::domain::Emitter) + Send + 'static,
    {
        self.routing.register_entry(id, Box::new(handler) as Handler)
    }

    /// Register the destinations of output `id`.
    ///
    /// # Errors
    ///
    /// `DuplicateRegistration`, or `RoutingSealed` once active.
    pub fn register_output(
        &mut self,
        id: IoId,
        destinations: Vec<ae_types::Destination>,
    ) -> Result<(), RuntimeError> {
        self.routing.register_output(id, destinations)
    }

    /// Complete initialization.
    ///
    /// Idempotent once active.
    ///
    /// # Errors
    ///
    /// `MissingSession` if a routed destination has no session; the runtime
    /// stays in the initializing phase.
    pub fn activate(&mut self) -> Result<(), RuntimeError> {
        if self.routing.is_sealed() {
            return Ok(());
        }

        if let Some((output, destination)) = self
            .routing
            .routes()
            .find(|(_, d)| !self.sessions.contains(d.module))
        {
            let err = RuntimeError::MissingSession {
                output,
                peer: destination.module,
            };
            error!(module = %self.id, error = %err, "Activation refused");
            self.audit.notify(AuditEvent::ConfigurationFault {
                module: self.id,
                error: err.to_string(),
            });
            return Err(err);
        }

        self.routing.seal();
        info!(module = %self.id, name = %self.name, "Module runtime active");
        Ok(())
    }

    /// True once `activate` succeeded.
    pub fn is_active(&self) -> bool {
        self.routing.is_sealed()
    }

    /// Module identity.
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// TA UUID, if configured.
    pub fn uuid(&self) -> Option<Uuid> {
        self.uuid
    }

    /// Maximum plaintext size.
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Nonce the next `SetKey` must carry, `None` when exhausted.
    pub fn expected_set_key_nonce(&self) -> Option<u16> {
        self.deployer_nonce
    }

    /// Read-only view of the sessions.
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Read-only view of the routing table.
    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    /// Move the send counter towards `peer` forward.
    ///
    /// # Errors
    ///
    /// `NotFound` or `CounterRegression`.
    pub fn fast_forward_send(&mut self, peer: ModuleId, sequence: u64) -> Result<(), SessionError> {
        self.sessions.fast_forward_send(peer, sequence)
    }

    /// Emit outside of any handler, e.g. from a periodic task.
    ///
    /// # Errors
    ///
    /// `UninitializedRuntime` before `activate`.
    pub fn emit(&mut self, output: IoId, payload: &[u8]) -> Result<ForwardReport, RuntimeError> {
        if !self.is_active() {
            return Err(RuntimeError::UninitializedRuntime);
        }
        Ok(self.forwarder().emit(output, payload))
    }

    pub(crate) fn forwarder(&mut self) -> OutputForwarder<'_> {
        OutputForwarder {
            module: self.id,
            max_payload: self.max_payload,
            routing: &self.routing,
            sessions: &mut self.sessions,
            transport: self.transport.as_ref(),
            audit: self.audit.as_ref(),
        }
    }

    pub(crate) fn report_fault(&self, err: &RuntimeError) {
        error!(module = %self.id, error = %err, "Configuration fault");
        self.audit.notify(AuditEvent::ConfigurationFault {
            module: self.id,
            error: err.to_string(),
        });
    }
}

impl std::fmt::Debug for ModuleRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRuntime")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("active", &self.is_active())
            .field("sessions", &self.sessions.peers())
            .field("routing", &self.routing)
            .finish_non_exhaustive()
    }
}

impl ModuleApi for ModuleRuntime {
    fn module_id(&self) -> ModuleId {
        self.id
    }

    fn set_key(&mut self, payload: &[u8]) -> Result<(), RuntimeError> {
        ModuleRuntime::set_key(self, payload)
    }

    fn attest(&mut self, payload: &[u8]) -> Result<[u8; TAG_LEN], RuntimeError> {
        ModuleRuntime::attest(self, payload)
    }

    fn handle_input(&mut self, message: &[u8]) -> Result<DispatchOutcome, RuntimeError> {
        self.dispatch(message)
    }

    fn call_entry(&mut self, id: IoId, payload: &[u8]) -> Result<ForwardReport, RuntimeError> {
        ModuleRuntime::call_entry(self, id, payload)
    }
}
