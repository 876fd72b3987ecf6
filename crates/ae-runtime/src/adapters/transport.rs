//! In-process transport.
//!
//! `InMemoryNetwork` connects module runtimes hosted in one process, one
//! unbounded channel per module. `send` never blocks, so it is safe to call
//! from the forwarder. `serve_inbound` is the receiving side: it re-encodes
//! each message and feeds it through a backend's native invocation path, the
//! same way an untrusted host would.

use crate::domain::TransportError;
use crate::ports::{HostBackend, Transport};
use ae_types::{EventMessage, ModuleId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

type Mailboxes = HashMap<ModuleId, mpsc::UnboundedSender<EventMessage>>;

/// Loopback network shared by every module in the process.
#[derive(Clone, Default)]
pub struct InMemoryNetwork {
    mailboxes: Arc<RwLock<Mailboxes>>,
}

impl InMemoryNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `module` and return its inbox.
    ///
    /// Reconnecting replaces the previous inbox, which then sees a closed
    /// channel once drained.
    pub fn connect(&self, module: ModuleId) -> Inbox {
        let (sender, receiver) = mpsc::unbounded_channel();
        if self.mailboxes.write().insert(module, sender).is_some() {
            debug!(%module, "Replaced existing inbox");
        }
        Inbox { module, receiver }
    }

    /// Detach `module`; later sends to it fail with `Unreachable`.
    pub fn disconnect(&self, module: ModuleId) -> bool {
        self.mailboxes.write().remove(&module).is_some()
    }

    /// True if `module` has an inbox.
    pub fn is_connected(&self, module: ModuleId) -> bool {
        self.mailboxes.read().contains_key(&module)
    }

    /// Number of attached modules.
    pub fn len(&self) -> usize {
        self.mailboxes.read().len()
    }

    /// True if no module is attached.
    pub fn is_empty(&self) -> bool {
        self.mailboxes.read().is_empty()
    }
}

impl Transport for InMemoryNetwork {
    fn send(&self, destination: ModuleId, message: EventMessage) -> Result<(), TransportError> {
        let mailboxes = self.mailboxes.read();
        let sender = mailboxes
            .get(&destination)
            .ok_or(TransportError::Unreachable(destination))?;
        sender
            .send(message)
            .map_err(|_| TransportError::Closed(destination))
    }
}

impl std::fmt::Debug for InMemoryNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut modules: Vec<_> = self.mailboxes.read().keys().copied().collect();
        modules.sort();
        f.debug_struct("InMemoryNetwork")
            .field("modules", &modules)
            .finish()
    }
}

/// Receiving end for one module.
#[derive(Debug)]
pub struct Inbox {
    module: ModuleId,
    receiver: mpsc::UnboundedReceiver<EventMessage>,
}

impl Inbox {
    /// Module this inbox belongs to.
    pub fn module(&self) -> ModuleId {
        self.module
    }

    /// Wait for the next message. `None` once disconnected and drained.
    pub async fn recv(&mut self) -> Option<EventMessage> {
        self.receiver.recv().await
    }

    /// Next message if one is queued.
    pub fn try_recv(&mut self) -> Option<EventMessage> {
        self.receiver.try_recv().ok()
    }
}

/// Deliver one message through `backend`, returning its native status.
///
/// `None` if the message cannot be encoded, which only happens for
/// ciphertexts longer than the wire format allows.
pub fn deliver_one<B: HostBackend>(backend: &mut B, message: &EventMessage) -> Option<B::Status> {
    match message.encode() {
        Ok(bytes) => Some(backend.deliver(&bytes)),
        Err(err) => {
            warn!(module = %backend.module_id(), error = %err, "Dropping unencodable message");
            None
        }
    }
}

/// Drain every queued message into `backend` without waiting.
///
/// Returns the number of messages delivered.
pub fn pump<B: HostBackend>(backend: &mut B, inbox: &mut Inbox) -> usize {
    let mut delivered = 0;
    while let Some(message) = inbox.try_recv() {
        if let Some(status) = deliver_one(backend, &message) {
            log_status(backend, &message, status);
            delivered += 1;
        }
    }
    delivered
}

/// Serve `inbox` until its channel closes.
///
/// Returns the number of messages delivered.
pub async fn serve_inbound<B: HostBackend>(backend: &mut B, inbox: &mut Inbox) -> usize {
    let module = backend.module_id();
    info!(%module, "Serving inbound events");

    let mut delivered = 0;
    while let Some(message) = inbox.recv().await {
        if let Some(status) = deliver_one(backend, &message) {
            log_status(backend, &message, status);
            delivered += 1;
        }
    }

    info!(%module, delivered, "Inbound channel closed");
    delivered
}

fn log_status<B: HostBackend>(backend: &B, message: &EventMessage, status: B::Status) {
    if backend.is_success(status) {
        debug!(
            module = %backend.module_id(),
            sender = %message.sender,
            sequence = message.sequence,
            "Event handled"
        );
    } else {
        warn!(
            module = %backend.module_id(),
            sender = %message.sender,
            ?status,
            "Host reported failure for event"
        );
    }
}
