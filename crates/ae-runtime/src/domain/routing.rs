//! # I/O Routing Table
//!
//! Installed once during bring-up, read-only afterwards.
//!
//! ```text
//! [INITIALIZING] ──seal()──→ [SEALED]
//!   register_*  ok             register_*  → RoutingSealed
//!   resolve_*   → Uninit       resolve_*   ok
//! ```
//!
//! Inputs, outputs and user entries use independent id namespaces.

use ae_types::{Destination, Entrypoint, IoDirection, IoId, RuntimeError};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Application handler: processes one payload and may emit outputs.
///
/// The payload borrow ends when the handler returns, so handlers cannot keep
/// the buffer.
pub type Handler = Box<dyn FnMut(&[u8], &mut Emitter) + Send>;

/// Collects the outputs a handler emits.
///
/// Emits are buffered and forwarded once the handler returns, before the
/// dispatch completes.
#[derive(Debug, Default)]
pub struct Emitter {
    emitted: Vec<(IoId, Vec<u8>)>,
}

impl Emitter {
    /// Queue `payload` on `output`.
    pub fn emit(&mut self, output: IoId, payload: &[u8]) {
        self.emitted.push((output, payload.to_vec()));
    }

    /// Number of queued emits.
    pub fn len(&self) -> usize {
        self.emitted.len()
    }

    /// True if nothing was emitted.
    pub fn is_empty(&self) -> bool {
        self.emitted.is_empty()
    }

    pub(crate) fn into_emitted(self) -> Vec<(IoId, Vec<u8>)> {
        self.emitted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Initializing,
    Sealed,
}

/// Handler registrations and output routes of one module.
pub struct RoutingTable {
    phase: Phase,
    inputs: HashMap<IoId, Handler>,
    entries: HashMap<IoId, Handler>,
    outputs: BTreeMap<IoId, Vec<Destination>>,
}

impl RoutingTable {
    /// Create an empty table in the initializing phase.
    pub fn new() -> Self {
        Self {
            phase: Phase::Initializing,
            inputs: HashMap::new(),
            entries: HashMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// Register the handler for input `id`.
    ///
    /// # Errors
    ///
    /// `RoutingSealed` after `seal`, `DuplicateRegistration` if `id` is taken.
    pub fn register_input(&mut self, id: IoId, handler: Handler) -> Result<(), RuntimeError> {
        self.check_open(IoDirection::Input, id)?;
        if self.inputs.contains_key(&id) {
            return Err(RuntimeError::DuplicateRegistration {
                direction: IoDirection::Input,
                id,
            });
        }
        self.inputs.insert(id, handler);
        Ok(())
    }

    /// Register a user entry point.
    ///
    /// Ids below `Entrypoint::FIRST_USER_ID` belong to the runtime and count
    /// as taken.
    ///
    /// # Errors
    ///
    /// `RoutingSealed` after `seal`, `DuplicateRegistration` if `id` is taken.
    pub fn register_entry(&mut self, id: IoId, handler: Handler) -> Result<(), RuntimeError> {
        self.check_open(IoDirection::Entry, id)?;
        if id.0 < Entrypoint::FIRST_USER_ID || self.entries.contains_key(&id) {
            return Err(RuntimeError::DuplicateRegistration {
                direction: IoDirection::Entry,
                id,
            });
        }
        self.entries.insert(id, handler);
        Ok(())
    }

    /// Register the destinations of output `id`, in delivery order.
    ///
    /// Repeated destinations are collapsed. An empty list declares an output
    /// with no subscribers.
    ///
    /// # Errors
    ///
    /// `RoutingSealed` after `seal`, `DuplicateRegistration` if `id` is taken.
    pub fn register_output(
        &mut self,
        id: IoId,
        destinations: Vec<Destination>,
    ) -> Result<(), RuntimeError> {
        self.check_open(IoDirection::Output, id)?;
        if self.outputs.contains_key(&id) {
            return Err(RuntimeError::DuplicateRegistration {
                direction: IoDirection::Output,
                id,
            });
        }

        let mut ordered: Vec<Destination> = Vec::with_capacity(destinations.len());
        for destination in destinations {
            if !ordered.contains(&destination) {
                ordered.push(destination);
            }
        }
        self.outputs.insert(id, ordered);
        Ok(())
    }

    /// End bring-up. Further registrations fail.
    pub fn seal(&mut self) {
        self.phase = Phase::Sealed;
    }

    /// True once `seal` was called.
    pub fn is_sealed(&self) -> bool {
        self.phase == Phase::Sealed
    }

    /// Handler for input `id`.
    ///
    /// # Errors
    ///
    /// `UninitializedRuntime` before `seal`, `RoutingNotFound` for unknown ids.
    pub fn resolve_input(&mut self, id: IoId) -> Result<&mut Handler, RuntimeError> {
        self.check_sealed()?;
        self.inputs.get_mut(&id).ok_or(RuntimeError::RoutingNotFound {
            direction: IoDirection::Input,
            id,
        })
    }

    /// Handler for user entry `id`.
    ///
    /// # Errors
    ///
    /// `UninitializedRuntime` before `seal`, `RoutingNotFound` for unknown ids.
    pub fn resolve_entry(&mut self, id: IoId) -> Result<&mut Handler, RuntimeError> {
        self.check_sealed()?;
        self.entries.get_mut(&id).ok_or(RuntimeError::RoutingNotFound {
            direction: IoDirection::Entry,
            id,
        })
    }

    /// Destinations of output `id`.
    ///
    /// An output that was never registered has no destinations, the same as
    /// one registered with an empty list: deployments only route connected
    /// outputs.
    ///
    /// # Errors
    ///
    /// `UninitializedRuntime` before `seal`.
    pub fn resolve_output(&self, id: IoId) -> Result<&[Destination], RuntimeError> {
        self.check_sealed()?;
        Ok(self.outputs.get(&id).map_or(&[][..], Vec::as_slice))
    }

    /// Every `(output, destination)` pair, ordered by output id.
    pub fn routes(&self) -> impl Iterator<Item = (IoId, &Destination)> + '_ {
        self.outputs
            .iter()
            .flat_map(|(output, destinations)| destinations.iter().map(move |d| (*output, d)))
    }

    /// Registered input ids, sorted.
    pub fn inputs(&self) -> Vec<IoId> {
        let mut ids: Vec<_> = self.inputs.keys().copied().collect();
        ids.sort();
        ids
    }

    fn check_open(&self, direction: IoDirection, id: IoId) -> Result<(), RuntimeError> {
        match self.phase {
            Phase::Initializing => Ok(()),
            Phase::Sealed => Err(RuntimeError::RoutingSealed { direction, id }),
        }
    }

    fn check_sealed(&self) -> Result<(), RuntimeError> {
        match self.phase {
            Phase::Sealed => Ok(()),
            Phase::Initializing => Err(RuntimeError::UninitializedRuntime),
        }
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingTable")
            .field("phase", &self.phase)
            .field("inputs", &self.inputs())
            .field("entries", &self.entries.len())
            .field("outputs", &self.outputs)
            .finish()
    }
}
