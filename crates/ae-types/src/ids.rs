//! # Identifiers
//!
//! Module identities, IO identifiers and the fixed reactive entry points.
//!
//! Inputs, outputs and user entry points live in independent namespaces: the
//! same numeric `IoId` may name an input and an output of one module.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one hosted module instance, assigned by the deployer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(pub u16);

impl ModuleId {
    /// Identity reserved for the deployer when it provisions keys.
    pub const DEPLOYER: ModuleId = ModuleId(0);

    /// Big-endian wire encoding.
    #[must_use]
    pub fn to_be_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module#{}", self.0)
    }
}

/// Identifier of one input, output or entry point, scoped to a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IoId(pub u16);

impl fmt::Display for IoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Namespace an `IoId` belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoDirection {
    /// Handled inputs.
    Input,
    /// Routed outputs.
    Output,
    /// User entry points.
    Entry,
}

impl fmt::Display for IoDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
            Self::Entry => f.write_str("entry"),
        }
    }
}

/// One remote endpoint of a routing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    /// Module that receives the event.
    pub module: ModuleId,
    /// Input of that module the event is addressed to.
    pub input: IoId,
}

impl Destination {
    /// Create a destination.
    #[must_use]
    pub const fn new(module: ModuleId, input: IoId) -> Self {
        Self { module, input }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.input)
    }
}

/// Reactive entry points every module exposes to its host.
///
/// Ids 0..=2 are fixed by the deployment protocol; everything above is a
/// user-registered entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entrypoint {
    /// Install or rotate the session with a peer.
    SetKey,
    /// Answer an attestation challenge with a MAC under the module key.
    Attest,
    /// Deliver an inbound Event Message.
    HandleInput,
    /// Application-defined entry.
    User(IoId),
}

impl Entrypoint {
    /// First id available to user entries.
    pub const FIRST_USER_ID: u16 = 3;

    /// Numeric id used on the host boundary.
    #[must_use]
    pub fn id(self) -> u16 {
        match self {
            Self::SetKey => 0,
            Self::Attest => 1,
            Self::HandleInput => 2,
            Self::User(id) => id.0,
        }
    }
}

impl From<u16> for Entrypoint {
    fn from(id: u16) -> Self {
        match id {
            0 => Self::SetKey,
            1 => Self::Attest,
            2 => Self::HandleInput,
            other => Self::User(IoId(other)),
        }
    }
}
