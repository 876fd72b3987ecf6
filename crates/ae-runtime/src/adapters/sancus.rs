//! # Sancus Backend
//!
//! Reactive call surface of a Sancus protected module: the host calls an
//! entry point by id with raw argument bytes and gets back a one-byte result
//! code plus response bytes.

use crate::adapters::host::{execute, StatusClass};
use crate::ports::HostBackend;
use crate::service::ModuleRuntime;
use ae_types::{Entrypoint, ModuleId};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Result code of a reactive call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ReactiveResultCode {
    Ok = 0,
    IllegalCommand = 1,
    IllegalPayload = 2,
    InternalError = 3,
    BadRequest = 4,
    CryptoError = 5,
    GenericError = 6,
}

impl ReactiveResultCode {
    /// Wire value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a wire value.
    pub fn from_u8(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Ok,
            1 => Self::IllegalCommand,
            2 => Self::IllegalPayload,
            3 => Self::InternalError,
            4 => Self::BadRequest,
            5 => Self::CryptoError,
            6 => Self::GenericError,
            _ => return None,
        })
    }
}

impl fmt::Display for ReactiveResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl From<StatusClass> for ReactiveResultCode {
    fn from(class: StatusClass) -> Self {
        match class {
            StatusClass::Success => Self::Ok,
            StatusClass::ConfigurationFault => Self::IllegalCommand,
            StatusClass::Reattest => Self::CryptoError,
            StatusClass::Refused => Self::IllegalPayload,
            StatusClass::Internal => Self::GenericError,
        }
    }
}

/// A module runtime hosted as a Sancus protected module.
#[derive(Debug)]
pub struct SancusBackend {
    runtime: ModuleRuntime,
}

impl SancusBackend {
    pub fn new(runtime: ModuleRuntime) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &ModuleRuntime {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut ModuleRuntime {
        &mut self.runtime
    }

    /// Call entry point `entry`.
    pub fn call(&mut self, entry: u16, args: &[u8]) -> (ReactiveResultCode, Vec<u8>) {
        let result = execute(&mut self.runtime, Entrypoint::from(entry), args);
        let code = ReactiveResultCode::from(StatusClass::classify(&result));
        debug!(module = %self.runtime.id(), entry, %code, "Reactive call");
        (code, result.unwrap_or_default())
    }
}

impl HostBackend for SancusBackend {
    type Status = ReactiveResultCode;

    fn module_id(&self) -> ModuleId {
        self.runtime.id()
    }

    fn deliver(&mut self, message: &[u8]) -> ReactiveResultCode {
        self.call(Entrypoint::HandleInput.id(), message).0
    }

    fn is_success(&self, status: ReactiveResultCode) -> bool {
        status == ReactiveResultCode::Ok
    }
}
