//! # TrustZone Backend
//!
//! GlobalPlatform-style Trusted Application surface around a
//! `ModuleRuntime`: sessions are opened against the TA UUID, commands carry
//! four parameter slots whose kinds are packed into `param_types`.
//!
//! | Command | Slot 0 | Slot 1 |
//! |---------|--------|--------|
//! | `0` SetKey | memref input | none |
//! | `1` Attest | memref input | memref output, at least 16 bytes |
//! | `2` HandleInput | memref input (Event Message) | none |
//! | `>= 3` user entry | memref input, or none for an empty payload | none |

use crate::adapters::host::{execute, StatusClass};
use crate::ports::HostBackend;
use crate::service::ModuleRuntime;
use ae_types::{Entrypoint, ModuleId, TAG_LEN};
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

/// GlobalPlatform result code.
pub type TeeResult = u32;

pub const TEE_SUCCESS: TeeResult = 0x0000_0000;
pub const TEE_ERROR_GENERIC: TeeResult = 0xFFFF_0000;
pub const TEE_ERROR_BAD_PARAMETERS: TeeResult = 0xFFFF_0006;
pub const TEE_ERROR_BAD_STATE: TeeResult = 0xFFFF_0007;
pub const TEE_ERROR_ITEM_NOT_FOUND: TeeResult = 0xFFFF_0008;
pub const TEE_ERROR_SECURITY: TeeResult = 0xFFFF_000F;
pub const TEE_ERROR_SHORT_BUFFER: TeeResult = 0xFFFF_0010;

/// Parameter slot kinds.
pub mod param_type {
    pub const NONE: u32 = 0;
    pub const VALUE_INPUT: u32 = 1;
    pub const VALUE_OUTPUT: u32 = 2;
    pub const VALUE_INOUT: u32 = 3;
    pub const MEMREF_INPUT: u32 = 5;
    pub const MEMREF_OUTPUT: u32 = 6;
    pub const MEMREF_INOUT: u32 = 7;
}

/// Pack four slot kinds into a `param_types` word.
#[must_use]
pub const fn param_types(p0: u32, p1: u32, p2: u32, p3: u32) -> u32 {
    (p0 & 0xF) | ((p1 & 0xF) << 4) | ((p2 & 0xF) << 8) | ((p3 & 0xF) << 12)
}

const fn slot_type(param_types: u32, slot: usize) -> u32 {
    (param_types >> (4 * slot)) & 0xF
}

/// One parameter slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TeeParam {
    /// Unused slot.
    #[default]
    None,
    /// Two 32-bit values.
    Value { a: u32, b: u32 },
    /// Shared memory. `size` is the valid length on input and is updated to
    /// the written (or required) length on output.
    Memref { buffer: Vec<u8>, size: usize },
}

impl TeeParam {
    /// Input memref holding `bytes`.
    pub fn input(bytes: &[u8]) -> Self {
        Self::Memref {
            buffer: bytes.to_vec(),
            size: bytes.len(),
        }
    }

    /// Zeroed output memref of `capacity` bytes.
    pub fn output(capacity: usize) -> Self {
        Self::Memref {
            buffer: vec![0u8; capacity],
            size: capacity,
        }
    }

    /// Valid bytes of a memref.
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Memref { buffer, size } => buffer.get(..*size),
            _ => None,
        }
    }
}

/// A module runtime hosted as a Trusted Application.
#[derive(Debug)]
pub struct TrustZoneBackend {
    uuid: Uuid,
    runtime: ModuleRuntime,
    sessions: HashSet<u32>,
    next_session: u32,
    host_session: u32,
}

impl TrustZoneBackend {
    /// Host `runtime`. Uses the configured TA UUID or a random one.
    pub fn new(runtime: ModuleRuntime) -> Self {
        let uuid = runtime.uuid().unwrap_or_else(Uuid::new_v4);
        let mut backend = Self {
            uuid,
            runtime,
            sessions: HashSet::new(),
            next_session: 1,
            host_session: 0,
        };
        backend.host_session = backend.allocate_session();
        info!(module = %backend.runtime.id(), %uuid, "Trusted application loaded");
        backend
    }

    /// TA UUID.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Hosted runtime.
    pub fn runtime(&self) -> &ModuleRuntime {
        &self.runtime
    }

    /// Hosted runtime, mutable (registration before `activate`).
    pub fn runtime_mut(&mut self) -> &mut ModuleRuntime {
        &mut self.runtime
    }

    /// Open a session with the TA.
    ///
    /// # Errors
    ///
    /// `TEE_ERROR_ITEM_NOT_FOUND` if `uuid` is not this TA.
    pub fn open_session(&mut self, uuid: &Uuid) -> Result<u32, TeeResult> {
        if *uuid != self.uuid {
            return Err(TEE_ERROR_ITEM_NOT_FOUND);
        }
        let session = self.allocate_session();
        debug!(module = %self.runtime.id(), session, "TA session opened");
        Ok(session)
    }

    /// Close a session. Returns false for unknown handles.
    pub fn close_session(&mut self, session: u32) -> bool {
        self.sessions.remove(&session)
    }

    /// Invoke command `command` on an open session.
    pub fn invoke_command(
        &mut self,
        session: u32,
        command: u32,
        param_types: u32,
        params: &mut [TeeParam; 4],
    ) -> TeeResult {
        if !self.sessions.contains(&session) {
            return TEE_ERROR_ITEM_NOT_FOUND;
        }
        let Ok(command) = u16::try_from(command) else {
            return TEE_ERROR_BAD_PARAMETERS;
        };
        let entry = Entrypoint::from(command);

        let payload = match (slot_type(param_types, 0), &params[0]) {
            (param_type::NONE, _) => Vec::new(),
            (param_type::MEMREF_INPUT | param_type::MEMREF_INOUT, param) => {
                match param.bytes() {
                    Some(bytes) => bytes.to_vec(),
                    None => return TEE_ERROR_BAD_PARAMETERS,
                }
            }
            _ => return TEE_ERROR_BAD_PARAMETERS,
        };

        if entry == Entrypoint::Attest {
            match (slot_type(param_types, 1), &mut params[1]) {
                (
                    param_type::MEMREF_OUTPUT | param_type::MEMREF_INOUT,
                    TeeParam::Memref { buffer, size },
                ) => {
                    if buffer.len() < TAG_LEN {
                        *size = TAG_LEN;
                        return TEE_ERROR_SHORT_BUFFER;
                    }
                }
                _ => return TEE_ERROR_BAD_PARAMETERS,
            }
        }

        let result = execute(&mut self.runtime, entry, &payload);
        let status = tee_status(StatusClass::classify(&result));

        if let (Ok(response), TeeParam::Memref { buffer, size }) = (&result, &mut params[1]) {
            if !response.is_empty() {
                buffer[..response.len()].copy_from_slice(response);
                *size = response.len();
            }
        }

        debug!(module = %self.runtime.id(), command, status, "Command invoked");
        status
    }

    fn allocate_session(&mut self) -> u32 {
        let session = self.next_session;
        self.next_session = self.next_session.wrapping_add(1).max(1);
        self.sessions.insert(session);
        session
    }
}

/// Native status of a status class.
pub fn tee_status(class: StatusClass) -> TeeResult {
    match class {
        StatusClass::Success => TEE_SUCCESS,
        StatusClass::ConfigurationFault => TEE_ERROR_BAD_STATE,
        StatusClass::Reattest => TEE_ERROR_SECURITY,
        StatusClass::Refused => TEE_ERROR_BAD_PARAMETERS,
        StatusClass::Internal => TEE_ERROR_GENERIC,
    }
}

impl HostBackend for TrustZoneBackend {
    type Status = TeeResult;

    fn module_id(&self) -> ModuleId {
        self.runtime.id()
    }

    fn deliver(&mut self, message: &[u8]) -> TeeResult {
        let mut params = [
            TeeParam::input(message),
            TeeParam::None,
            TeeParam::None,
            TeeParam::None,
        ];
        self.invoke_command(
            self.host_session,
            u32::from(Entrypoint::HandleInput.id()),
            param_types(param_type::MEMREF_INPUT, 0, 0, 0),
            &mut params,
        )
    }

    fn is_success(&self, status: TeeResult) -> bool {
        status == TEE_SUCCESS
    }
}
