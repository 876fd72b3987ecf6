//! Adapters layer of the module runtime.
//!
//! - `host`: backend-neutral entry point dispatch and status classes
//! - `trustzone`, `sancus`: native host surfaces, one `HostBackend` each
//! - `transport`: in-process network and the inbound serving loop
//! - `audit`: `AuditSink` implementations

pub mod audit;
pub mod host;
pub mod sancus;
pub mod transport;
pub mod trustzone;

pub use audit::{FanoutAuditSink, TracingAuditSink};
pub use host::{execute, StatusClass};
pub use sancus::{ReactiveResultCode, SancusBackend};
pub use transport::{deliver_one, pump, serve_inbound, InMemoryNetwork, Inbox};
pub use trustzone::{
    param_type, param_types, tee_status, TeeParam, TeeResult, TrustZoneBackend,
    TEE_ERROR_BAD_PARAMETERS, TEE_ERROR_BAD_STATE, TEE_ERROR_GENERIC, TEE_ERROR_ITEM_NOT_FOUND,
    TEE_ERROR_SECURITY, TEE_ERROR_SHORT_BUFFER, TEE_SUCCESS,
};
