//! # Service Layer
//!
//! `ModuleRuntime` and its operations, split by concern:
//!
//! - `runtime`: construction, registration, activation
//! - `dispatcher`: `HandleInput` and user entry points
//! - `forwarder`: `emit` fan-out
//! - `deployment`: `SetKey`, `Attest` and their payload encoders

pub mod deployment;
pub mod dispatcher;
pub mod forwarder;
pub mod runtime;

pub use deployment::{attest_payload, set_key_payload, SET_KEY_HEADER_LEN};
pub use runtime::ModuleRuntime;
