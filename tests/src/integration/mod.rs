//! # Integration Tests
//!
//! Full deployments of the demo application: keying, attestation and event
//! flow across both host backends.

pub mod deployment;
pub mod pipeline;
