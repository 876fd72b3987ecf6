//! # Authentic Execution Test Suite
//!
//! Cross-crate scenarios that need several module runtimes, the in-process
//! network and both host backends at once.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Deployer simulation, demo application, tracing setup
//! │
//! ├── integration/      # Deployment and event flows
//! │   ├── deployment.rs # SetKey, Attest, descriptor-driven configuration
//! │   └── pipeline.rs   # button → LED / sm3 over the loopback network
//! │
//! └── exploits/         # Attacker-controlled host and network
//!     ├── replay.rs     # Replayed events and deployment commands
//!     ├── tampering.rs  # Bit flips, redirection, spoofed senders
//!     └── exhaustion.rs # Sequence exhaustion and re-keying
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p ae-tests
//!
//! # By category
//! cargo test -p ae-tests integration::
//! cargo test -p ae-tests exploits::
//!
//! # With logs
//! RUST_LOG=ae_runtime=debug cargo test -p ae-tests -- --nocapture
//! ```

#![allow(dead_code)]

#[cfg(test)]
mod fixtures;

pub mod integration;
