//! # AE Runtime - Authentic Execution Module Runtime
//!
//! Runs inside one protected module (an OP-TEE trusted application or a
//! Sancus module) and connects it to the rest of a distributed application
//! through authenticated, replay-protected Event Messages.
//!
//! ## Purpose
//!
//! - Dispatch inbound events to the registered input handler after
//!   authentication and replay checks.
//! - Forward every output a handler emits to all destinations of that output,
//!   each sealed under its own session key and sequence number.
//! - Accept session keys (`SetKey`) and answer attestation challenges
//!   (`Attest`) from the deployer.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | A handler only sees authenticated plaintext | `service/dispatcher.rs` - `dispatch()` opens before resolving |
//! | A sequence number is accepted at most once per session | `domain/replay.rs` - `ReplayWindow::accept()` |
//! | A send sequence number is never reused under one key | `domain/session.rs` - `advance_send()` |
//! | `u64::MAX` is never handed out | `domain/session.rs` - session retired instead |
//! | Every routed destination has a session once active | `service/runtime.rs` - `activate()` |
//! | Routing is immutable once active | `domain/routing.rs` - `seal()` |
//! | A `SetKey` payload is accepted at most once | `service/deployment.rs` - deployer nonce |
//!
//! ## Event Lifecycle
//!
//! ```text
//! bytes ──decode──→ EventMessage ──session(sender)──→ open(key, sender, seq, header)
//!                                                          │
//!          Rejected(...) ←── fail ─────────────────────────┤
//!                                                          ↓ ok
//!                                           replay window ──→ handler(input)
//!                                                                 │ emit()
//!                                                                 ↓
//!                                       per destination: advance_send → seal → send
//! ```
//!
//! Authentication, replay and decoding failures are returned as
//! `DispatchOutcome::Rejected` and reported on the audit hook. They never
//! change session state.
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      OUTER LAYER                                │
//! │  adapters/host.rs      - entry point dispatch, status classes  │
//! │  adapters/trustzone.rs - GlobalPlatform TA command surface     │
//! │  adapters/sancus.rs    - Sancus reactive entry surface         │
//! │  adapters/transport.rs - in-process network, inbound loop      │
//! │  adapters/audit.rs     - tracing and audit bus sinks           │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      MIDDLE LAYER                               │
//! │  ports/inbound.rs  - ModuleApi, HostBackend                    │
//! │  ports/outbound.rs - Transport, AuditSink                      │
//! │  service/          - ModuleRuntime                             │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      INNER LAYER                                │
//! │  domain/replay.rs   - ReplayWindow                             │
//! │  domain/session.rs  - Session, SessionStore                    │
//! │  domain/routing.rs  - RoutingTable, Emitter                    │
//! │  domain/outcome.rs  - DispatchOutcome, ForwardReport           │
//! │  domain/errors.rs   - SessionError, TransportError             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::*;
pub use config::{ConfigError, HexKey, RouteConfig, RuntimeConfig, SessionConfig};
pub use domain::*;
pub use ports::*;
pub use service::*;
