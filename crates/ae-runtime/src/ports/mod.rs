//! Ports layer of the module runtime.
//!
//! Defines the hexagonal architecture port traits:
//! - Inbound (Driving) ports: what the host invocation boundary calls
//! - Outbound (Driven) ports: transport and observability

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
